//! Storage backends

pub mod postgres;
