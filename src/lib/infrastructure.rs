//! Transports, storage backends and the HTTP surface

pub mod config;
pub mod database;
pub mod email;
pub mod http;
