//! Domain logic, independent of transports and storage

pub mod communication;
