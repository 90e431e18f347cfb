//! Error types shared by every subsystem of the monitor.

pub mod types;
