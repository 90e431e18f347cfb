pub mod configuration;
pub mod controller;
pub mod error_handling;
pub mod monitoring;
pub mod storage;
