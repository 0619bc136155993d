//! `airthings-wave-mqtt` library.
//!
//! The binary (`src/main.rs`) is responsible for configuration loading and
//! process exit codes. One duty cycle (discover a Wave sensor, read it over
//! GATT, publish the decoded values to MQTT) lives in [`crate::cycle`], with
//! every radio and network collaborator behind a trait so it can be tested
//! deterministically.

pub mod acquisition;
pub mod address;
pub mod app;
pub mod config;
pub mod cycle;
pub mod decoder;
pub mod duration;
pub mod publish;
pub mod reading;
pub mod scanner;
pub mod sensor;

#[cfg(test)]
mod test_utils;

// Re-export commonly used types at the crate root
pub use acquisition::{AcquireError, acquire};
pub use address::DeviceAddress;
pub use config::Config;
pub use cycle::{Controller, CycleError, CycleOutcome, CycleReport, SleepPolicy};
pub use reading::{DecodedReading, Quantity};
pub use sensor::DeviceVariant;
