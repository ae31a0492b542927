//! Poll orchestration for AlphaWatch.
//!
//! This crate ties the detector, the detected set and the network
//! collaborators into the long-running monitor, and hosts the liveness
//! responder that runs beside it.

pub mod alert;
pub mod liveness;
pub mod monitor;

pub use monitor::{CycleOutcome, Monitor, Notifier, PageSource, jittered_delay};
