//! # Router Signal Library
//!
//! Monitor the cellular signal of a 4G/5G router through its web UI.
//!
//! This library logs into the router's admin pages with a browser driven
//! over WebDriver, reads the signal metrics from the network information
//! page, and classifies them into quality bands on a fixed interval.

pub mod config;
pub mod driver;
pub mod error;
pub mod monitor;
pub mod session;
pub mod signal;
pub mod telemetry;
