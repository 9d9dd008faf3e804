//! # Telemetry Module
//!
//! Reads the router's telemetry page and publishes classified readings.
//!
//! This module handles:
//! - The record and report types
//! - Refreshing the page and reading every configured field
//! - Publishing reports to the console, a JSON snapshot, and rotating
//!   JSONL history files (max N records per file, last M files kept)

pub mod parser;
pub mod sink;
pub mod types;

pub use parser::TelemetryParser;
pub use sink::{FanoutSink, JsonlSink, LogSink, SnapshotSink, TelemetrySink};
pub use types::{FieldMap, FieldValue, MetricReading, RawTelemetryRecord, TelemetryReport};
