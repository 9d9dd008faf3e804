//! # Signal Module
//!
//! Turns the router's unit-suffixed label strings into numbers and numbers
//! into quality bands.
//!
//! This module handles:
//! - Extracting signed decimal values from labels like `"-95 dBm"`
//! - Per-metric quality bands from configurable threshold tables
//! - Resolving a telemetry record into one sample per metric kind
//! - Aggregating samples into the overall link band

pub mod numeric;
pub mod quality;

pub use numeric::extract_numeric;
pub use quality::{
    aggregate_band, band_for, FieldKindTable, MetricKind, MetricSample, QualityBand,
    ThresholdTable, Thresholds,
};
