//! # Telemetry Types
//!
//! The record read from the router each cycle and its classified report.

use chrono::{DateTime, Local};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

use crate::signal::numeric::{extract_numeric, NOT_AVAILABLE};
use crate::signal::quality::{
    aggregate_band, band_for, FieldKindTable, MetricKind, QualityBand, ThresholdTable,
};

/// A single field read from the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Element text, trimmed
    Present(String),
    /// Element not on the page
    Absent,
}

impl FieldValue {
    pub fn from_text(text: &str) -> Self {
        FieldValue::Present(text.trim().to_string())
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, FieldValue::Absent)
    }

    /// Display text; absent fields read as `"N/A"`.
    pub fn as_str(&self) -> &str {
        match self {
            FieldValue::Present(text) => text,
            FieldValue::Absent => NOT_AVAILABLE,
        }
    }

    pub fn numeric(&self) -> Option<f64> {
        match self {
            FieldValue::Present(text) => extract_numeric(text),
            FieldValue::Absent => None,
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Label -> value for one section of the page.
pub type FieldMap = BTreeMap<String, FieldValue>;

/// Fields read from the telemetry page in one cycle.
///
/// Each section carries every configured field, populated or absent.
#[derive(Debug, Clone, Serialize)]
pub struct RawTelemetryRecord {
    pub timestamp: DateTime<Local>,
    pub connection_info: FieldMap,
    pub primary_carrier: FieldMap,
    pub secondary_carrier: FieldMap,
}

/// A resolved metric with its band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricReading {
    pub kind: MetricKind,
    pub value: f64,
    pub band: QualityBand,
}

/// What the monitor emits once per successful cycle.
#[derive(Debug, Clone, Serialize)]
pub struct TelemetryReport {
    pub record: RawTelemetryRecord,
    pub metrics: Vec<MetricReading>,
    pub band: QualityBand,
}

impl TelemetryReport {
    /// Resolve and classify a raw record.
    pub fn classify(
        record: RawTelemetryRecord,
        kinds: &FieldKindTable,
        thresholds: &ThresholdTable,
    ) -> Self {
        let samples = kinds.resolve(&record);
        let band = aggregate_band(thresholds, &samples);
        let metrics = samples
            .iter()
            .map(|s| MetricReading {
                kind: s.kind(),
                value: s.value(),
                band: band_for(thresholds, s.kind(), s.value()),
            })
            .collect();

        Self { record, metrics, band }
    }

    pub fn metric(&self, kind: MetricKind) -> Option<&MetricReading> {
        self.metrics.iter().find(|m| m.kind == kind)
    }

    /// One-line summary for the console feed.
    pub fn summary(&self) -> String {
        let connection: Vec<&str> = self
            .record
            .connection_info
            .values()
            .filter(|v| !v.is_absent())
            .map(FieldValue::as_str)
            .collect();
        let metrics: Vec<String> = self
            .metrics
            .iter()
            .map(|m| format!("{}={} ({})", m.kind.as_str().to_uppercase(), m.value, m.band))
            .collect();
        format!(
            "[{}] link {} | {} | {}",
            self.record.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.band.alert_tier().to_uppercase(),
            if connection.is_empty() { NOT_AVAILABLE.to_string() } else { connection.join(", ") },
            if metrics.is_empty() { "no metrics".to_string() } else { metrics.join(" ") }
        )
    }
}
