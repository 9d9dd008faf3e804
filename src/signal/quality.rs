//! # Quality Classifier
//!
//! Maps metric values to quality bands and folds several bands into one.
//!
//! ## Thresholds
//!
//! Every metric kind has its own table. The comparison is always
//! `value >= threshold`; sign conventions live in the tables only.
//!
//! | kind | excellent | good | fair | below fair |
//! |------|-----------|------|------|------------|
//! | RSSI | >= -50 dBm | >= -70 dBm | >= -85 dBm | poor |
//! | RSRP | >= -80 dBm | >= -90 dBm | >= -100 dBm | poor |
//! | RSRQ | >= -10 dB | >= -15 dB | >= -20 dB | poor |
//! | SINR | >= 20 dB | >= 13 dB | >= 0 dB | poor |
//!
//! ## Aggregate
//!
//! Bands are scored poor=1 .. excellent=4 and averaged. A mean of 3.5 or
//! more is excellent, 2.5 or more is good, anything else is poor. The
//! aggregate therefore never reports fair.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::telemetry::types::{FieldMap, RawTelemetryRecord};

/// Radio metric kinds the classifier understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Rssi,
    Rsrp,
    Rsrq,
    Sinr,
}

impl MetricKind {
    pub const ALL: [MetricKind; 4] = [
        MetricKind::Rssi,
        MetricKind::Rsrp,
        MetricKind::Rsrq,
        MetricKind::Sinr,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::Rssi => "rssi",
            MetricKind::Rsrp => "rsrp",
            MetricKind::Rsrq => "rsrq",
            MetricKind::Sinr => "sinr",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discretized link quality, ordered worst to best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityBand {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl QualityBand {
    /// Ordinal used for aggregation (poor=1 .. excellent=4).
    pub fn score(self) -> u8 {
        match self {
            QualityBand::Poor => 1,
            QualityBand::Fair => 2,
            QualityBand::Good => 3,
            QualityBand::Excellent => 4,
        }
    }

    /// Three-level alert tier: fair and poor both read as "bad".
    pub fn alert_tier(self) -> &'static str {
        match self {
            QualityBand::Excellent => "excellent",
            QualityBand::Good => "good",
            QualityBand::Fair | QualityBand::Poor => "bad",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QualityBand::Poor => "poor",
            QualityBand::Fair => "fair",
            QualityBand::Good => "good",
            QualityBand::Excellent => "excellent",
        }
    }
}

impl fmt::Display for QualityBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lower bounds for the three upper bands of one metric kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub excellent: f64,
    pub good: f64,
    pub fair: f64,
}

impl Thresholds {
    pub const fn new(excellent: f64, good: f64, fair: f64) -> Self {
        Self { excellent, good, fair }
    }

    /// Band for `value`. Boundaries are closed below.
    pub fn band(&self, value: f64) -> QualityBand {
        if value >= self.excellent {
            QualityBand::Excellent
        } else if value >= self.good {
            QualityBand::Good
        } else if value >= self.fair {
            QualityBand::Fair
        } else {
            QualityBand::Poor
        }
    }

    /// `excellent >= good >= fair`, all finite.
    pub fn is_monotone(&self) -> bool {
        [self.excellent, self.good, self.fair].iter().all(|v| v.is_finite())
            && self.excellent >= self.good
            && self.good >= self.fair
    }
}

/// Per-kind threshold tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdTable {
    #[serde(default = "default_rssi")]
    pub rssi: Thresholds,

    #[serde(default = "default_rsrp")]
    pub rsrp: Thresholds,

    #[serde(default = "default_rsrq")]
    pub rsrq: Thresholds,

    #[serde(default = "default_sinr")]
    pub sinr: Thresholds,
}

fn default_rssi() -> Thresholds { Thresholds::new(-50.0, -70.0, -85.0) }
fn default_rsrp() -> Thresholds { Thresholds::new(-80.0, -90.0, -100.0) }
fn default_rsrq() -> Thresholds { Thresholds::new(-10.0, -15.0, -20.0) }
fn default_sinr() -> Thresholds { Thresholds::new(20.0, 13.0, 0.0) }

impl Default for ThresholdTable {
    fn default() -> Self {
        Self {
            rssi: default_rssi(),
            rsrp: default_rsrp(),
            rsrq: default_rsrq(),
            sinr: default_sinr(),
        }
    }
}

impl ThresholdTable {
    pub fn get(&self, kind: MetricKind) -> &Thresholds {
        match kind {
            MetricKind::Rssi => &self.rssi,
            MetricKind::Rsrp => &self.rsrp,
            MetricKind::Rsrq => &self.rsrq,
            MetricKind::Sinr => &self.sinr,
        }
    }
}

/// Band for a single metric value.
///
/// # Examples
///
/// ```
/// use router_signal::signal::{band_for, MetricKind, QualityBand, ThresholdTable};
///
/// let table = ThresholdTable::default();
/// assert_eq!(band_for(&table, MetricKind::Rsrp, -90.0), QualityBand::Good);
/// assert_eq!(band_for(&table, MetricKind::Sinr, -1.0), QualityBand::Poor);
/// ```
pub fn band_for(table: &ThresholdTable, kind: MetricKind, value: f64) -> QualityBand {
    table.get(kind).band(value)
}

/// One finite numeric reading for one metric kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricSample {
    kind: MetricKind,
    value: f64,
}

impl MetricSample {
    /// Returns `None` unless `value` is finite.
    pub fn new(kind: MetricKind, value: f64) -> Option<Self> {
        value.is_finite().then_some(Self { kind, value })
    }

    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    pub fn value(&self) -> f64 {
        self.value
    }
}

/// Overall band for a set of samples.
///
/// An empty set is [`QualityBand::Poor`].
pub fn aggregate_band(table: &ThresholdTable, samples: &[MetricSample]) -> QualityBand {
    if samples.is_empty() {
        return QualityBand::Poor;
    }

    let total: u32 = samples
        .iter()
        .map(|s| u32::from(band_for(table, s.kind, s.value).score()))
        .sum();
    let mean = f64::from(total) / samples.len() as f64;

    if mean >= 3.5 {
        QualityBand::Excellent
    } else if mean >= 2.5 {
        QualityBand::Good
    } else {
        QualityBand::Poor
    }
}

/// Explicit field label -> metric kind lookup for the two carrier sections.
///
/// Built once from configuration. Secondary-carrier fields never map to
/// RSSI; such entries are dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldKindTable {
    primary: HashMap<String, MetricKind>,
    secondary: HashMap<String, MetricKind>,
}

impl FieldKindTable {
    pub fn new<P, S>(primary: P, secondary: S) -> Self
    where
        P: IntoIterator<Item = (String, MetricKind)>,
        S: IntoIterator<Item = (String, MetricKind)>,
    {
        Self {
            primary: primary.into_iter().collect(),
            secondary: secondary
                .into_iter()
                .filter(|(_, kind)| *kind != MetricKind::Rssi)
                .collect(),
        }
    }

    pub fn primary_kind(&self, label: &str) -> Option<MetricKind> {
        self.primary.get(label).copied()
    }

    pub fn secondary_kind(&self, label: &str) -> Option<MetricKind> {
        self.secondary.get(label).copied()
    }

    /// Resolve a record into at most one sample per metric kind.
    ///
    /// The primary carrier is read first. Secondary-carrier values only fill
    /// kinds the primary carrier left empty.
    pub fn resolve(&self, record: &RawTelemetryRecord) -> Vec<MetricSample> {
        let mut found: BTreeMap<MetricKind, MetricSample> = BTreeMap::new();

        collect_section(&record.primary_carrier, &self.primary, &mut found);
        collect_section(&record.secondary_carrier, &self.secondary, &mut found);

        found.into_values().collect()
    }
}

fn collect_section(
    section: &FieldMap,
    kinds: &HashMap<String, MetricKind>,
    found: &mut BTreeMap<MetricKind, MetricSample>,
) {
    for (label, value) in section {
        let Some(&kind) = kinds.get(label) else {
            continue;
        };
        if found.contains_key(&kind) {
            continue;
        }
        if let Some(sample) = value.numeric().and_then(|v| MetricSample::new(kind, v)) {
            found.insert(kind, sample);
        }
    }
}
