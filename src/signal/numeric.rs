//! # Numeric Extractor
//!
//! Pulls the first signed decimal number out of a raw label string.

use regex::Regex;
use std::sync::LazyLock;

/// Placeholder the router (and our own records) use for "no reading".
pub const NOT_AVAILABLE: &str = "N/A";

static NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"-?\d+(?:\.\d+)?").expect("static regex is valid")
});

/// Extract the first signed (optionally decimal) number from `raw`.
///
/// Leading text and unit suffixes are ignored. Returns `None` for empty
/// input, the literal `"N/A"`, or when no number token is present.
///
/// # Examples
///
/// ```
/// use router_signal::signal::extract_numeric;
///
/// assert_eq!(extract_numeric("-95 dBm"), Some(-95.0));
/// assert_eq!(extract_numeric("SINR: 12.5dB"), Some(12.5));
/// assert_eq!(extract_numeric("N/A"), None);
/// ```
pub fn extract_numeric(raw: &str) -> Option<f64> {
    if raw.is_empty() || raw == NOT_AVAILABLE {
        return None;
    }

    NUMBER
        .find(raw)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}
