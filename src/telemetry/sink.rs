//! # Telemetry Sinks
//!
//! Where classified reports go once a cycle completes.
//!
//! The monitor hands each report to exactly one [`TelemetrySink`]; use
//! [`FanoutSink`] to publish to several.

use chrono::Local;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::types::TelemetryReport;
use crate::config::TelemetryConfig;
use crate::error::Result;

const HISTORY_PREFIX: &str = "telemetry_";
const HISTORY_SUFFIX: &str = ".jsonl";

/// Consumer of classified reports.
#[cfg_attr(test, mockall::automock)]
pub trait TelemetrySink: Send {
    fn emit(&mut self, report: &TelemetryReport) -> Result<()>;
}

/// Console feed: one summary line per reading.
#[derive(Debug, Default)]
pub struct LogSink;

impl TelemetrySink for LogSink {
    fn emit(&mut self, report: &TelemetryReport) -> Result<()> {
        info!("{}", report.summary());
        Ok(())
    }
}

/// Latest report as pretty JSON, replaced on every emit.
#[derive(Debug)]
pub struct SnapshotSink {
    path: PathBuf,
}

impl SnapshotSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TelemetrySink for SnapshotSink {
    fn emit(&mut self, report: &TelemetryReport) -> Result<()> {
        let json = serde_json::to_string_pretty(report)?;
        // Readers never see a half-written snapshot
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Rotating JSON Lines history.
///
/// One report per line. A new file is started after `max_records_per_file`
/// lines, and only the newest `max_files_to_keep` files are retained.
#[derive(Debug)]
pub struct JsonlSink {
    dir: PathBuf,
    max_records_per_file: usize,
    max_files_to_keep: usize,
    writer: Option<BufWriter<File>>,
    records_in_file: usize,
    files_opened: u64,
}

impl JsonlSink {
    pub fn new(dir: impl Into<PathBuf>, max_records_per_file: usize, max_files_to_keep: usize) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            max_records_per_file: max_records_per_file.max(1),
            max_files_to_keep: max_files_to_keep.max(1),
            writer: None,
            records_in_file: 0,
            files_opened: 0,
        })
    }

    pub fn from_config(config: &TelemetryConfig) -> Result<Self> {
        Self::new(&config.log_dir, config.max_records_per_file, config.max_files_to_keep)
    }

    fn rotate(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }

        self.files_opened += 1;
        let name = format!(
            "{}{}_{:04}{}",
            HISTORY_PREFIX,
            Local::now().format("%Y%m%d_%H%M%S"),
            self.files_opened,
            HISTORY_SUFFIX
        );
        let path = self.dir.join(name);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        debug!("Telemetry history file: {}", path.display());

        self.writer = Some(BufWriter::new(file));
        self.records_in_file = 0;
        prune_history(&self.dir, self.max_files_to_keep)
    }
}

impl TelemetrySink for JsonlSink {
    fn emit(&mut self, report: &TelemetryReport) -> Result<()> {
        if self.writer.is_none() || self.records_in_file >= self.max_records_per_file {
            self.rotate()?;
        }
        let line = serde_json::to_string(report)?;
        if let Some(writer) = self.writer.as_mut() {
            writeln!(writer, "{}", line)?;
            writer.flush()?;
        }
        self.records_in_file += 1;
        Ok(())
    }
}

/// History files in `dir`, oldest first.
fn history_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(HISTORY_PREFIX) && n.ends_with(HISTORY_SUFFIX))
        })
        .collect();
    // Names embed a sortable timestamp and sequence number
    files.sort();
    Ok(files)
}

fn prune_history(dir: &Path, keep: usize) -> Result<()> {
    let files = history_files(dir)?;
    let excess = files.len().saturating_sub(keep);
    for path in &files[..excess] {
        debug!("Removing old telemetry file {}", path.display());
        fs::remove_file(path)?;
    }
    Ok(())
}

/// Publishes to every inner sink, even when one of them fails.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Box<dyn TelemetrySink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl TelemetrySink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Console, plus snapshot and history files when telemetry is enabled.
    pub fn from_config(config: &TelemetryConfig) -> Result<Self> {
        let mut fanout = Self::new().with(LogSink);
        if !config.enabled {
            return Ok(fanout);
        }
        if let Some(path) = &config.snapshot_path {
            fanout = fanout.with(SnapshotSink::new(path));
        }
        fanout = fanout.with(JsonlSink::from_config(config)?);
        Ok(fanout)
    }
}

impl TelemetrySink for FanoutSink {
    /// Returns the first failure after every sink has had the report.
    fn emit(&mut self, report: &TelemetryReport) -> Result<()> {
        let mut first_error = None;
        for sink in &mut self.sinks {
            if let Err(e) = sink.emit(report) {
                warn!("Telemetry sink failed: {}", e);
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
