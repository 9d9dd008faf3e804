//! # Polling Monitor
//!
//! Runs the read cycle on a fixed interval until cancelled.
//!
//! Each cycle logs in if needed, positions on the telemetry page, parses it,
//! classifies the record and hands the report to the sink. A failed cycle is
//! logged and retried after the same interval; the loop only ends when its
//! [`CancellationToken`] fires.

use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::driver::Driver;
use crate::error::{Result, RouterSignalError};
use crate::session::{Navigator, Session};
use crate::signal::quality::{FieldKindTable, ThresholdTable};
use crate::telemetry::parser::TelemetryParser;
use crate::telemetry::sink::TelemetrySink;
use crate::telemetry::types::TelemetryReport;

/// Counters for one [`Monitor::run`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MonitorStats {
    pub cycles: u64,
    pub reports: u64,
    pub failures: u64,
}

pub struct Monitor<D: Driver, S: TelemetrySink> {
    session: Session<D>,
    navigator: Navigator,
    parser: TelemetryParser,
    kinds: FieldKindTable,
    thresholds: ThresholdTable,
    sink: S,
    interval: Duration,
}

impl<D: Driver, S: TelemetrySink> Monitor<D, S> {
    pub fn new(config: &Config, driver: D, sink: S) -> Self {
        Self {
            session: Session::new(driver),
            navigator: Navigator::from_config(config),
            parser: TelemetryParser::from_config(config),
            kinds: config.field_kinds(),
            thresholds: config.thresholds.clone(),
            sink,
            interval: Duration::from_secs(config.polling.interval_s),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn session(&self) -> &Session<D> {
        &self.session
    }

    /// One read: login if needed, position, parse, classify.
    ///
    /// A redirect back to the login page is handled here with a single
    /// fresh login; any other failure is returned to the caller.
    pub async fn cycle(&mut self) -> Result<TelemetryReport> {
        if self.session.state().needs_login() {
            self.navigator.login(&mut self.session).await?;
        }

        match self.navigator.ensure_positioned(&mut self.session).await {
            Err(RouterSignalError::SessionExpired(url)) => {
                info!("Router returned to {}, logging in again", url);
                self.navigator.login(&mut self.session).await?;
                self.navigator.ensure_positioned(&mut self.session).await?;
            }
            other => other?,
        }

        let record = self.parser.parse(&mut self.session).await?;
        Ok(TelemetryReport::classify(record, &self.kinds, &self.thresholds))
    }

    /// Poll until `cancel` fires.
    pub async fn run(&mut self, cancel: CancellationToken) -> MonitorStats {
        info!("Monitoring signal every {}s", self.interval.as_secs());
        let mut stats = MonitorStats::default();

        loop {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                outcome = self.cycle() => outcome,
            };
            stats.cycles += 1;

            match outcome {
                Ok(report) => {
                    stats.reports += 1;
                    if let Err(e) = self.sink.emit(&report) {
                        warn!("Failed to publish reading: {}", e);
                    }
                }
                Err(e) => {
                    stats.failures += 1;
                    warn!(
                        "Cycle {} failed ({}): {}; retrying in {}s",
                        stats.cycles,
                        self.session.state(),
                        e,
                        self.interval.as_secs()
                    );
                }
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = sleep(self.interval) => {}
            }
        }

        info!(
            "Monitoring stopped after {} cycles ({} readings, {} failures)",
            stats.cycles, stats.reports, stats.failures
        );
        stats
    }

    /// Single cycle, published to the sink.
    pub async fn read_once(&mut self) -> Result<TelemetryReport> {
        let report = self.cycle().await?;
        self.sink.emit(&report)?;
        Ok(report)
    }

    /// Log in and report where the router landed.
    pub async fn login_probe(&mut self) -> Result<String> {
        self.navigator.login(&mut self.session).await?;
        self.session.driver_mut().current_url().await
    }

    /// End the browser session.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.session.close().await
    }
}
