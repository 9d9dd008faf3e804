//! # Telemetry Parser
//!
//! Refreshes the telemetry page and reads it into a [`RawTelemetryRecord`].
//!
//! Fields are read one by one. A missing element becomes
//! [`FieldValue::Absent`]; only the page itself failing to come back after
//! the refresh is an error.

use chrono::Local;
use tokio::time::{sleep, Duration};
use tracing::debug;

use super::types::{FieldMap, FieldValue, RawTelemetryRecord};
use crate::config::Config;
use crate::driver::{wait_for_present, Driver, Locator};
use crate::error::{Result, RouterSignalError};
use crate::session::{Session, SessionState};

/// `(element id, label)` pairs for one page section.
type Fields = Vec<(String, String)>;

#[derive(Debug, Clone)]
pub struct TelemetryParser {
    ready_elements: Vec<String>,
    ready_timeout: Duration,
    refresh_settle: Duration,
    poll: Duration,
    connection_fields: Fields,
    primary_fields: Fields,
    secondary_fields: Fields,
}

impl TelemetryParser {
    pub fn from_config(config: &Config) -> Self {
        let page = &config.page;
        Self {
            ready_elements: page.ready_elements.clone(),
            ready_timeout: Duration::from_millis(page.ready_timeout_ms),
            refresh_settle: Duration::from_millis(page.refresh_settle_ms),
            poll: Duration::from_millis(config.webdriver.poll_interval_ms),
            connection_fields: page
                .connection_fields
                .iter()
                .map(|f| (f.id.clone(), f.label.clone()))
                .collect(),
            primary_fields: page
                .primary_fields
                .iter()
                .map(|f| (f.id.clone(), f.label.clone()))
                .collect(),
            secondary_fields: page
                .secondary_fields
                .iter()
                .map(|f| (f.id.clone(), f.label.clone()))
                .collect(),
        }
    }

    /// Refresh and read the telemetry page.
    ///
    /// # Errors
    ///
    /// - `InvalidState` unless the session is positioned
    /// - `ParseFailure` if none of the page's ready elements reappears
    /// - Driver errors
    pub async fn parse<D: Driver>(&self, session: &mut Session<D>) -> Result<RawTelemetryRecord> {
        if session.state() != SessionState::Positioned {
            return Err(RouterSignalError::InvalidState {
                expected: "positioned",
                found: session.state(),
            });
        }

        let driver = session.driver_mut();
        driver.refresh().await?;
        sleep(self.refresh_settle).await;

        self.await_ready(driver).await?;

        let record = RawTelemetryRecord {
            timestamp: Local::now(),
            connection_info: read_section(driver, &self.connection_fields).await?,
            primary_carrier: read_section(driver, &self.primary_fields).await?,
            secondary_carrier: read_section(driver, &self.secondary_fields).await?,
        };

        let absent = [&record.connection_info, &record.primary_carrier, &record.secondary_carrier]
            .iter()
            .flat_map(|s| s.values())
            .filter(|v| v.is_absent())
            .count();
        debug!("Parsed telemetry page ({} fields absent)", absent);

        Ok(record)
    }

    /// Wait for any ready element, tried in order.
    async fn await_ready<D: Driver>(&self, driver: &mut D) -> Result<()> {
        for id in &self.ready_elements {
            match wait_for_present(driver, &Locator::id(id), self.ready_timeout, self.poll).await {
                Ok(_) => return Ok(()),
                Err(RouterSignalError::Timeout { .. }) => debug!("{} missing after refresh", id),
                Err(e) => return Err(e),
            }
        }

        Err(RouterSignalError::ParseFailure(format!(
            "none of {} present {}ms after refresh",
            self.ready_elements.join(", "),
            self.ready_timeout.as_millis()
        )))
    }
}

async fn read_section<D: Driver>(driver: &mut D, fields: &Fields) -> Result<FieldMap> {
    let mut section = FieldMap::new();
    for (id, label) in fields {
        let value = match driver.find_element_by_id(id).await? {
            Some(element) => FieldValue::from_text(&driver.element_text(&element).await?),
            None => FieldValue::Absent,
        };
        section.insert(label.clone(), value);
    }
    Ok(section)
}
