//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Only `[router]` and `[credentials]` are required. Every other section
//! defaults to the Zyxel NR2301 web UI.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::driver::Locator;
use crate::error::{Result, RouterSignalError};
use crate::session::{Credentials, SuccessSignal};
use crate::signal::quality::{FieldKindTable, MetricKind, ThresholdTable};

/// Environment variable overriding `credentials.username`
pub const ENV_USERNAME: &str = "ROUTER_SIGNAL_USERNAME";

/// Environment variable overriding `credentials.password`
pub const ENV_PASSWORD: &str = "ROUTER_SIGNAL_PASSWORD";

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub router: RouterConfig,
    pub credentials: Credentials,

    #[serde(default)]
    pub polling: PollingConfig,

    #[serde(default)]
    pub login: LoginConfig,

    #[serde(default)]
    pub navigation: NavigationConfig,

    #[serde(default)]
    pub page: PageConfig,

    #[serde(default)]
    pub thresholds: ThresholdTable,

    #[serde(default)]
    pub webdriver: WebDriverConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Router address
#[derive(Debug, Deserialize, Clone)]
pub struct RouterConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

/// Poll loop cadence
#[derive(Debug, Deserialize, Clone)]
pub struct PollingConfig {
    #[serde(default = "default_interval_s")]
    pub interval_s: u64,
}

/// Login form and success detection
#[derive(Debug, Deserialize, Clone)]
pub struct LoginConfig {
    #[serde(default = "default_login_path")]
    pub login_path: String,

    #[serde(default = "default_username_field")]
    pub username_field: String,

    #[serde(default = "default_password_field")]
    pub password_field: String,

    #[serde(default = "default_submit_button")]
    pub submit_button: String,

    #[serde(default = "default_element_timeout_ms")]
    pub element_timeout_ms: u64,

    #[serde(default = "default_success_timeout_ms")]
    pub success_timeout_ms: u64,

    #[serde(default = "default_page_settle_ms")]
    pub page_settle_ms: u64,

    #[serde(default = "default_input_delay_ms")]
    pub input_delay_ms: u64,

    #[serde(default = "default_submit_settle_ms")]
    pub submit_settle_ms: u64,

    #[serde(default = "default_fallback_settle_ms")]
    pub fallback_settle_ms: u64,

    #[serde(default = "default_success_signals")]
    pub success_signals: Vec<SuccessSignal>,

    /// Absolute URLs or paths relative to `router.base_url`, tried in order
    #[serde(default = "default_fallback_urls")]
    pub fallback_urls: Vec<String>,
}

/// Route from the home page to the telemetry page
#[derive(Debug, Deserialize, Clone)]
pub struct NavigationConfig {
    #[serde(default = "default_target_path")]
    pub target_path: String,

    #[serde(default = "default_home_markers")]
    pub home_markers: Vec<String>,

    #[serde(default = "default_menu_locator")]
    pub menu_locator: Locator,

    #[serde(default = "default_module_locator")]
    pub module_locator: Locator,

    #[serde(default = "default_module_display_name")]
    pub module_display_name: String,

    #[serde(default = "default_wait_timeout_ms")]
    pub wait_timeout_ms: u64,

    #[serde(default = "default_menu_settle_ms")]
    pub menu_settle_ms: u64,
}

/// A connection field on the telemetry page
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct FieldSpec {
    pub id: String,
    pub label: String,
}

/// A radio field on the telemetry page, optionally classified
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct MetricFieldSpec {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub metric: Option<MetricKind>,
}

/// Telemetry page layout
#[derive(Debug, Deserialize, Clone)]
pub struct PageConfig {
    /// Element ids proving the page is loaded, tried in order
    #[serde(default = "default_ready_elements")]
    pub ready_elements: Vec<String>,

    #[serde(default = "default_ready_timeout_ms")]
    pub ready_timeout_ms: u64,

    #[serde(default = "default_refresh_settle_ms")]
    pub refresh_settle_ms: u64,

    #[serde(default = "default_connection_fields")]
    pub connection_fields: Vec<FieldSpec>,

    #[serde(default = "default_primary_fields")]
    pub primary_fields: Vec<MetricFieldSpec>,

    #[serde(default = "default_secondary_fields")]
    pub secondary_fields: Vec<MetricFieldSpec>,
}

/// WebDriver server and browser launch options
#[derive(Debug, Deserialize, Clone)]
pub struct WebDriverConfig {
    #[serde(default = "default_server_url")]
    pub server_url: String,

    #[serde(default = "default_browser_name")]
    pub browser_name: String,

    #[serde(default = "default_headless")]
    pub headless: bool,

    #[serde(default = "default_browser_args")]
    pub browser_args: Vec<String>,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,
}

/// Telemetry output
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    #[serde(default = "default_telemetry_enabled")]
    pub enabled: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_max_records_per_file")]
    pub max_records_per_file: usize,

    #[serde(default = "default_max_files_to_keep")]
    pub max_files_to_keep: usize,

    /// Latest reading, rewritten every cycle
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: Option<PathBuf>,
}

// Default value functions
fn default_base_url() -> String { "http://192.168.1.1".to_string() }
fn default_interval_s() -> u64 { 30 }

fn default_login_path() -> String { "/login.html".to_string() }
fn default_username_field() -> String { "admin_username".to_string() }
fn default_password_field() -> String { "admin_password".to_string() }
fn default_submit_button() -> String { "btn_login".to_string() }
fn default_element_timeout_ms() -> u64 { 10000 }
fn default_success_timeout_ms() -> u64 { 30000 }
fn default_page_settle_ms() -> u64 { 3000 }
fn default_input_delay_ms() -> u64 { 500 }
fn default_submit_settle_ms() -> u64 { 2000 }
fn default_fallback_settle_ms() -> u64 { 5000 }

fn default_success_signals() -> Vec<SuccessSignal> {
    vec![
        SuccessSignal::UrlContains("html/set_net_info.html".to_string()),
        SuccessSignal::PageContains("Network Information".to_string()),
        SuccessSignal::PageContains("app-modules".to_string()),
        SuccessSignal::UrlContains("dashboard".to_string()),
        SuccessSignal::UrlContains("home".to_string()),
        SuccessSignal::UrlContains("index.html".to_string()),
        SuccessSignal::UrlContains("zyxel.home".to_string()),
        SuccessSignal::UrlDiffersFromLogin,
    ]
}

fn default_fallback_urls() -> Vec<String> {
    vec![
        "/login.html".to_string(),
        "/".to_string(),
        "/index.html".to_string(),
        "http://zyxel.home/login.html".to_string(),
        "http://zyxel.home/".to_string(),
        "http://zyxel.home/index.html".to_string(),
    ]
}

fn default_target_path() -> String { "html/set_net_info.html".to_string() }
fn default_home_markers() -> Vec<String> { vec!["index.html".to_string(), "zyxel.home".to_string()] }
fn default_menu_locator() -> Locator {
    Locator::xpath("//li[@class='menu-item']//a[contains(@onclick, 'html/module.html')]")
}
fn default_module_locator() -> Locator {
    Locator::xpath("//div[@class='app-modules' and contains(@onclick, 'set_net_info.html')]")
}
fn default_module_display_name() -> String { "Network Information".to_string() }
fn default_wait_timeout_ms() -> u64 { 10000 }
fn default_menu_settle_ms() -> u64 { 2000 }

fn default_ready_elements() -> Vec<String> { vec!["connStatus".to_string(), "sigStr".to_string()] }
fn default_ready_timeout_ms() -> u64 { 10000 }
fn default_refresh_settle_ms() -> u64 { 2000 }

fn field(id: &str, label: &str) -> FieldSpec {
    FieldSpec { id: id.to_string(), label: label.to_string() }
}

fn metric_field(id: &str, label: &str, metric: MetricKind) -> MetricFieldSpec {
    MetricFieldSpec { id: id.to_string(), label: label.to_string(), metric: Some(metric) }
}

fn default_connection_fields() -> Vec<FieldSpec> {
    vec![
        field("connStatus", "Connection Status"),
        field("rat", "RAT Mode"),
        field("netOp", "Network Operator"),
        field("imsi", "IMSI"),
        field("opBand", "Operation Band"),
    ]
}

fn default_primary_fields() -> Vec<MetricFieldSpec> {
    vec![
        metric_field("sigStr", "Signal Strength (RSSI)", MetricKind::Rssi),
        metric_field("sinr", "SINR", MetricKind::Sinr),
        metric_field("rsrp", "RSRP", MetricKind::Rsrp),
        metric_field("rsrq", "RSRQ", MetricKind::Rsrq),
    ]
}

fn default_secondary_fields() -> Vec<MetricFieldSpec> {
    vec![
        metric_field("sinr1", "SINR", MetricKind::Sinr),
        metric_field("rsrp1", "RSRP", MetricKind::Rsrp),
        metric_field("rsrq1", "RSRQ", MetricKind::Rsrq),
    ]
}

fn default_server_url() -> String { "http://localhost:9515".to_string() }
fn default_browser_name() -> String { "chrome".to_string() }
fn default_headless() -> bool { true }
fn default_browser_args() -> Vec<String> {
    [
        "--no-sandbox",
        "--disable-dev-shm-usage",
        "--disable-gpu",
        "--window-size=1920,1080",
        "--user-agent=Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36",
        "--disable-web-security",
        "--allow-running-insecure-content",
        "--disable-extensions",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_poll_interval_ms() -> u64 { 250 }
fn default_command_timeout_ms() -> u64 { 30000 }

fn default_telemetry_enabled() -> bool { true }
fn default_log_dir() -> String { "./logs".to_string() }
fn default_max_records_per_file() -> usize { 10000 }
fn default_max_files_to_keep() -> usize { 10 }
fn default_snapshot_path() -> Option<PathBuf> { Some(PathBuf::from("signal_data.json")) }

impl Default for PollingConfig {
    fn default() -> Self {
        Self { interval_s: default_interval_s() }
    }
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            login_path: default_login_path(),
            username_field: default_username_field(),
            password_field: default_password_field(),
            submit_button: default_submit_button(),
            element_timeout_ms: default_element_timeout_ms(),
            success_timeout_ms: default_success_timeout_ms(),
            page_settle_ms: default_page_settle_ms(),
            input_delay_ms: default_input_delay_ms(),
            submit_settle_ms: default_submit_settle_ms(),
            fallback_settle_ms: default_fallback_settle_ms(),
            success_signals: default_success_signals(),
            fallback_urls: default_fallback_urls(),
        }
    }
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            target_path: default_target_path(),
            home_markers: default_home_markers(),
            menu_locator: default_menu_locator(),
            module_locator: default_module_locator(),
            module_display_name: default_module_display_name(),
            wait_timeout_ms: default_wait_timeout_ms(),
            menu_settle_ms: default_menu_settle_ms(),
        }
    }
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            ready_elements: default_ready_elements(),
            ready_timeout_ms: default_ready_timeout_ms(),
            refresh_settle_ms: default_refresh_settle_ms(),
            connection_fields: default_connection_fields(),
            primary_fields: default_primary_fields(),
            secondary_fields: default_secondary_fields(),
        }
    }
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            browser_name: default_browser_name(),
            headless: default_headless(),
            browser_args: default_browser_args(),
            poll_interval_ms: default_poll_interval_ms(),
            command_timeout_ms: default_command_timeout_ms(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: default_telemetry_enabled(),
            log_dir: default_log_dir(),
            max_records_per_file: default_max_records_per_file(),
            max_files_to_keep: default_max_files_to_keep(),
            snapshot_path: default_snapshot_path(),
        }
    }
}

fn invalid(msg: impl std::fmt::Display) -> RouterSignalError {
    RouterSignalError::Config(toml::de::Error::custom(msg))
}

fn check_range(name: &str, value: u64, min: u64, max: u64) -> Result<()> {
    if value < min || value > max {
        return Err(invalid(format!("{} must be between {} and {}", name, min, max)));
    }
    Ok(())
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Credentials may be overridden from `ROUTER_SIGNAL_USERNAME` and
    /// `ROUTER_SIGNAL_PASSWORD`.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails (including a missing password)
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use router_signal::config::Config;
    ///
    /// let config = Config::load("config/router-signal.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents, |key| std::env::var(key).ok())
    }

    /// Parse, apply overrides from `env`, and validate.
    pub fn from_toml<F>(contents: &str, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config: Config = toml::from_str(contents)?;
        config.apply_overrides(env);
        config.validate()?;
        Ok(config)
    }

    fn apply_overrides<F>(&mut self, env: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(username) = env(ENV_USERNAME).filter(|v| !v.is_empty()) {
            self.credentials.username = username;
        }
        if let Some(password) = env(ENV_PASSWORD).filter(|v| !v.is_empty()) {
            self.credentials.password = password;
        }
    }

    /// Resolve a path against `router.base_url`; absolute URLs pass through.
    pub fn resolve_url(&self, path_or_url: &str) -> String {
        if path_or_url.contains("://") {
            return path_or_url.to_string();
        }
        format!(
            "{}/{}",
            self.router.base_url.trim_end_matches('/'),
            path_or_url.trim_start_matches('/')
        )
    }

    pub fn login_url(&self) -> String {
        self.resolve_url(&self.login.login_path)
    }

    pub fn target_url(&self) -> String {
        self.resolve_url(&self.navigation.target_path)
    }

    /// Alternate login URLs, resolved, in order.
    pub fn fallback_urls(&self) -> Vec<String> {
        self.login.fallback_urls.iter().map(|u| self.resolve_url(u)).collect()
    }

    /// Label -> metric kind lookup for the two carrier sections.
    pub fn field_kinds(&self) -> FieldKindTable {
        let classified = |fields: &[MetricFieldSpec]| -> Vec<(String, MetricKind)> {
            fields
                .iter()
                .filter_map(|f| f.metric.map(|kind| (f.label.clone(), kind)))
                .collect()
        };
        FieldKindTable::new(
            classified(&self.page.primary_fields),
            classified(&self.page.secondary_fields),
        )
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is missing or out of range
    fn validate(&self) -> Result<()> {
        if self.router.base_url.is_empty() {
            return Err(invalid("router base_url cannot be empty"));
        }

        if !self.router.base_url.contains("://") {
            return Err(invalid("router base_url must include a scheme (e.g. http://)"));
        }

        if self.credentials.username.is_empty() {
            return Err(invalid("credentials username cannot be empty"));
        }

        if self.credentials.password.is_empty() {
            return Err(invalid(format!(
                "credentials password is required (set it in the config file or {})",
                ENV_PASSWORD
            )));
        }

        check_range("polling interval_s", self.polling.interval_s, 1, 86400)?;

        // Validate waits and settle delays
        for (name, value) in [
            ("login element_timeout_ms", self.login.element_timeout_ms),
            ("login success_timeout_ms", self.login.success_timeout_ms),
            ("navigation wait_timeout_ms", self.navigation.wait_timeout_ms),
            ("page ready_timeout_ms", self.page.ready_timeout_ms),
            ("webdriver command_timeout_ms", self.webdriver.command_timeout_ms),
        ] {
            check_range(name, value, 1, 300000)?;
        }

        for (name, value) in [
            ("login page_settle_ms", self.login.page_settle_ms),
            ("login input_delay_ms", self.login.input_delay_ms),
            ("login submit_settle_ms", self.login.submit_settle_ms),
            ("login fallback_settle_ms", self.login.fallback_settle_ms),
            ("navigation menu_settle_ms", self.navigation.menu_settle_ms),
            ("page refresh_settle_ms", self.page.refresh_settle_ms),
        ] {
            check_range(name, value, 0, 60000)?;
        }

        check_range("webdriver poll_interval_ms", self.webdriver.poll_interval_ms, 1, 10000)?;

        if self.login.success_signals.is_empty() {
            return Err(invalid("login success_signals cannot be empty"));
        }

        for (name, value) in [
            ("login username_field", &self.login.username_field),
            ("login password_field", &self.login.password_field),
            ("login submit_button", &self.login.submit_button),
            ("navigation target_path", &self.navigation.target_path),
        ] {
            if value.is_empty() {
                return Err(invalid(format!("{} cannot be empty", name)));
            }
        }

        if self.page.ready_elements.is_empty() {
            return Err(invalid("page ready_elements cannot be empty"));
        }

        // Element ids must be unique across sections
        let mut seen = std::collections::HashSet::new();
        let ids = self
            .page
            .connection_fields
            .iter()
            .map(|f| &f.id)
            .chain(self.page.primary_fields.iter().map(|f| &f.id))
            .chain(self.page.secondary_fields.iter().map(|f| &f.id));
        for id in ids {
            if !seen.insert(id) {
                return Err(invalid(format!("duplicate page field id '{}'", id)));
            }
        }

        // Records are keyed by label, so a repeat would drop a field
        let sections = [
            ("connection_fields", self.page.connection_fields.iter().map(|f| &f.label).collect::<Vec<_>>()),
            ("primary_fields", self.page.primary_fields.iter().map(|f| &f.label).collect()),
            ("secondary_fields", self.page.secondary_fields.iter().map(|f| &f.label).collect()),
        ];
        for (section, labels) in sections {
            let mut seen = std::collections::HashSet::new();
            for label in labels {
                if !seen.insert(label) {
                    return Err(invalid(format!("duplicate label '{}' in page {}", label, section)));
                }
            }
        }

        for f in &self.page.secondary_fields {
            if f.metric == Some(MetricKind::Rssi) {
                return Err(invalid(format!(
                    "secondary field '{}' cannot be classified as rssi",
                    f.id
                )));
            }
        }

        for kind in MetricKind::ALL {
            if !self.thresholds.get(kind).is_monotone() {
                return Err(invalid(format!(
                    "{} thresholds must satisfy excellent >= good >= fair",
                    kind
                )));
            }
        }

        if self.webdriver.server_url.is_empty() {
            return Err(invalid("webdriver server_url cannot be empty"));
        }

        if self.telemetry.enabled && self.telemetry.log_dir.is_empty() {
            return Err(invalid("telemetry log_dir cannot be empty when enabled"));
        }

        if self.telemetry.max_records_per_file == 0 {
            return Err(invalid("max_records_per_file must be greater than 0"));
        }

        if self.telemetry.max_files_to_keep == 0 {
            return Err(invalid("max_files_to_keep must be greater than 0"));
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        router: RouterConfig { base_url: default_base_url() },
        credentials: Credentials::new("admin", "hunter2"),
        polling: PollingConfig::default(),
        login: LoginConfig::default(),
        navigation: NavigationConfig::default(),
        page: PageConfig::default(),
        thresholds: ThresholdTable::default(),
        webdriver: WebDriverConfig::default(),
        telemetry: TelemetryConfig::default(),
    }
}
