//! # Session Module
//!
//! The authenticated browser session against the router's web UI.
//!
//! This module handles:
//! - Session state (`Unauthenticated -> Authenticating -> Authenticated -> Positioned`)
//! - Login, including the alternate-URL fallback sequence
//! - Declarative login success signals
//! - Reaching the telemetry page through the in-page menu or directly

pub mod navigator;

pub use navigator::Navigator;

use serde::Deserialize;
use std::fmt;
use tracing::debug;

use crate::driver::{Driver, PageState};
use crate::error::Result;

/// Router login, fixed for the life of the process.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    #[serde(default = "default_username")]
    pub username: String,

    #[serde(default)]
    pub password: String,
}

fn default_username() -> String {
    "admin".to_string()
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Where a session stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticating,
    Authenticated,
    /// On the telemetry page
    Positioned,
    Failed,
}

impl SessionState {
    /// Whether the next cycle must log in before positioning.
    pub fn needs_login(self) -> bool {
        matches!(
            self,
            SessionState::Unauthenticated | SessionState::Authenticating | SessionState::Failed
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Unauthenticated => "unauthenticated",
            SessionState::Authenticating => "authenticating",
            SessionState::Authenticated => "authenticated",
            SessionState::Positioned => "positioned",
            SessionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Evidence that a login submit was accepted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SuccessSignal {
    /// Current URL contains the text (case-insensitive)
    UrlContains(String),
    /// Page source contains the text
    PageContains(String),
    /// Current URL is no longer the login URL
    UrlDiffersFromLogin,
}

impl SuccessSignal {
    pub fn matches(&self, page: &PageState, login_url: &str) -> bool {
        match self {
            SuccessSignal::UrlContains(needle) => {
                page.url.to_lowercase().contains(&needle.to_lowercase())
            }
            SuccessSignal::PageContains(needle) => page.source.contains(needle.as_str()),
            SuccessSignal::UrlDiffersFromLogin => page.url != login_url,
        }
    }

    /// True if any signal matches.
    pub fn any_matches(signals: &[SuccessSignal], page: &PageState, login_url: &str) -> bool {
        signals.iter().any(|s| s.matches(page, login_url))
    }
}

/// The one live connection to the router.
///
/// Owns the driver. Only the [`Navigator`] moves it between states.
pub struct Session<D: Driver> {
    driver: D,
    state: SessionState,
}

impl<D: Driver> fmt::Debug for Session<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<D: Driver> Session<D> {
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            state: SessionState::Unauthenticated,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub(crate) fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            debug!("Session {} -> {}", self.state, state);
            self.state = state;
        }
    }

    /// End the browser session.
    pub async fn close(&mut self) -> Result<()> {
        self.set_state(SessionState::Unauthenticated);
        self.driver.quit().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(url: &str, source: &str) -> PageState {
        PageState {
            url: url.to_string(),
            source: source.to_string(),
        }
    }

    const LOGIN: &str = "http://192.168.1.1/login.html";

    #[test]
    fn test_url_contains_is_case_insensitive() {
        let signal = SuccessSignal::UrlContains("dashboard".to_string());
        assert!(signal.matches(&page("http://192.168.1.1/Dashboard", ""), LOGIN));
        assert!(!signal.matches(&page(LOGIN, ""), LOGIN));
    }

    #[test]
    fn test_page_contains_marker() {
        let signal = SuccessSignal::PageContains("app-modules".to_string());
        assert!(signal.matches(&page(LOGIN, "<div class=\"app-modules\">"), LOGIN));
        assert!(!signal.matches(&page(LOGIN, "<form id=\"login\">"), LOGIN));
    }

    #[test]
    fn test_url_differs_from_login() {
        let signal = SuccessSignal::UrlDiffersFromLogin;
        assert!(!signal.matches(&page(LOGIN, ""), LOGIN));
        assert!(signal.matches(&page("http://192.168.1.1/index.html", ""), LOGIN));
    }

    #[test]
    fn test_any_matches() {
        let signals = vec![
            SuccessSignal::UrlContains("zyxel.home".to_string()),
            SuccessSignal::PageContains("Network Information".to_string()),
        ];
        assert!(SuccessSignal::any_matches(&signals, &page(LOGIN, "Network Information"), LOGIN));
        assert!(!SuccessSignal::any_matches(&signals, &page(LOGIN, "Login"), LOGIN));
        assert!(!SuccessSignal::any_matches(&[], &page(LOGIN, ""), LOGIN));
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = Credentials::new("admin", "hunter2");
        let shown = format!("{:?}", creds);
        assert!(shown.contains("admin"));
        assert!(!shown.contains("hunter2"));
    }

    #[test]
    fn test_needs_login() {
        assert!(SessionState::Unauthenticated.needs_login());
        assert!(SessionState::Authenticating.needs_login());
        assert!(SessionState::Failed.needs_login());
        assert!(!SessionState::Authenticated.needs_login());
        assert!(!SessionState::Positioned.needs_login());
    }
}
