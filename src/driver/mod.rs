//! # Driver Module
//!
//! Browser automation seam between the monitor and the router's web UI.
//!
//! This module handles:
//! - The [`Driver`] trait the navigator and parser are written against
//! - Element locators and opaque element handles
//! - Bounded polling waits built on the trait primitives
//! - A W3C WebDriver client implementing the trait ([`webdriver`])

pub mod webdriver;

#[cfg(test)]
pub mod mocks;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::time::{sleep, Duration, Instant};
use tracing::debug;

use crate::error::{Result, RouterSignalError};

/// How to find an element on the current page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "by", content = "value", rename_all = "lowercase")]
pub enum Locator {
    Id(String),
    XPath(String),
    Css(String),
}

impl Locator {
    pub fn id(id: impl Into<String>) -> Self {
        Locator::Id(id.into())
    }

    pub fn xpath(expr: impl Into<String>) -> Self {
        Locator::XPath(expr.into())
    }

    /// Loose match on any element whose text contains `text`.
    pub fn containing_text(text: &str) -> Self {
        Locator::XPath(format!("//*[contains(text(), {})]", xpath_literal(text)))
    }
}

/// Quote `text` as an XPath 1.0 string literal.
///
/// XPath has no escape sequences, so text holding both quote kinds is
/// spliced together with `concat()`.
fn xpath_literal(text: &str) -> String {
    if !text.contains('\'') {
        format!("'{}'", text)
    } else if !text.contains('"') {
        format!("\"{}\"", text)
    } else {
        let parts: Vec<String> = text.split('\'').map(|part| format!("'{}'", part)).collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Id(id) => write!(f, "id={}", id),
            Locator::XPath(expr) => write!(f, "xpath={}", expr),
            Locator::Css(sel) => write!(f, "css={}", sel),
        }
    }
}

/// Opaque reference to an element found by a [`Driver`].
///
/// Only valid until the next page load.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle(pub String);

/// Snapshot of the browser used by [`wait_until`] predicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageState {
    pub url: String,
    pub source: String,
}

/// Browser automation primitives.
///
/// Every call completes before the next one is issued; the monitor never
/// has more than one request in flight.
#[async_trait]
pub trait Driver: Send {
    /// Load `url` in the current tab
    async fn navigate(&mut self, url: &str) -> Result<()>;

    /// Reload the current page
    async fn refresh(&mut self) -> Result<()>;

    async fn current_url(&mut self) -> Result<String>;

    async fn page_source(&mut self) -> Result<String>;

    /// Look up an element. A missing element is `Ok(None)`, not an error.
    async fn find_element(&mut self, locator: &Locator) -> Result<Option<ElementHandle>>;

    async fn find_element_by_id(&mut self, id: &str) -> Result<Option<ElementHandle>> {
        self.find_element(&Locator::id(id)).await
    }

    /// Displayed and enabled
    async fn is_clickable(&mut self, element: &ElementHandle) -> Result<bool>;

    async fn element_text(&mut self, element: &ElementHandle) -> Result<String>;

    async fn click(&mut self, element: &ElementHandle) -> Result<()>;

    async fn clear(&mut self, element: &ElementHandle) -> Result<()>;

    async fn type_text(&mut self, element: &ElementHandle, text: &str) -> Result<()>;

    /// End the browser session
    async fn quit(&mut self) -> Result<()>;
}

fn timeout_error(what: impl Into<String>, timeout: Duration) -> RouterSignalError {
    RouterSignalError::Timeout {
        what: what.into(),
        timeout_ms: timeout.as_millis() as u64,
    }
}

async fn pause_until_next_poll(deadline: Instant, poll: Duration) {
    let remaining = deadline.saturating_duration_since(Instant::now());
    sleep(poll.min(remaining)).await;
}

/// Poll until `locator` is present or `timeout` elapses.
///
/// # Errors
///
/// `Timeout` if the element never appears, or any driver error.
pub async fn wait_for_present<D: Driver + ?Sized>(
    driver: &mut D,
    locator: &Locator,
    timeout: Duration,
    poll: Duration,
) -> Result<ElementHandle> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(element) = driver.find_element(locator).await? {
            return Ok(element);
        }
        if Instant::now() >= deadline {
            debug!("{} not present after {:?}", locator, timeout);
            return Err(timeout_error(locator.to_string(), timeout));
        }
        pause_until_next_poll(deadline, poll).await;
    }
}

/// Poll until `locator` is present and clickable or `timeout` elapses.
pub async fn wait_for_clickable<D: Driver + ?Sized>(
    driver: &mut D,
    locator: &Locator,
    timeout: Duration,
    poll: Duration,
) -> Result<ElementHandle> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(element) = driver.find_element(locator).await? {
            if driver.is_clickable(&element).await? {
                return Ok(element);
            }
        }
        if Instant::now() >= deadline {
            debug!("{} not clickable after {:?}", locator, timeout);
            return Err(timeout_error(format!("clickable {}", locator), timeout));
        }
        pause_until_next_poll(deadline, poll).await;
    }
}

/// Poll `predicate` over the current URL and page source.
///
/// Returns `Ok(false)` on timeout; only driver errors are `Err`.
pub async fn wait_until<D, F>(
    driver: &mut D,
    predicate: F,
    timeout: Duration,
    poll: Duration,
) -> Result<bool>
where
    D: Driver + ?Sized,
    F: Fn(&PageState) -> bool + Send,
{
    let deadline = Instant::now() + timeout;
    loop {
        let state = PageState {
            url: driver.current_url().await?,
            source: driver.page_source().await?,
        };
        if predicate(&state) {
            return Ok(true);
        }
        if Instant::now() >= deadline {
            return Ok(false);
        }
        pause_until_next_poll(deadline, poll).await;
    }
}

#[cfg(test)]
mod tests {
    use super::mocks::{ClickAction, MockDriver, MockElement, MockPage};
    use super::*;

    const POLL: Duration = Duration::from_millis(250);

    fn driver_on(url: &str, page: MockPage) -> MockDriver {
        let driver = MockDriver::new();
        driver.set_page(url, page);
        driver
    }

    #[test]
    fn test_locator_display() {
        assert_eq!(Locator::id("connStatus").to_string(), "id=connStatus");
        assert_eq!(Locator::xpath("//div").to_string(), "xpath=//div");
    }

    #[test]
    fn test_containing_text_locator() {
        assert_eq!(
            Locator::containing_text("Network Information"),
            Locator::XPath("//*[contains(text(), 'Network Information')]".to_string())
        );
    }

    #[test]
    fn test_containing_text_with_apostrophe() {
        assert_eq!(
            Locator::containing_text("Operator's Info"),
            Locator::XPath("//*[contains(text(), \"Operator's Info\")]".to_string())
        );
        assert_eq!(
            Locator::containing_text(r#"5G "NR" Carrier's"#),
            Locator::XPath(r#"//*[contains(text(), concat('5G "NR" Carrier', "'", 's'))]"#.to_string())
        );
    }

    #[test]
    fn test_locator_from_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            locator: Locator,
        }
        let w: Wrapper = toml::from_str(r#"locator = { by = "xpath", value = "//li" }"#).unwrap();
        assert_eq!(w.locator, Locator::xpath("//li"));
        let w: Wrapper = toml::from_str(r#"locator = { by = "id", value = "sigStr" }"#).unwrap();
        assert_eq!(w.locator, Locator::id("sigStr"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_present_finds_element() {
        let mut driver = driver_on("http://r/a", MockPage::new().with_element(MockElement::id("x")));
        driver.navigate("http://r/a").await.unwrap();

        let result = wait_for_present(&mut driver, &Locator::id("x"), Duration::from_secs(1), POLL).await;
        assert!(result.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_present_times_out() {
        let mut driver = driver_on("http://r/a", MockPage::new());
        driver.navigate("http://r/a").await.unwrap();

        let start = Instant::now();
        let err = wait_for_present(&mut driver, &Locator::id("x"), Duration::from_secs(10), POLL)
            .await
            .unwrap_err();
        assert!(matches!(err, RouterSignalError::Timeout { timeout_ms: 10000, .. }));
        assert!(start.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_clickable_skips_disabled() {
        let mut driver = driver_on(
            "http://r/a",
            MockPage::new().with_element(MockElement::id("menu").clickable(false)),
        );
        driver.navigate("http://r/a").await.unwrap();

        let err = wait_for_clickable(&mut driver, &Locator::id("menu"), Duration::from_secs(2), POLL)
            .await
            .unwrap_err();
        assert!(matches!(err, RouterSignalError::Timeout { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_observes_navigation() {
        let mut driver = driver_on(
            "http://r/login",
            MockPage::new().with_element(
                MockElement::id("go").on_click(ClickAction::Navigate("http://r/home".to_string())),
            ),
        );
        driver.set_page("http://r/home", MockPage::new().with_source("<h1>Welcome home</h1>"));
        driver.navigate("http://r/login").await.unwrap();

        let go = driver.find_element_by_id("go").await.unwrap().unwrap();
        driver.click(&go).await.unwrap();

        let matched = wait_until(
            &mut driver,
            |state| state.source.contains("Welcome"),
            Duration::from_secs(5),
            POLL,
        )
        .await
        .unwrap();
        assert!(matched);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_false_on_timeout() {
        let mut driver = driver_on("http://r/login", MockPage::new());
        driver.navigate("http://r/login").await.unwrap();

        let matched = wait_until(
            &mut driver,
            |state| state.url != "http://r/login",
            Duration::from_secs(30),
            POLL,
        )
        .await
        .unwrap();
        assert!(!matched);
    }
}
