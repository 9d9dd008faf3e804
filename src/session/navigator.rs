//! # Session Navigator
//!
//! Logs in and walks the router UI to the telemetry page.
//!
//! ## Login
//!
//! 1. Load the login URL, fill the form, submit.
//! 2. Wait for any configured [`SuccessSignal`].
//! 3. Otherwise try each alternate URL in order. A candidate succeeds when
//!    the URL changes after submit; a candidate without the form is skipped.
//!
//! ## Positioning
//!
//! Already on the target path: nothing to do. On the home page: open the
//! menu and click the module (exact locator first, then by display name).
//! Anywhere else, or if the menu fails: navigate straight to the target URL.
//! Either way the page only counts once one of its ready elements shows up.

use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

use super::{Credentials, Session, SessionState, SuccessSignal};
use crate::config::{Config, LoginConfig, NavigationConfig};
use crate::driver::{wait_for_clickable, wait_for_present, wait_until, Driver, ElementHandle, Locator};
use crate::error::{Result, RouterSignalError};

fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

/// Drives a [`Session`] through login and positioning.
#[derive(Debug, Clone)]
pub struct Navigator {
    credentials: Credentials,
    login: LoginConfig,
    navigation: NavigationConfig,
    ready_elements: Vec<String>,
    login_url: String,
    target_url: String,
    fallback_urls: Vec<String>,
    poll: Duration,
}

impl Navigator {
    pub fn from_config(config: &Config) -> Self {
        Self {
            credentials: config.credentials.clone(),
            login: config.login.clone(),
            navigation: config.navigation.clone(),
            ready_elements: config.page.ready_elements.clone(),
            login_url: config.login_url(),
            target_url: config.target_url(),
            fallback_urls: config.fallback_urls(),
            poll: ms(config.webdriver.poll_interval_ms),
        }
    }

    pub fn login_url(&self) -> &str {
        &self.login_url
    }

    /// Log in, falling back to the alternate URLs.
    ///
    /// # Errors
    ///
    /// `AllCandidatesExhausted` when the primary attempt and every alternate
    /// failed. The session is left `Failed`.
    pub async fn login<D: Driver>(&self, session: &mut Session<D>) -> Result<()> {
        if session.state() != SessionState::Unauthenticated {
            info!("Re-login requested (session was {})", session.state());
            session.set_state(SessionState::Unauthenticated);
        }
        session.set_state(SessionState::Authenticating);

        let driver = session.driver_mut();
        match self.primary_login(driver).await {
            Ok(()) => {
                let url = driver.current_url().await.unwrap_or_default();
                info!("Login successful - redirected to: {}", url);
                session.set_state(SessionState::Authenticated);
                return Ok(());
            }
            Err(e) => warn!("Primary login failed: {}; trying alternate login URLs", e),
        }

        match self.fallback_login(driver).await {
            Ok(url) => {
                info!("Alternate login successful via: {}", url);
                session.set_state(SessionState::Authenticated);
                Ok(())
            }
            Err(e) => {
                error!("All login methods failed - credentials may be incorrect");
                session.set_state(SessionState::Failed);
                Err(e)
            }
        }
    }

    async fn primary_login<D: Driver>(&self, driver: &mut D) -> Result<()> {
        let login = &self.login;

        info!("Navigating to {}", self.login_url);
        driver.navigate(&self.login_url).await?;
        sleep(ms(login.page_settle_ms)).await;

        let username = wait_for_present(
            driver,
            &Locator::id(&login.username_field),
            ms(login.element_timeout_ms),
            self.poll,
        )
        .await
        .map_err(|e| match e {
            RouterSignalError::Timeout { .. } => {
                RouterSignalError::ElementNotFound(login.username_field.clone())
            }
            other => other,
        })?;
        let password = require(driver, &login.password_field).await?;
        let submit = require(driver, &login.submit_button).await?;
        debug!("Login form elements found");

        self.fill_and_submit(driver, &username, &password, &submit, ms(login.input_delay_ms))
            .await?;
        sleep(ms(login.submit_settle_ms)).await;

        let signals = &login.success_signals;
        let login_url = self.login_url.as_str();
        let accepted = wait_until(
            driver,
            |page| SuccessSignal::any_matches(signals, page, login_url),
            ms(login.success_timeout_ms),
            self.poll,
        )
        .await?;

        if accepted {
            Ok(())
        } else {
            let url = driver.current_url().await.unwrap_or_default();
            warn!("Login timeout - current URL: {}", url);
            Err(RouterSignalError::Timeout {
                what: "login success signal".to_string(),
                timeout_ms: login.success_timeout_ms,
            })
        }
    }

    async fn fill_and_submit<D: Driver>(
        &self,
        driver: &mut D,
        username: &ElementHandle,
        password: &ElementHandle,
        submit: &ElementHandle,
        input_delay: Duration,
    ) -> Result<()> {
        driver.clear(username).await?;
        sleep(input_delay).await;
        driver.type_text(username, &self.credentials.username).await?;
        sleep(input_delay).await;
        driver.clear(password).await?;
        sleep(input_delay).await;
        driver.type_text(password, &self.credentials.password).await?;
        sleep(input_delay).await;

        debug!("Credentials entered, clicking login button");
        driver.click(submit).await
    }

    /// Returns the candidate URL that worked.
    async fn fallback_login<D: Driver>(&self, driver: &mut D) -> Result<String> {
        for url in &self.fallback_urls {
            info!("Trying URL: {}", url);
            match self.try_candidate(driver, url).await {
                Ok(true) => return Ok(url.clone()),
                Ok(false) => info!("Login via {} stayed on the same page", url),
                Err(RouterSignalError::ElementNotFound(what)) => {
                    info!("Login elements not found on {} ({})", url, what)
                }
                Err(e) => info!("Failed to access {}: {}", url, e),
            }
        }

        Err(RouterSignalError::AllCandidatesExhausted(format!(
            "primary login and {} alternate URLs failed",
            self.fallback_urls.len()
        )))
    }

    async fn try_candidate<D: Driver>(&self, driver: &mut D, url: &str) -> Result<bool> {
        let login = &self.login;

        driver.navigate(url).await?;
        sleep(ms(login.page_settle_ms)).await;

        let username = require(driver, &login.username_field).await?;
        let password = require(driver, &login.password_field).await?;
        let submit = require(driver, &login.submit_button).await?;

        self.fill_and_submit(driver, &username, &password, &submit, Duration::ZERO)
            .await?;
        sleep(ms(login.fallback_settle_ms)).await;

        Ok(driver.current_url().await? != url)
    }

    /// Make sure the session is on the telemetry page.
    ///
    /// Idempotent: when already there, no navigation or clicks are issued.
    ///
    /// # Errors
    ///
    /// - `InvalidState` unless the session is authenticated
    /// - `SessionExpired` if the router sent us back to its login page
    /// - `ElementNotFound` if no ready element appeared
    ///
    /// Any error leaves the session `Failed`.
    pub async fn ensure_positioned<D: Driver>(&self, session: &mut Session<D>) -> Result<()> {
        match session.state() {
            SessionState::Authenticated | SessionState::Positioned => {}
            found => {
                return Err(RouterSignalError::InvalidState {
                    expected: "authenticated",
                    found,
                })
            }
        }

        match self.position(session.driver_mut()).await {
            Ok(()) => {
                session.set_state(SessionState::Positioned);
                Ok(())
            }
            Err(e) => {
                session.set_state(SessionState::Failed);
                Err(e)
            }
        }
    }

    async fn position<D: Driver>(&self, driver: &mut D) -> Result<()> {
        let url = driver.current_url().await?;
        let target_path = self.navigation.target_path.as_str();

        if url.contains(target_path) {
            debug!("Already on telemetry page");
        } else if url.contains(&self.login.login_path) {
            return Err(RouterSignalError::SessionExpired(url));
        } else if self.is_home(&url) {
            info!("On homepage, navigating through the menu");
            if let Err(e) = self.traverse_menu(driver).await {
                warn!("Menu navigation failed ({}); navigating directly", e);
                driver.navigate(&self.target_url).await?;
            }
        } else {
            driver.navigate(&self.target_url).await?;
            info!("Navigated directly to {}", self.target_url);
        }

        self.confirm_target(driver).await
    }

    fn is_home(&self, url: &str) -> bool {
        self.navigation.home_markers.iter().any(|m| url.contains(m.as_str()))
    }

    async fn traverse_menu<D: Driver>(&self, driver: &mut D) -> Result<()> {
        let nav = &self.navigation;
        let wait = ms(nav.wait_timeout_ms);

        let menu = wait_for_clickable(driver, &nav.menu_locator, wait, self.poll).await?;
        driver.click(&menu).await?;
        debug!("Clicked menu item {}", nav.menu_locator);
        sleep(ms(nav.menu_settle_ms)).await;

        let module = match wait_for_clickable(driver, &nav.module_locator, wait, self.poll).await {
            Ok(element) => element,
            Err(RouterSignalError::Timeout { .. }) => {
                debug!("Module locator missed; matching on '{}'", nav.module_display_name);
                let loose = Locator::containing_text(&nav.module_display_name);
                wait_for_clickable(driver, &loose, wait, self.poll).await?
            }
            Err(e) => return Err(e),
        };
        driver.click(&module).await?;
        info!("Clicked {} module", nav.module_display_name);
        Ok(())
    }

    async fn confirm_target<D: Driver>(&self, driver: &mut D) -> Result<()> {
        let wait = ms(self.navigation.wait_timeout_ms);
        for id in &self.ready_elements {
            match wait_for_present(driver, &Locator::id(id), wait, self.poll).await {
                Ok(_) => {
                    debug!("Telemetry page ready ({} present)", id);
                    return Ok(());
                }
                Err(RouterSignalError::Timeout { .. }) => continue,
                Err(e) => return Err(e),
            }
        }

        Err(RouterSignalError::ElementNotFound(format!(
            "telemetry page markers ({})",
            self.ready_elements.join(", ")
        )))
    }
}

async fn require<D: Driver>(driver: &mut D, id: &str) -> Result<ElementHandle> {
    driver
        .find_element_by_id(id)
        .await?
        .ok_or_else(|| RouterSignalError::ElementNotFound(id.to_string()))
}
