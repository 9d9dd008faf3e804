//! Scripted in-memory browser for tests.
//!
//! Pages are keyed by URL. Clicking an element can load another page,
//! reveal more elements on the current one, or check typed credentials
//! the way the router's login form does.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use super::{Driver, ElementHandle, Locator};
use crate::config::Config;
use crate::error::{Result, RouterSignalError};

/// What happens when an element is clicked.
#[derive(Debug, Clone, Default)]
pub enum ClickAction {
    #[default]
    Nothing,
    /// Load another page
    Navigate(String),
    /// Add elements to the current page without a reload
    Reveal(Vec<MockElement>),
    /// Load `success_url` if the typed credentials match
    SubmitLogin {
        username_id: String,
        password_id: String,
        username: String,
        password: String,
        success_url: String,
    },
}

#[derive(Debug, Clone)]
pub struct MockElement {
    pub locators: Vec<Locator>,
    pub text: String,
    pub clickable: bool,
    pub on_click: ClickAction,
    value: String,
}

impl MockElement {
    pub fn id(id: &str) -> Self {
        Self::new(Locator::id(id))
    }

    pub fn new(locator: Locator) -> Self {
        Self {
            locators: vec![locator],
            text: String::new(),
            clickable: true,
            on_click: ClickAction::Nothing,
            value: String::new(),
        }
    }

    pub fn also(mut self, locator: Locator) -> Self {
        self.locators.push(locator);
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn clickable(mut self, clickable: bool) -> Self {
        self.clickable = clickable;
        self
    }

    pub fn on_click(mut self, action: ClickAction) -> Self {
        self.on_click = action;
        self
    }

    fn label(&self) -> String {
        self.locators
            .first()
            .map(ToString::to_string)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MockPage {
    pub source: String,
    pub elements: Vec<MockElement>,
}

impl MockPage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, source: &str) -> Self {
        self.source = source.to_string();
        self
    }

    pub fn with_element(mut self, element: MockElement) -> Self {
        self.elements.push(element);
        self
    }
}

#[derive(Debug, Default)]
struct MockState {
    pages: HashMap<String, MockPage>,
    unreachable: HashSet<String>,
    current_url: String,
    live: MockPage,
    generation: u64,
    calls: Vec<String>,
    quit: bool,
}

impl MockState {
    fn load(&mut self, url: &str) {
        self.current_url = url.to_string();
        self.live = self.pages.get(url).cloned().unwrap_or_default();
        self.generation += 1;
    }

    fn element_index(&self, handle: &ElementHandle) -> Result<usize> {
        let stale = || RouterSignalError::DriverFault(format!("stale element reference: {}", handle.0));
        let (generation, index) = handle.0.split_once(':').ok_or_else(stale)?;
        let generation: u64 = generation.parse().map_err(|_| stale())?;
        let index: usize = index.parse().map_err(|_| stale())?;
        if generation != self.generation || index >= self.live.elements.len() {
            return Err(stale());
        }
        Ok(index)
    }

    fn value_of(&self, id: &str) -> Option<String> {
        let locator = Locator::id(id);
        self.live
            .elements
            .iter()
            .find(|e| e.locators.contains(&locator))
            .map(|e| e.value.clone())
    }
}

/// Mock browser; clones share state so tests can inspect it after handing
/// one to a session.
#[derive(Debug, Clone, Default)]
pub struct MockDriver {
    state: Arc<Mutex<MockState>>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define (or replace) the page served at `url`.
    pub fn set_page(&self, url: &str, page: MockPage) {
        self.state.lock().unwrap().pages.insert(url.to_string(), page);
    }

    /// Navigating to `url` fails with a driver fault.
    pub fn set_unreachable(&self, url: &str) {
        self.state.lock().unwrap().unreachable.insert(url.to_string());
    }

    pub fn url(&self) -> String {
        self.state.lock().unwrap().current_url.clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn is_quit(&self) -> bool {
        self.state.lock().unwrap().quit
    }
}

#[async_trait]
impl Driver for MockDriver {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("navigate:{}", url));
        if state.unreachable.contains(url) {
            return Err(RouterSignalError::DriverFault(format!("net::ERR_NAME_NOT_RESOLVED at {}", url)));
        }
        state.load(url);
        Ok(())
    }

    async fn refresh(&mut self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("refresh".to_string());
        let url = state.current_url.clone();
        state.load(&url);
        Ok(())
    }

    async fn current_url(&mut self) -> Result<String> {
        Ok(self.url())
    }

    async fn page_source(&mut self) -> Result<String> {
        Ok(self.state.lock().unwrap().live.source.clone())
    }

    async fn find_element(&mut self, locator: &Locator) -> Result<Option<ElementHandle>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .live
            .elements
            .iter()
            .position(|e| e.locators.contains(locator))
            .map(|index| ElementHandle(format!("{}:{}", state.generation, index))))
    }

    async fn is_clickable(&mut self, element: &ElementHandle) -> Result<bool> {
        let state = self.state.lock().unwrap();
        let index = state.element_index(element)?;
        Ok(state.live.elements[index].clickable)
    }

    async fn element_text(&mut self, element: &ElementHandle) -> Result<String> {
        let state = self.state.lock().unwrap();
        let index = state.element_index(element)?;
        Ok(state.live.elements[index].text.clone())
    }

    async fn click(&mut self, element: &ElementHandle) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let index = state.element_index(element)?;
        let clicked = state.live.elements[index].clone();
        state.calls.push(format!("click:{}", clicked.label()));

        match clicked.on_click {
            ClickAction::Nothing => {}
            ClickAction::Navigate(url) => state.load(&url),
            ClickAction::Reveal(elements) => state.live.elements.extend(elements),
            ClickAction::SubmitLogin { username_id, password_id, username, password, success_url } => {
                let accepted = state.value_of(&username_id).as_deref() == Some(username.as_str())
                    && state.value_of(&password_id).as_deref() == Some(password.as_str());
                if accepted {
                    state.load(&success_url);
                }
            }
        }
        Ok(())
    }

    async fn clear(&mut self, element: &ElementHandle) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let index = state.element_index(element)?;
        state.live.elements[index].value.clear();
        Ok(())
    }

    async fn type_text(&mut self, element: &ElementHandle, text: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let index = state.element_index(element)?;
        state.live.elements[index].value.push_str(text);
        Ok(())
    }

    async fn quit(&mut self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("quit".to_string());
        state.quit = true;
        Ok(())
    }
}

/// Home page the router lands on after login.
pub const HOME_PATH: &str = "/index.html";

/// Login form for `config`'s element ids, accepting `config`'s credentials.
pub fn login_page(config: &Config, success_url: &str) -> MockPage {
    let login = &config.login;
    MockPage::new()
        .with_source("<title>Login</title>")
        .with_element(MockElement::id(&login.username_field))
        .with_element(MockElement::id(&login.password_field))
        .with_element(MockElement::id(&login.submit_button).on_click(ClickAction::SubmitLogin {
            username_id: login.username_field.clone(),
            password_id: login.password_field.clone(),
            username: config.credentials.username.clone(),
            password: config.credentials.password.clone(),
            success_url: success_url.to_string(),
        }))
}

/// Home page whose menu reveals the telemetry module.
pub fn home_page(config: &Config) -> MockPage {
    let nav = &config.navigation;
    let module = MockElement::new(nav.module_locator.clone())
        .also(Locator::containing_text(&nav.module_display_name))
        .with_text(&nav.module_display_name)
        .on_click(ClickAction::Navigate(config.target_url()));
    MockPage::new()
        .with_source("<div class=\"menu\">APP MODULE</div>")
        .with_element(MockElement::new(nav.menu_locator.clone()).on_click(ClickAction::Reveal(vec![module])))
}

/// Telemetry page with the ready marker and the given `(element id, text)` fields.
pub fn telemetry_page(config: &Config, fields: &[(&str, &str)]) -> MockPage {
    let mut page = MockPage::new().with_source("<h2>Network Information</h2>");
    let ready = config.page.ready_elements.first().map(String::as_str);
    if let Some(ready) = ready {
        if !fields.iter().any(|(id, _)| *id == ready) {
            page = page.with_element(MockElement::id(ready).with_text("Connected"));
        }
    }
    for (id, text) in fields {
        page = page.with_element(MockElement::id(id).with_text(text));
    }
    page
}

/// Router with login -> home -> menu -> telemetry page wired up.
pub fn router(config: &Config, fields: &[(&str, &str)]) -> MockDriver {
    let driver = MockDriver::new();
    let home = config.resolve_url(HOME_PATH);
    driver.set_page(&config.login_url(), login_page(config, &home));
    driver.set_page(&home, home_page(config));
    driver.set_page(&config.target_url(), telemetry_page(config, fields));
    driver
}
