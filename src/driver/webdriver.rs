//! # WebDriver Client
//!
//! [`Driver`] over the W3C WebDriver HTTP protocol (chromedriver,
//! geckodriver, msedgedriver).
//!
//! The browser session is created lazily on the first command and again
//! after the server reports it gone, so a crashed browser is replaced on
//! the next cycle instead of wedging the monitor.

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::{json, Value};
use tokio::time::Duration;
use tracing::{debug, info, warn};

use super::{Driver, ElementHandle, Locator};
use crate::config::WebDriverConfig;
use crate::error::{Result, RouterSignalError};

/// Key of the element reference object in W3C responses
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

const NO_SUCH_ELEMENT: &str = "no such element";
const INVALID_SESSION: &str = "invalid session id";

/// Error object returned by the remote end.
#[derive(Debug, Clone, PartialEq, Eq)]
struct WireError {
    error: String,
    message: String,
}

impl WireError {
    fn from_payload(payload: &Value, status: u16) -> Self {
        let value = payload.get("value").unwrap_or(payload);
        let field = |name: &str| value.get(name).and_then(Value::as_str).map(str::to_string);
        Self {
            error: field("error").unwrap_or_else(|| format!("http {}", status)),
            message: field("message").unwrap_or_default(),
        }
    }

    fn into_fault(self) -> RouterSignalError {
        RouterSignalError::DriverFault(format!("{}: {}", self.error, self.message))
    }
}

/// W3C location strategy and selector for a [`Locator`].
///
/// The W3C protocol has no `id` strategy; ids go through an attribute
/// selector.
fn locator_strategy(locator: &Locator) -> (&'static str, String) {
    match locator {
        Locator::Id(id) => ("css selector", format!("[id=\"{}\"]", id.replace('"', "\\\""))),
        Locator::XPath(expr) => ("xpath", expr.clone()),
        Locator::Css(selector) => ("css selector", selector.clone()),
    }
}

/// `New Session` capabilities for the configured browser.
fn capabilities(config: &WebDriverConfig) -> Value {
    let browser = config.browser_name.to_lowercase();
    let (options_key, headless_flag) = match browser.as_str() {
        "firefox" => ("moz:firefoxOptions", "-headless"),
        "msedge" | "microsoftedge" => ("ms:edgeOptions", "--headless=new"),
        _ => ("goog:chromeOptions", "--headless=new"),
    };

    let mut args = config.browser_args.clone();
    if config.headless && !args.iter().any(|a| a.trim_start_matches('-').starts_with("headless")) {
        args.push(headless_flag.to_string());
    }

    json!({
        "capabilities": {
            "alwaysMatch": {
                "browserName": config.browser_name,
                options_key: { "args": args },
            }
        }
    })
}

fn element_handle(value: &Value) -> Result<ElementHandle> {
    value
        .get(ELEMENT_KEY)
        .and_then(Value::as_str)
        .map(|id| ElementHandle(id.to_string()))
        .ok_or_else(|| RouterSignalError::DriverFault(format!("malformed element reference: {}", value)))
}

fn string_value(value: Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s),
        Value::Null => Ok(String::new()),
        other => Err(RouterSignalError::DriverFault(format!("expected string, got {}", other))),
    }
}

pub struct WebDriverClient {
    http: Client,
    server_url: String,
    capabilities: Value,
    session_id: Option<String>,
}

impl WebDriverClient {
    pub fn new(config: &WebDriverConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(config.command_timeout_ms))
            .build()?;

        Ok(Self {
            http,
            server_url: config.server_url.trim_end_matches('/').to_string(),
            capabilities: capabilities(config),
            session_id: None,
        })
    }

    async fn ensure_session(&mut self) -> Result<String> {
        if let Some(id) = &self.session_id {
            return Ok(id.clone());
        }

        let url = format!("{}/session", self.server_url);
        let body = self.capabilities.clone();
        let value = self.call(Method::POST, &url, Some(body)).await?.map_err(WireError::into_fault)?;

        let id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| RouterSignalError::DriverFault(format!("no sessionId in {}", value)))?
            .to_string();
        info!("WebDriver session {} started at {}", id, self.server_url);
        self.session_id = Some(id.clone());
        Ok(id)
    }

    /// One HTTP round trip. The outer error is transport; the inner one is
    /// the remote end rejecting the command.
    async fn call(
        &self,
        method: Method,
        url: &str,
        body: Option<Value>,
    ) -> Result<std::result::Result<Value, WireError>> {
        let mut request = self.http.request(method, url);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        let payload: Value = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text)?
        };

        if status.is_success() {
            Ok(Ok(payload.get("value").cloned().unwrap_or(Value::Null)))
        } else {
            Ok(Err(WireError::from_payload(&payload, status.as_u16())))
        }
    }

    /// Command scoped to the current session.
    async fn session_call(
        &mut self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<std::result::Result<Value, WireError>> {
        let session = self.ensure_session().await?;
        let url = format!("{}/session/{}{}", self.server_url, session, path);
        let reply = self.call(method, &url, body).await?;

        if let Err(e) = &reply {
            if e.error == INVALID_SESSION {
                warn!("WebDriver session {} is gone; a new one will be started", session);
                self.session_id = None;
            }
        }
        Ok(reply)
    }

    async fn command(&mut self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        self.session_call(method, path, body).await?.map_err(WireError::into_fault)
    }

    async fn element_command(&mut self, method: Method, element: &ElementHandle, action: &str, body: Option<Value>) -> Result<Value> {
        let path = format!("/element/{}/{}", element.0, action);
        self.command(method, &path, body).await
    }
}

#[async_trait]
impl Driver for WebDriverClient {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        debug!("Navigating to {}", url);
        self.command(Method::POST, "/url", Some(json!({ "url": url }))).await?;
        Ok(())
    }

    async fn refresh(&mut self) -> Result<()> {
        self.command(Method::POST, "/refresh", Some(json!({}))).await?;
        Ok(())
    }

    async fn current_url(&mut self) -> Result<String> {
        string_value(self.command(Method::GET, "/url", None).await?)
    }

    async fn page_source(&mut self) -> Result<String> {
        string_value(self.command(Method::GET, "/source", None).await?)
    }

    async fn find_element(&mut self, locator: &Locator) -> Result<Option<ElementHandle>> {
        let (using, value) = locator_strategy(locator);
        let body = json!({ "using": using, "value": value });
        match self.session_call(Method::POST, "/element", Some(body)).await? {
            Ok(found) => element_handle(&found).map(Some),
            Err(e) if e.error == NO_SUCH_ELEMENT => Ok(None),
            Err(e) => Err(e.into_fault()),
        }
    }

    async fn is_clickable(&mut self, element: &ElementHandle) -> Result<bool> {
        let displayed = self.element_command(Method::GET, element, "displayed", None).await?;
        if displayed != Value::Bool(true) {
            return Ok(false);
        }
        let enabled = self.element_command(Method::GET, element, "enabled", None).await?;
        Ok(enabled == Value::Bool(true))
    }

    async fn element_text(&mut self, element: &ElementHandle) -> Result<String> {
        string_value(self.element_command(Method::GET, element, "text", None).await?)
    }

    async fn click(&mut self, element: &ElementHandle) -> Result<()> {
        self.element_command(Method::POST, element, "click", Some(json!({}))).await?;
        Ok(())
    }

    async fn clear(&mut self, element: &ElementHandle) -> Result<()> {
        self.element_command(Method::POST, element, "clear", Some(json!({}))).await?;
        Ok(())
    }

    async fn type_text(&mut self, element: &ElementHandle, text: &str) -> Result<()> {
        self.element_command(Method::POST, element, "value", Some(json!({ "text": text }))).await?;
        Ok(())
    }

    async fn quit(&mut self) -> Result<()> {
        let Some(session) = self.session_id.take() else {
            return Ok(());
        };
        let url = format!("{}/session/{}", self.server_url, session);
        match self.call(Method::DELETE, &url, None).await? {
            Ok(_) => {
                info!("WebDriver session {} closed", session);
                Ok(())
            }
            Err(e) if e.error == INVALID_SESSION => Ok(()),
            Err(e) => Err(e.into_fault()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    fn config() -> WebDriverConfig {
        WebDriverConfig {
            server_url: "http://localhost:9515/".to_string(),
            browser_name: "chrome".to_string(),
            headless: true,
            browser_args: vec!["--no-sandbox".to_string()],
            poll_interval_ms: 250,
            command_timeout_ms: 30000,
        }
    }

    #[test]
    fn test_id_locator_uses_attribute_selector() {
        assert_eq!(
            locator_strategy(&Locator::id("admin_username")),
            ("css selector", "[id=\"admin_username\"]".to_string())
        );
    }

    #[test]
    fn test_xpath_locator_passes_through() {
        let expr = "//div[@class='app-modules']";
        assert_eq!(locator_strategy(&Locator::xpath(expr)), ("xpath", expr.to_string()));
        assert_eq!(
            locator_strategy(&Locator::Css("#sigStr".to_string())),
            ("css selector", "#sigStr".to_string())
        );
    }

    #[test]
    fn test_chrome_capabilities_add_headless() {
        let caps = capabilities(&config());
        let first = &caps["capabilities"]["alwaysMatch"];
        assert_eq!(first["browserName"], "chrome");
        assert_eq!(first["goog:chromeOptions"]["args"], json!(["--no-sandbox", "--headless=new"]));
    }

    #[test]
    fn test_headless_not_duplicated() {
        let mut config = config();
        config.browser_args.push("--headless".to_string());
        let caps = capabilities(&config);
        let args = caps["capabilities"]["alwaysMatch"]["goog:chromeOptions"]["args"].as_array().unwrap().clone();
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn test_visible_browser_and_firefox_options() {
        let mut config = config();
        config.headless = false;
        config.browser_name = "firefox".to_string();
        let caps = capabilities(&config);
        assert_eq!(
            caps["capabilities"]["alwaysMatch"]["moz:firefoxOptions"]["args"],
            json!(["--no-sandbox"])
        );
    }

    #[test]
    fn test_wire_error_parsing() {
        let payload = json!({
            "value": { "error": "no such element", "message": "Unable to locate element", "stacktrace": "" }
        });
        let err = WireError::from_payload(&payload, 404);
        assert_eq!(err.error, NO_SUCH_ELEMENT);
        assert_eq!(err.message, "Unable to locate element");

        let err = WireError::from_payload(&Value::Null, 502);
        assert_eq!(err.error, "http 502");
    }

    #[test]
    fn test_element_handle_extraction() {
        let value = json!({ ELEMENT_KEY: "f.1A2B.d.3C" });
        assert_eq!(element_handle(&value).unwrap(), ElementHandle("f.1A2B.d.3C".to_string()));
        assert!(element_handle(&json!({ "ELEMENT": "legacy" })).is_err());
    }

    #[test]
    fn test_string_value() {
        assert_eq!(string_value(json!("http://192.168.1.1/")).unwrap(), "http://192.168.1.1/");
        assert_eq!(string_value(Value::Null).unwrap(), "");
        assert!(string_value(json!(42)).is_err());
    }

    #[test]
    fn test_new_trims_server_url() {
        let client = WebDriverClient::new(&config()).unwrap();
        assert_eq!(client.server_url, "http://localhost:9515");
        assert!(client.session_id.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_server_fails_command_not_construction() {
        let mut config = config();
        config.server_url = "http://127.0.0.1:1".to_string();
        config.command_timeout_ms = 1000;
        let mut client = assert_ok!(WebDriverClient::new(&config));

        let err = client.navigate("http://192.168.1.1/login.html").await.unwrap_err();

        assert!(err.is_retryable(), "{}", err);
        assert!(client.session_id.is_none());
    }

    #[tokio::test]
    async fn test_quit_without_session_is_noop() {
        let mut client = WebDriverClient::new(&config()).unwrap();
        assert_ok!(client.quit().await);
    }
}
