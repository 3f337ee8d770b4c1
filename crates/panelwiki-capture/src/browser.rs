//! Browser automation boundary
//!
//! [`BrowserDriver`] opens sessions; a [`BrowserSession`] is one headless
//! browser window. [`WebDriverClient`] speaks the W3C WebDriver protocol
//! (e.g. geckodriver) over HTTP.

use crate::client::check_status;
use crate::error::ClientError;
use base64::Engine;
use reqwest::{Client, Method};
use serde_json::{json, Value};
use std::time::Duration;

/// W3C element reference key
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Options for a new browser session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserOptions {
    /// Viewport width
    pub width: u32,
    /// Viewport height
    pub height: u32,
    /// Accept self-signed certificates
    pub accept_insecure_certs: bool,
    /// Page load timeout
    pub page_load_timeout: Duration,
}

/// Opaque element handle
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementId(pub String);

/// Opens browser sessions
#[async_trait::async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Start a new headless session
    async fn open(&self, options: &BrowserOptions) -> Result<Box<dyn BrowserSession>, ClientError>;
}

/// One browser session
#[async_trait::async_trait]
pub trait BrowserSession: Send {
    /// Navigate and wait for the page load
    async fn goto(&mut self, url: &str) -> Result<(), ClientError>;

    /// Current document URL
    async fn current_url(&mut self) -> Result<String, ClientError>;

    /// First element matching a CSS selector, if any
    async fn find(&mut self, css: &str) -> Result<Option<ElementId>, ClientError>;

    /// Type into an element
    async fn send_keys(&mut self, element: &ElementId, text: &str) -> Result<(), ClientError>;

    /// Click an element
    async fn click(&mut self, element: &ElementId) -> Result<(), ClientError>;

    /// PNG of the element clipped to its bounding box
    async fn element_screenshot(&mut self, element: &ElementId) -> Result<Vec<u8>, ClientError>;

    /// End the session
    async fn close(&mut self) -> Result<(), ClientError>;
}

/// W3C WebDriver endpoint
#[derive(Debug, Clone)]
pub struct WebDriverClient {
    endpoint: String,
    http: Client,
}

impl WebDriverClient {
    /// Client for a WebDriver server such as `http://localhost:4444`
    ///
    /// # Errors
    /// Returns [`ClientError::Transport`] if the HTTP client cannot be built.
    pub fn new(endpoint: &str) -> Result<Self, ClientError> {
        let http = Client::builder()
            .build()
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            http,
        })
    }
}

fn capabilities(options: &BrowserOptions) -> Value {
    json!({
        "capabilities": {
            "alwaysMatch": {
                "browserName": "firefox",
                "acceptInsecureCerts": options.accept_insecure_certs,
                "timeouts": {
                    "pageLoad": u64::try_from(options.page_load_timeout.as_millis()).unwrap_or(u64::MAX)
                },
                "moz:firefoxOptions": {
                    "args": [
                        "-headless",
                        format!("--width={}", options.width),
                        format!("--height={}", options.height)
                    ]
                }
            }
        }
    })
}

#[async_trait::async_trait]
impl BrowserDriver for WebDriverClient {
    #[tracing::instrument(skip(self), err)]
    async fn open(&self, options: &BrowserOptions) -> Result<Box<dyn BrowserSession>, ClientError> {
        let response = self
            .http
            .post(format!("{}/session", self.endpoint))
            .json(&capabilities(options))
            .send()
            .await?;
        let body: Value = check_status(response).await?.json().await?;
        let id = body
            .pointer("/value/sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| ClientError::Decode("new session response has no sessionId".into()))?
            .to_string();
        tracing::debug!("Opened WebDriver session {}", id);

        let mut session = WebDriverSession {
            base: format!("{}/session/{id}", self.endpoint),
            http: self.http.clone(),
            closed: false,
        };
        let resized = session
            .command(
                Method::POST,
                "/window/rect",
                Some(json!({"width": options.width, "height": options.height})),
            )
            .await;
        if let Err(e) = resized {
            // the server keeps the session until it is deleted
            if let Err(close) = session.close().await {
                tracing::warn!("Could not delete WebDriver session {}: {}", id, close);
            }
            return Err(e);
        }
        Ok(Box::new(session))
    }
}

/// Session on a WebDriver server
#[derive(Debug)]
struct WebDriverSession {
    base: String,
    http: Client,
    closed: bool,
}

impl WebDriverSession {
    async fn command(
        &mut self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, ClientError> {
        let mut request = self.http.request(method, format!("{}{path}", self.base));
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = check_status(request.send().await?).await?;
        let mut body: Value = response.json().await?;
        Ok(body.get_mut("value").map(Value::take).unwrap_or(Value::Null))
    }
}

#[async_trait::async_trait]
impl BrowserSession for WebDriverSession {
    async fn goto(&mut self, url: &str) -> Result<(), ClientError> {
        self.command(Method::POST, "/url", Some(json!({ "url": url })))
            .await
            .map(|_| ())
    }

    async fn current_url(&mut self) -> Result<String, ClientError> {
        let value = self.command(Method::GET, "/url", None).await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ClientError::Decode("current url is not a string".into()))
    }

    async fn find(&mut self, css: &str) -> Result<Option<ElementId>, ClientError> {
        let result = self
            .command(
                Method::POST,
                "/element",
                Some(json!({"using": "css selector", "value": css})),
            )
            .await;
        match result {
            Ok(value) => value
                .get(ELEMENT_KEY)
                .and_then(Value::as_str)
                .map(|id| Some(ElementId(id.to_string())))
                .ok_or_else(|| ClientError::Decode("element reference missing".into())),
            Err(ClientError::Status { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn send_keys(&mut self, element: &ElementId, text: &str) -> Result<(), ClientError> {
        self.command(
            Method::POST,
            &format!("/element/{}/value", element.0),
            Some(json!({ "text": text })),
        )
        .await
        .map(|_| ())
    }

    async fn click(&mut self, element: &ElementId) -> Result<(), ClientError> {
        self.command(
            Method::POST,
            &format!("/element/{}/click", element.0),
            Some(json!({})),
        )
        .await
        .map(|_| ())
    }

    async fn element_screenshot(&mut self, element: &ElementId) -> Result<Vec<u8>, ClientError> {
        let value = self
            .command(
                Method::GET,
                &format!("/element/{}/screenshot", element.0),
                None,
            )
            .await?;
        let encoded = value
            .as_str()
            .ok_or_else(|| ClientError::Decode("screenshot is not a string".into()))?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| ClientError::Decode(format!("screenshot is not base64: {e}")))
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.command(Method::DELETE, "", None).await.map(|_| ())
    }
}
