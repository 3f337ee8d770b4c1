//! Browser screenshot strategy
//!
//! Opens the single-panel view in a headless browser, waits for the panel
//! element and captures it. One session is kept open while consecutive
//! captures share an auth context; a different context closes it first.
//!
//! Form login runs as a short state machine:
//!
//! ```text
//! NotLoggedIn -> Submitting -> LoggedIn
//!                           \-> Failed
//! ```

use crate::browser::{BrowserDriver, BrowserOptions, BrowserSession, ElementId};
use crate::enumerate::{DashboardRef, PanelRef};
use crate::error::{AcquisitionError, ClientError};
use crate::query::PanelQuery;
use crate::strategy::{CaptureStrategy, StrategyKind};
use panelwiki_config::{AuthMode, SourceSpec, TimeWindow};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Poll interval for login redirects and panel elements
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

const LOGIN_PATH: &str = "/login";
const USER_INPUT: &str = r#"input[name="user"]"#;
const PASSWORD_INPUT: &str = r#"input[name="password"]"#;
const SUBMIT_BUTTON: &str = r#"button[type="submit"]"#;

/// Selectors of a rendered panel, oldest Grafana layout first
fn panel_selectors(panel_id: u64) -> [String; 2] {
    [
        format!(r#"[data-panelid="{panel_id}"]"#),
        format!(r#"[data-viz-panel-key="panel-{panel_id}"]"#),
    ]
}

/// Everything that makes a browser session reusable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    host: String,
    mode: &'static str,
    principal: Option<String>,
    verify_ssl: bool,
    width: u32,
    height: u32,
}

impl AuthContext {
    /// Context of a source
    #[must_use]
    pub fn of(source: &SourceSpec) -> Self {
        Self {
            host: source.host.clone(),
            mode: source.auth.label(),
            principal: source.auth.principal().map(str::to_string),
            verify_ssl: source.verify_ssl,
            width: source.width,
            height: source.height,
        }
    }
}

/// Login progress of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginState {
    /// Form not submitted yet
    NotLoggedIn,
    /// Form submitted, waiting to leave the login page
    Submitting,
    /// Authenticated (or no auth needed)
    LoggedIn,
    /// Login did not complete; the message is replayed for later captures
    Failed(String),
}

struct ActiveSession {
    context: AuthContext,
    session: Box<dyn BrowserSession>,
    login: LoginState,
}

/// Captures panels as element screenshots
pub struct ScreenshotStrategy {
    driver: Arc<dyn BrowserDriver>,
    active: Mutex<Option<ActiveSession>>,
}

impl ScreenshotStrategy {
    /// Create a strategy over a browser driver
    #[must_use]
    pub fn new(driver: Arc<dyn BrowserDriver>) -> Self {
        Self {
            driver,
            active: Mutex::new(None),
        }
    }

    /// Login state of the current session, if one is open
    pub async fn login_state(&self) -> Option<LoginState> {
        self.active.lock().await.as_ref().map(|a| a.login.clone())
    }
}

fn driver_error(err: ClientError) -> AcquisitionError {
    match err {
        ClientError::Timeout(message) => AcquisitionError::timeout(message),
        other => AcquisitionError::driver(other.to_string()),
    }
}

async fn open_session(
    driver: &dyn BrowserDriver,
    source: &SourceSpec,
) -> Result<Box<dyn BrowserSession>, AcquisitionError> {
    let options = BrowserOptions {
        width: source.width,
        height: source.height,
        accept_insecure_certs: !source.verify_ssl,
        page_load_timeout: source.timeout,
    };
    driver.open(&options).await.map_err(driver_error)
}

/// Drive the login form until the browser leaves the login page
async fn login(active: &mut ActiveSession, source: &SourceSpec) -> Result<(), AcquisitionError> {
    loop {
        match active.login.clone() {
            LoginState::LoggedIn => return Ok(()),
            LoginState::Failed(message) => return Err(AcquisitionError::auth(message)),
            LoginState::NotLoggedIn => {
                let (user, password) = match &source.auth {
                    AuthMode::None => {
                        active.login = LoginState::LoggedIn;
                        continue;
                    }
                    AuthMode::Token(_) => {
                        return Err(AcquisitionError::auth(
                            "token auth cannot be used in a browser session",
                        ))
                    }
                    AuthMode::Basic { login, password } | AuthMode::Domain { login, password } => {
                        (login.clone(), password.expose().to_string())
                    }
                };
                submit_form(active.session.as_mut(), source, &user, &password).await?;
                active.login = LoginState::Submitting;
            }
            LoginState::Submitting => {
                active.login = if await_redirect(active.session.as_mut(), source.timeout).await? {
                    tracing::info!("Browser logged in to {}", source.host);
                    LoginState::LoggedIn
                } else {
                    LoginState::Failed(format!(
                        "login to {} not completed within {:?}",
                        source.host, source.timeout
                    ))
                };
            }
        }
    }
}

async fn submit_form(
    session: &mut dyn BrowserSession,
    source: &SourceSpec,
    user: &str,
    password: &str,
) -> Result<(), AcquisitionError> {
    session
        .goto(&format!("{}{LOGIN_PATH}", source.host))
        .await
        .map_err(driver_error)?;

    let user_input = require(session, USER_INPUT).await?;
    session.send_keys(&user_input, user).await.map_err(driver_error)?;
    let password_input = require(session, PASSWORD_INPUT).await?;
    session
        .send_keys(&password_input, password)
        .await
        .map_err(driver_error)?;
    let submit = require(session, SUBMIT_BUTTON).await?;
    session.click(&submit).await.map_err(driver_error)
}

async fn require(session: &mut dyn BrowserSession, css: &str) -> Result<ElementId, AcquisitionError> {
    session
        .find(css)
        .await
        .map_err(driver_error)?
        .ok_or_else(|| AcquisitionError::driver(format!("login form element '{css}' not found")))
}

/// True once the URL no longer points at the login page
async fn await_redirect(
    session: &mut dyn BrowserSession,
    budget: Duration,
) -> Result<bool, AcquisitionError> {
    let deadline = Instant::now() + budget;
    loop {
        let url = session.current_url().await.map_err(driver_error)?;
        if !url.contains(LOGIN_PATH) {
            return Ok(true);
        }
        if Instant::now() >= deadline {
            return Ok(false);
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

async fn await_panel(
    session: &mut dyn BrowserSession,
    panel_id: u64,
    budget: Duration,
) -> Result<Option<ElementId>, AcquisitionError> {
    let selectors = panel_selectors(panel_id);
    let deadline = Instant::now() + budget;
    loop {
        for css in &selectors {
            if let Some(element) = session.find(css).await.map_err(driver_error)? {
                return Ok(Some(element));
            }
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

#[async_trait::async_trait]
impl CaptureStrategy for ScreenshotStrategy {
    async fn capture(
        &self,
        source: &SourceSpec,
        dashboard: &DashboardRef,
        panel: &PanelRef,
        window: &TimeWindow,
    ) -> Result<Vec<u8>, AcquisitionError> {
        if matches!(source.auth, AuthMode::Token(_)) {
            return Err(AcquisitionError::auth(
                "token auth cannot be used in a browser session",
            ));
        }

        let context = AuthContext::of(source);
        let mut guard = self.active.lock().await;

        if guard.as_ref().is_some_and(|a| a.context != context) {
            if let Some(mut old) = guard.take() {
                tracing::debug!("Auth context changed; closing browser session");
                if let Err(e) = old.session.close().await {
                    tracing::warn!("Failed to close browser session: {}", e);
                }
            }
        }
        if guard.is_none() {
            let session = open_session(self.driver.as_ref(), source).await?;
            *guard = Some(ActiveSession {
                context,
                session,
                login: LoginState::NotLoggedIn,
            });
        }
        let Some(active) = guard.as_mut() else {
            return Err(AcquisitionError::driver("browser session unavailable"));
        };

        login(active, source).await?;

        let url = PanelQuery::new(source, dashboard, window).screenshot_url(panel.id);
        active.session.goto(&url).await.map_err(driver_error)?;
        tokio::time::sleep(source.driver_preload).await;

        let element = await_panel(active.session.as_mut(), panel.id, source.timeout)
            .await?
            .ok_or_else(|| {
                AcquisitionError::driver(format!(
                    "panel {} not rendered within {:?}",
                    panel.id, source.timeout
                ))
            })?;
        let bytes = active
            .session
            .element_screenshot(&element)
            .await
            .map_err(driver_error)?;
        tracing::debug!("Screenshot of panel {} ({} bytes)", panel.id, bytes.len());
        Ok(bytes)
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Screenshot
    }

    async fn release(&self) {
        if let Some(mut active) = self.active.lock().await.take() {
            match active.session.close().await {
                Ok(()) => tracing::debug!("Browser session closed"),
                Err(e) => tracing::warn!("Failed to close browser session: {}", e),
            }
        }
    }
}
