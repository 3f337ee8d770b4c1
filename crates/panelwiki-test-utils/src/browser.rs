use async_trait::async_trait;
use panelwiki_capture::{BrowserDriver, BrowserOptions, BrowserSession, ClientError, ElementId};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::png_bytes;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoginBehaviour {
    /// Submitting the form redirects away from `/login`
    #[default]
    Redirect,
    /// The form never completes
    Stay,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserEvent {
    Open(BrowserOptions),
    Goto(String),
    SendKeys(String, String),
    Click(String),
    Screenshot(String),
    Close,
}

#[derive(Debug, Default)]
struct State {
    behaviour: LoginBehaviour,
    missing_panels: HashSet<u64>,
    events: Vec<BrowserEvent>,
}

/// Browser whose pages contain every panel named by `viewPanel`
#[derive(Debug, Clone, Default)]
pub struct FakeBrowser {
    state: Arc<Mutex<State>>,
}

impl FakeBrowser {
    pub fn new(behaviour: LoginBehaviour) -> Self {
        let browser = Self::default();
        browser.state.lock().unwrap().behaviour = behaviour;
        browser
    }

    /// Pages never render `panel_id`
    pub fn without_panel(self, panel_id: u64) -> Self {
        self.state.lock().unwrap().missing_panels.insert(panel_id);
        self
    }

    pub fn events(&self) -> Vec<BrowserEvent> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn count(&self, pred: impl Fn(&BrowserEvent) -> bool) -> usize {
        self.events().iter().filter(|e| pred(e)).count()
    }
}

#[async_trait]
impl BrowserDriver for FakeBrowser {
    async fn open(&self, options: &BrowserOptions) -> Result<Box<dyn BrowserSession>, ClientError> {
        self.state
            .lock()
            .unwrap()
            .events
            .push(BrowserEvent::Open(options.clone()));
        Ok(Box::new(FakeSession {
            state: Arc::clone(&self.state),
            url: "about:blank".into(),
        }))
    }
}

struct FakeSession {
    state: Arc<Mutex<State>>,
    url: String,
}

impl FakeSession {
    fn record(&self, event: BrowserEvent) {
        self.state.lock().unwrap().events.push(event);
    }

    fn view_panel(&self) -> Option<u64> {
        let (_, rest) = self.url.split_once("viewPanel=")?;
        rest.split('&').next()?.parse().ok()
    }
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn goto(&mut self, url: &str) -> Result<(), ClientError> {
        self.record(BrowserEvent::Goto(url.to_string()));
        self.url = url.to_string();
        Ok(())
    }

    async fn current_url(&mut self) -> Result<String, ClientError> {
        Ok(self.url.clone())
    }

    async fn find(&mut self, css: &str) -> Result<Option<ElementId>, ClientError> {
        let on_login = self.url.contains("/login");
        if css.starts_with("input[") || css.starts_with("button[") {
            return Ok(on_login.then(|| ElementId(css.to_string())));
        }
        let Some(panel) = self.view_panel() else {
            return Ok(None);
        };
        let missing = self.state.lock().unwrap().missing_panels.contains(&panel);
        let wanted = format!(r#"[data-panelid="{panel}"]"#);
        Ok((css == wanted && !missing).then(|| ElementId(css.to_string())))
    }

    async fn send_keys(&mut self, element: &ElementId, text: &str) -> Result<(), ClientError> {
        self.record(BrowserEvent::SendKeys(element.0.clone(), text.to_string()));
        Ok(())
    }

    async fn click(&mut self, element: &ElementId) -> Result<(), ClientError> {
        self.record(BrowserEvent::Click(element.0.clone()));
        let behaviour = self.state.lock().unwrap().behaviour;
        if behaviour == LoginBehaviour::Redirect {
            if let Some((host, _)) = self.url.split_once("/login") {
                self.url = format!("{host}/");
            }
        }
        Ok(())
    }

    async fn element_screenshot(&mut self, element: &ElementId) -> Result<Vec<u8>, ClientError> {
        self.record(BrowserEvent::Screenshot(element.0.clone()));
        Ok(png_bytes(&format!("shot|{}", self.url)))
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        self.record(BrowserEvent::Close);
        Ok(())
    }
}
