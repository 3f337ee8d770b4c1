//! Query parameters and links for one panel in one window

use crate::enumerate::DashboardRef;
use panelwiki_config::{SourceSpec, TimeWindow};
use reqwest::Url;

/// Parameter builder shared by the render endpoint, the screenshot page
/// and the recorded links
#[derive(Debug, Clone)]
pub struct PanelQuery<'a> {
    source: &'a SourceSpec,
    dashboard: &'a DashboardRef,
    window: &'a TimeWindow,
}

impl<'a> PanelQuery<'a> {
    /// Bind a source, dashboard and window
    #[inline]
    #[must_use]
    pub fn new(source: &'a SourceSpec, dashboard: &'a DashboardRef, window: &'a TimeWindow) -> Self {
        Self {
            source,
            dashboard,
            window,
        }
    }

    /// `orgId, from, to` followed by the template variables
    fn base_params(&self) -> Vec<(String, String)> {
        let mut params = vec![
            ("orgId".to_string(), self.source.org_id.to_string()),
            ("from".to_string(), self.window.start_ms.to_string()),
            ("to".to_string(), self.window.end_ms.to_string()),
        ];
        self.push_vars(&mut params);
        params
    }

    fn push_vars(&self, params: &mut Vec<(String, String)>) {
        for (key, value) in &self.source.vars {
            params.push((format!("var-{key}"), value.clone()));
        }
    }

    /// `orgId, panelId, from, to, theme, tz?` shared by render and view
    fn panel_params(&self, panel_id: u64) -> Vec<(String, String)> {
        let mut params = vec![
            ("orgId".to_string(), self.source.org_id.to_string()),
            ("panelId".to_string(), panel_id.to_string()),
            ("from".to_string(), self.window.start_ms.to_string()),
            ("to".to_string(), self.window.end_ms.to_string()),
            ("theme".to_string(), self.source.theme().to_string()),
        ];
        if let Some(tz) = &self.source.tz {
            params.push(("tz".to_string(), tz.clone()));
        }
        params
    }

    /// Path of the render endpoint: `/render/d-solo/{uid}/{slug}`
    #[must_use]
    pub fn render_path(&self) -> String {
        let tail = match self.dashboard.url.split_once("/d/") {
            Some((_, tail)) => tail.to_string(),
            None => self.dashboard.uid.clone(),
        };
        format!("/render/d-solo/{tail}")
    }

    /// Query parameters of the render endpoint
    #[must_use]
    pub fn render_params(&self, panel_id: u64) -> Vec<(String, String)> {
        let mut params = self.panel_params(panel_id);
        params.push(("width".to_string(), self.source.width.to_string()));
        params.push(("height".to_string(), self.source.height.to_string()));
        params.push(("timeout".to_string(), self.source.timeout.as_secs().to_string()));
        self.push_vars(&mut params);
        params
    }

    /// Interactive single-panel view link
    #[must_use]
    pub fn view_link(&self, panel_id: u64) -> String {
        let mut params = self.panel_params(panel_id);
        params.insert(2, ("viewPanel".to_string(), panel_id.to_string()));
        self.push_vars(&mut params);
        self.dashboard_url(&params)
    }

    /// Page opened by the screenshot strategy: the view link in kiosk mode
    #[must_use]
    pub fn screenshot_url(&self, panel_id: u64) -> String {
        let mut url = self.view_link(panel_id);
        url.push_str("&kiosk");
        url
    }

    /// Whole-dashboard link for the window
    #[must_use]
    pub fn dashboard_link(&self) -> String {
        self.dashboard_url(&self.base_params())
    }

    /// `dashboard.url` is absolute and already carries any sub-path the
    /// server is mounted under, so only the host's origin is kept
    fn dashboard_url(&self, params: &[(String, String)]) -> String {
        match Url::parse(&self.source.host).and_then(|host| host.join(&self.dashboard.url)) {
            Ok(mut url) => {
                url.query_pairs_mut().extend_pairs(params);
                url.to_string()
            }
            Err(_) => {
                let query: Vec<String> = params.iter().map(|(k, v)| format!("{k}={v}")).collect();
                format!("{}{}?{}", self.source.host, self.dashboard.url, query.join("&"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn window() -> TimeWindow {
        TimeWindow {
            tag: "base".into(),
            index: 0,
            start_ms: 1000,
            end_ms: 2000,
            start_human: String::new(),
            end_human: String::new(),
        }
    }

    fn fixture() -> (SourceSpec, DashboardRef) {
        let mut source = SourceSpec::new("prod", "Node", "https://g.example/");
        source.vars.insert("host".into(), "db 1".into());
        source.tz = Some("Europe/Berlin".into());
        let dashboard = DashboardRef {
            uid: "abc".into(),
            url: "/d/abc/node".into(),
            title: "Node".into(),
            folder: "General".into(),
        };
        (source, dashboard)
    }

    #[test]
    fn render_request() {
        let (source, dashboard) = fixture();
        let w = window();
        let q = PanelQuery::new(&source, &dashboard, &w);
        assert_eq!(q.render_path(), "/render/d-solo/abc/node");
        let params = q.render_params(7);
        let keys: Vec<&str> = params.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            keys,
            vec!["orgId", "panelId", "from", "to", "theme", "tz", "width", "height", "timeout", "var-host"]
        );
        assert_eq!(params[4].1, "dark");
        assert_eq!(params[6].1, "1920");
        assert_eq!(params[8].1, "30");
    }

    #[test]
    fn links_are_encoded() {
        let (source, dashboard) = fixture();
        let w = window();
        let q = PanelQuery::new(&source, &dashboard, &w);
        assert_eq!(
            q.view_link(7),
            "https://g.example/d/abc/node?orgId=1&panelId=7&viewPanel=7&from=1000&to=2000&theme=dark&tz=Europe%2FBerlin&var-host=db+1"
        );
        assert!(q.screenshot_url(7).ends_with("&kiosk"));
        assert_eq!(
            q.dashboard_link(),
            "https://g.example/d/abc/node?orgId=1&from=1000&to=2000&var-host=db+1"
        );
    }

    #[test]
    fn sub_path_is_not_repeated() {
        let (mut source, mut dashboard) = fixture();
        source.host = "https://g.example/grafana".into();
        source.vars.clear();
        source.tz = None;
        dashboard.url = "/grafana/d/abc/node".into();
        let w = window();
        let q = PanelQuery::new(&source, &dashboard, &w);
        assert_eq!(
            q.dashboard_link(),
            "https://g.example/grafana/d/abc/node?orgId=1&from=1000&to=2000"
        );
        assert_eq!(q.render_path(), "/render/d-solo/abc/node");
    }
}
