//! WebDriver client against an in-process WebDriver server

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{delete, post};
use axum::{Json, Router};
use panelwiki_capture::{BrowserDriver, BrowserOptions, ClientError, WebDriverClient};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Default)]
struct Driver {
    calls: Arc<Mutex<Vec<&'static str>>>,
    reject_resize: bool,
}

impl Driver {
    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }
}

async fn new_session(State(driver): State<Driver>) -> Json<Value> {
    driver.record("new session");
    Json(json!({"value": {"sessionId": "s1", "capabilities": {}}}))
}

async fn resize(State(driver): State<Driver>) -> (StatusCode, Json<Value>) {
    driver.record("resize");
    if driver.reject_resize {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"value": {"error": "unknown error", "message": "no window"}})),
        )
    } else {
        (StatusCode::OK, Json(json!({"value": {}})))
    }
}

async fn delete_session(State(driver): State<Driver>) -> Json<Value> {
    driver.record("delete session");
    Json(json!({"value": null}))
}

async fn serve(driver: Driver) -> String {
    let app = Router::new()
        .route("/session", post(new_session))
        .route("/session/s1/window/rect", post(resize))
        .route("/session/s1", delete(delete_session))
        .with_state(driver);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    format!("http://{addr}")
}

fn options() -> BrowserOptions {
    BrowserOptions {
        width: 800,
        height: 600,
        accept_insecure_certs: false,
        page_load_timeout: Duration::from_secs(5),
    }
}

#[tokio::test]
async fn failed_resize_deletes_the_session() {
    let driver = Driver {
        reject_resize: true,
        ..Driver::default()
    };
    let client = WebDriverClient::new(&serve(driver.clone()).await).unwrap();

    match client.open(&options()).await {
        Err(ClientError::Status { status, .. }) => assert_eq!(status, 500),
        Err(other) => panic!("unexpected error {other}"),
        Ok(_) => panic!("session opened despite the failed resize"),
    }
    assert_eq!(driver.calls(), vec!["new session", "resize", "delete session"]);
}

#[tokio::test]
async fn session_is_deleted_once() {
    let driver = Driver::default();
    let client = WebDriverClient::new(&serve(driver.clone()).await).unwrap();

    let mut session = client.open(&options()).await.unwrap();
    session.close().await.unwrap();
    session.close().await.unwrap();

    assert_eq!(driver.calls(), vec!["new session", "resize", "delete session"]);
}
