//! Reopening and merging earlier run folders

use chrono::Local;
use indexmap::IndexMap;
use panelwiki_artifact::{ArtifactKey, ArtifactStore};
use panelwiki_capture::{RenderApiStrategy, ScreenshotStrategy, StrategySelector};
use panelwiki_config::{
    parse_timezone, parse_windows, Credentials, RunMode, RunParameters, SourceSpec, WikiTarget,
    DEFAULT_WEBDRIVER_URL,
};
use panelwiki_core::{reopen, CompletedRun, ReportPipeline, RunRecord, RUN_RECORD_FILE};
use panelwiki_document::{Document, DocumentNode};
use panelwiki_publish::{Publisher, StorageRenderer};
use panelwiki_test_utils::{
    dashboard_model, png_bytes, render_source, FakeBrowser, FakeMonitoringClient, LoginBehaviour,
    RecordingWiki,
};
use pretty_assertions::assert_eq;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

const HOST: &str = "http://a.test";

fn pipeline(client: FakeMonitoringClient, wiki: Arc<RecordingWiki>) -> ReportPipeline {
    let client = Arc::new(client);
    let strategies = StrategySelector::new(
        Arc::new(RenderApiStrategy::new(client.clone())),
        Arc::new(ScreenshotStrategy::new(Arc::new(FakeBrowser::new(
            LoginBehaviour::Redirect,
        )))),
    );
    ReportPipeline::new(client, strategies)
        .with_publisher(Publisher::new(wiki, StorageRenderer::new(1500)))
}

fn server() -> FakeMonitoringClient {
    FakeMonitoringClient::new().with_dashboard(
        HOST,
        "ua",
        "Node",
        dashboard_model(&[(1, "CPU"), (2, "Memory")]),
    )
}

fn sources() -> IndexMap<String, SourceSpec> {
    let source = render_source("A", HOST, "Node");
    IndexMap::from([(source.name.clone(), source)])
}

async fn captured(root: &Path, window: &str, server: FakeMonitoringClient) -> CompletedRun {
    let windows = parse_windows(&[window.to_string()], parse_timezone("UTC").unwrap()).unwrap();
    let store = ArtifactStore::create(root).await.unwrap();
    pipeline(server, Arc::new(RecordingWiki::new("")))
        .capture(&sources(), &windows, store, RunRecord::new("7", None))
        .await
        .unwrap()
}

fn outline(doc: &Document) -> Vec<String> {
    doc.flatten()
        .into_iter()
        .map(|n| match n {
            DocumentNode::Section { heading, .. } => format!("S:{heading}"),
            DocumentNode::Image { key, .. } => format!("I:{key}"),
            DocumentNode::Placeholder { title, reason, .. } => format!("P:{title}:{reason}"),
        })
        .collect()
}

#[tokio::test]
async fn reopened_run_composes_the_same_document() {
    let dir = TempDir::new().unwrap();
    let original = captured(
        dir.path(),
        "W__&from=1000&to=2000",
        server().failing_panel(HOST, 1, 403),
    )
    .await;

    let reopened = reopen(&[dir.path().to_path_buf()], Path::new("unused"))
        .await
        .unwrap();

    assert_eq!(reopened.document(), original.document());
    assert_eq!(
        outline(&reopened.document()),
        vec!["S:A", "S:W", "P:CPU:auth", "I:A/W/Memory"]
    );
    assert!(!Path::new("unused").exists());
}

#[tokio::test]
async fn folder_without_record_is_lexicographic() {
    let dir = TempDir::new().unwrap();
    let store = ArtifactStore::create(dir.path()).await.unwrap();
    for (source, window, panel) in [("b", "w2", "x"), ("a", "w2", "y"), ("a", "w1", "z")] {
        store
            .save(&ArtifactKey::new(source, window, panel), &png_bytes(panel))
            .await
            .unwrap();
    }

    let run = reopen(&[dir.path().to_path_buf()], Path::new("unused"))
        .await
        .unwrap();
    let doc = run.document();

    assert_eq!(
        outline(&doc),
        vec![
            "S:a", "S:w1", "P:y:missing", "I:a/w1/z", "S:w2", "I:a/w2/y", "P:z:missing",
            "S:b", "S:w1", "P:x:missing", "S:w2", "I:b/w2/x",
        ]
    );
    match &doc.nodes[0].children()[0] {
        DocumentNode::Section { subtitle, .. } => assert_eq!(subtitle, &None),
        other => panic!("unexpected node {other:?}"),
    }
}

#[tokio::test]
async fn merged_runs_keep_both_windows() {
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    let dest = TempDir::new().unwrap();
    let merged_root = dest.path().join("merged");

    captured(first.path(), "W1__&from=1000&to=2000", server()).await;
    captured(second.path(), "W2__&from=3000&to=4000", server()).await;
    std::fs::write(first.path().join("A__W1.json"), "{}").unwrap();

    let folders = vec![first.path().to_path_buf(), second.path().to_path_buf()];
    let run = reopen(&folders, &merged_root).await.unwrap();

    assert_eq!(run.store.root(), merged_root.as_path());
    assert_eq!(
        outline(&run.document()),
        vec![
            "S:A", "S:W1", "I:A/W1/CPU", "I:A/W1/Memory", "S:W2", "I:A/W2/CPU",
            "I:A/W2/Memory",
        ]
    );
    assert!(merged_root.join("A/W1/CPU.png").is_file());
    assert!(merged_root.join("A__W1.json").is_file());

    let saved = std::fs::read_to_string(merged_root.join(RUN_RECORD_FILE)).unwrap();
    let record = RunRecord::from_yaml(&saved).unwrap();
    assert_eq!(record.test_id, "7");
    let tags: Vec<_> = record.windows.iter().map(|w| w.tag.as_str()).collect();
    assert_eq!(tags, vec!["W1", "W2"]);
}

#[tokio::test]
async fn republish_mode_uploads_the_stored_images() {
    let dir = TempDir::new().unwrap();
    let folder = dir.path().join("run");
    captured(&folder, "W__&from=1000&to=2000", server()).await;

    let wiki = Arc::new(RecordingWiki::new("old body"));
    let params = RunParameters {
        mode: RunMode::Republish {
            folders: vec![folder.clone()],
        },
        wiki: Some(WikiTarget {
            url: "http://wiki.test".into(),
            credentials: Credentials::new("bot", "pw"),
            page_id: "9".into(),
            verify_ssl: true,
        }),
        credentials: Some(Credentials::new("bot", "pw")),
        root_folder: PathBuf::from(dir.path()),
        graph_width: 1500,
        test_id: "7".into(),
        threads: 1,
        tz: "UTC".into(),
        only_graphs: false,
        webdriver_url: DEFAULT_WEBDRIVER_URL.into(),
    };

    // no dashboard server is needed to republish
    let outcome = pipeline(FakeMonitoringClient::new(), wiki.clone())
        .run(&params, Local::now())
        .await
        .unwrap();

    let report = outcome.published.unwrap();
    assert!(!report.marker_replaced);
    assert_eq!(wiki.uploads(), vec!["A__W__CPU.png", "A__W__Memory.png"]);
    assert_eq!(
        wiki.upload("A__W__CPU.png").unwrap().bytes,
        std::fs::read(folder.join("A/W/CPU.png")).unwrap()
    );
    assert!(wiki.body().starts_with("<h2>A</h2>"));
}
