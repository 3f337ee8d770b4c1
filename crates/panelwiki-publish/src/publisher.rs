//! Publishing a document to a page
//!
//! Uploads every referenced image (document order) and the extra files,
//! then replaces the page body. A body containing [`GRAPHS_MARKER`] keeps
//! its surrounding content; only the marker is replaced.

use crate::client::{Attachment, WikiClient};
use crate::error::PublishError;
use crate::render::StorageRenderer;
use panelwiki_document::{Document, DocumentNode};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Marker replaced by the rendered report
pub const GRAPHS_MARKER: &str = "%%%graphs%%%";

/// MIME type of panel images
const PNG: &str = "image/png";

/// What a publish did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Attachments uploaded, in upload order
    pub attachments: Vec<String>,
    /// Whether the marker was found and replaced
    pub marker_replaced: bool,
}

/// Uploads artifacts and rewrites a page
pub struct Publisher {
    client: Arc<dyn WikiClient>,
    renderer: StorageRenderer,
}

impl Publisher {
    /// Create a publisher
    #[must_use]
    pub fn new(client: Arc<dyn WikiClient>, renderer: StorageRenderer) -> Self {
        Self { client, renderer }
    }

    /// Publish a document
    ///
    /// # Errors
    /// Returns [`PublishError`] on the first failed read, upload or page
    /// update.
    pub async fn publish(
        &self,
        page_id: &str,
        document: &Document,
        extra_files: &[PathBuf],
    ) -> Result<PublishReport, PublishError> {
        let mut report = PublishReport::default();
        let mut seen = HashSet::new();

        for node in document.images() {
            let DocumentNode::Image {
                attachment, path, ..
            } = node
            else {
                continue;
            };
            if !seen.insert(attachment.clone()) {
                continue;
            }
            self.upload(page_id, attachment, path, PNG).await?;
            report.attachments.push(attachment.clone());
        }

        for path in extra_files {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                tracing::warn!("Skipping extra file without a name: {}", path.display());
                continue;
            };
            if !seen.insert(name.to_string()) {
                continue;
            }
            self.upload(page_id, name, path, content_type_for(path)).await?;
            report.attachments.push(name.to_string());
        }

        let page = self
            .client
            .get_page(page_id)
            .await
            .map_err(|source| PublishError::Page {
                page_id: page_id.to_string(),
                source,
            })?;
        let content = self.renderer.render(document);
        report.marker_replaced = page.body.contains(GRAPHS_MARKER);
        let body = if report.marker_replaced {
            page.body.replace(GRAPHS_MARKER, &content)
        } else {
            content
        };

        self.client
            .set_page_body(page_id, &body)
            .await
            .map_err(|source| PublishError::Page {
                page_id: page_id.to_string(),
                source,
            })?;
        tracing::info!(
            "Published {} attachments to page '{}'",
            report.attachments.len(),
            page.title
        );
        Ok(report)
    }

    async fn upload(
        &self,
        page_id: &str,
        name: &str,
        path: &Path,
        content_type: &str,
    ) -> Result<(), PublishError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| PublishError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let attachment = Attachment {
            name: name.to_string(),
            content_type: content_type.to_string(),
            bytes,
        };
        self.client
            .upload_attachment(page_id, &attachment)
            .await
            .map_err(|source| PublishError::Upload {
                name: name.to_string(),
                source,
            })?;
        tracing::debug!("Uploaded {}", name);
        Ok(())
    }
}

fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => "application/json",
        Some("png") => PNG,
        Some("yaml" | "yml") => "application/yaml",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{MockWikiClient, WikiPage};
    use crate::error::WikiError;
    use mockall::predicate::eq;
    use mockall::Sequence;
    use panelwiki_artifact::ArtifactKey;
    use tempfile::TempDir;

    fn document(dir: &Path) -> Document {
        let key = ArtifactKey::new("A", "w", "p1");
        let path = dir.join("p1.png");
        std::fs::write(&path, b"png-bytes").unwrap();
        Document {
            nodes: vec![DocumentNode::Section {
                heading: "A".into(),
                subtitle: None,
                link: None,
                children: vec![DocumentNode::Image {
                    attachment: key.attachment_name(),
                    key,
                    title: "p1".into(),
                    path,
                    link: None,
                }],
            }],
        }
    }

    #[tokio::test]
    async fn replaces_marker_and_uploads_first() {
        let dir = TempDir::new().unwrap();
        let json = dir.path().join("A__w.json");
        std::fs::write(&json, b"{}").unwrap();

        let mut seq = Sequence::new();
        let mut wiki = MockWikiClient::new();
        wiki.expect_upload_attachment()
            .withf(|page, a| page == "7" && a.name == "A__w__p1.png" && a.bytes == b"png-bytes")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok("att1".into()));
        wiki.expect_upload_attachment()
            .withf(|_, a| a.name == "A__w.json" && a.content_type == "application/json")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok("att2".into()));
        wiki.expect_get_page()
            .with(eq("7"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Ok(WikiPage {
                    title: "Report".into(),
                    body: "<p>intro</p>%%%graphs%%%<p>outro</p>".into(),
                    version: 3,
                })
            });
        wiki.expect_set_page_body()
            .withf(|page, body| {
                page == "7"
                    && body.starts_with("<p>intro</p><h2>A</h2>")
                    && body.ends_with("<p>outro</p>")
                    && !body.contains(GRAPHS_MARKER)
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));

        let publisher = Publisher::new(Arc::new(wiki), StorageRenderer::new(1500));
        let report = publisher
            .publish("7", &document(dir.path()), &[json])
            .await
            .unwrap();
        assert!(report.marker_replaced);
        assert_eq!(report.attachments, vec!["A__w__p1.png", "A__w.json"]);
    }

    #[tokio::test]
    async fn body_without_marker_is_replaced() {
        let dir = TempDir::new().unwrap();
        let mut wiki = MockWikiClient::new();
        wiki.expect_upload_attachment()
            .returning(|_, _| Ok("att".into()));
        wiki.expect_get_page().returning(|_| {
            Ok(WikiPage {
                title: "Report".into(),
                body: "<p>old</p>".into(),
                version: 1,
            })
        });
        wiki.expect_set_page_body()
            .withf(|_, body| body.starts_with("<h2>A</h2>") && !body.contains("old"))
            .times(1)
            .returning(|_, _| Ok(()));

        let publisher = Publisher::new(Arc::new(wiki), StorageRenderer::new(800));
        let report = publisher.publish("1", &document(dir.path()), &[]).await.unwrap();
        assert!(!report.marker_replaced);
    }

    #[tokio::test]
    async fn upload_failure_stops_before_page_update() {
        let dir = TempDir::new().unwrap();
        let mut wiki = MockWikiClient::new();
        wiki.expect_upload_attachment().returning(|_, _| {
            Err(WikiError::Status {
                status: 413,
                message: "too large".into(),
            })
        });
        wiki.expect_get_page().never();
        wiki.expect_set_page_body().never();

        let publisher = Publisher::new(Arc::new(wiki), StorageRenderer::new(800));
        let err = publisher
            .publish("1", &document(dir.path()), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Upload { ref name, .. } if name == "A__w__p1.png"));
    }
}
