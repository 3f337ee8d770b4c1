//! Wiki boundary
//!
//! [`WikiClient`] is the three operations the publisher needs.
//! [`ConfluenceClient`] implements them over the Confluence REST API.

use crate::error::WikiError;
use panelwiki_config::{Secret, WikiTarget};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::{json, Value};

/// Header Confluence requires on attachment uploads
const XSRF_HEADER: &str = "X-Atlassian-Token";

/// A file to attach to a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// File name on the page
    pub name: String,
    /// MIME type
    pub content_type: String,
    /// Content
    pub bytes: Vec<u8>,
}

/// Current state of a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WikiPage {
    /// Page title
    pub title: String,
    /// Body in storage format
    pub body: String,
    /// Version number
    pub version: u64,
}

/// Operations the publisher needs from a wiki
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait WikiClient: Send + Sync {
    /// Attach a file, replacing the data of an attachment with the same
    /// name; returns the attachment id
    async fn upload_attachment(
        &self,
        page_id: &str,
        attachment: &Attachment,
    ) -> Result<String, WikiError>;

    /// Read a page
    async fn get_page(&self, page_id: &str) -> Result<WikiPage, WikiError>;

    /// Replace a page's body, keeping its title
    async fn set_page_body(&self, page_id: &str, body: &str) -> Result<(), WikiError>;
}

/// [`WikiClient`] over the Confluence REST API
#[derive(Debug, Clone)]
pub struct ConfluenceClient {
    base: String,
    login: String,
    password: Secret,
    http: Client,
}

impl ConfluenceClient {
    /// Create a client for a wiki target
    ///
    /// # Errors
    /// Returns [`WikiError::Transport`] if the HTTP client cannot be built.
    pub fn new(target: &WikiTarget) -> Result<Self, WikiError> {
        let http = Client::builder()
            .danger_accept_invalid_certs(!target.verify_ssl)
            .build()?;
        Ok(Self {
            base: format!("{}/rest/api/content", target.url),
            login: target.credentials.login.clone(),
            password: target.credentials.password.clone(),
            http,
        })
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.basic_auth(&self.login, Some(self.password.expose()))
    }

    async fn existing_attachment(&self, page_id: &str, name: &str) -> Result<Option<String>, WikiError> {
        let response = self
            .authed(
                self.http
                    .get(format!("{}/{page_id}/child/attachment", self.base))
                    .query(&[("filename", name)]),
            )
            .send()
            .await?;
        let body: Value = check_status(response).await?.json().await?;
        Ok(body
            .pointer("/results/0/id")
            .and_then(Value::as_str)
            .map(str::to_string))
    }
}

async fn check_status(response: Response) -> Result<Response, WikiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(WikiError::Status {
        status: status.as_u16(),
        message: message.chars().take(512).collect(),
    })
}

#[async_trait::async_trait]
impl WikiClient for ConfluenceClient {
    #[tracing::instrument(skip(self, attachment), fields(name = %attachment.name), err)]
    async fn upload_attachment(
        &self,
        page_id: &str,
        attachment: &Attachment,
    ) -> Result<String, WikiError> {
        let url = match self.existing_attachment(page_id, &attachment.name).await? {
            Some(id) => format!("{}/{page_id}/child/attachment/{id}/data", self.base),
            None => format!("{}/{page_id}/child/attachment", self.base),
        };
        let part = Part::bytes(attachment.bytes.clone())
            .file_name(attachment.name.clone())
            .mime_str(&attachment.content_type)?;
        let form = Form::new().part("file", part);

        let response = self
            .authed(self.http.post(url))
            .header(XSRF_HEADER, "nocheck")
            .multipart(form)
            .send()
            .await?;
        let body: Value = check_status(response).await?.json().await?;
        body.pointer("/results/0/id")
            .or_else(|| body.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| WikiError::Decode("attachment response has no id".into()))
    }

    #[tracing::instrument(skip(self), err)]
    async fn get_page(&self, page_id: &str) -> Result<WikiPage, WikiError> {
        let response = self
            .authed(
                self.http
                    .get(format!("{}/{page_id}", self.base))
                    .query(&[("expand", "body.storage,version")]),
            )
            .send()
            .await?;
        let body: Value = check_status(response).await?.json().await?;
        parse_page(&body)
    }

    #[tracing::instrument(skip(self, body), fields(len = body.len()), err)]
    async fn set_page_body(&self, page_id: &str, body: &str) -> Result<(), WikiError> {
        let page = self.get_page(page_id).await?;
        let payload = json!({
            "id": page_id,
            "type": "page",
            "title": page.title,
            "version": {"number": page.version + 1},
            "body": {"storage": {"value": body, "representation": "storage"}},
        });
        let response = self
            .authed(self.http.put(format!("{}/{page_id}", self.base)))
            .json(&payload)
            .send()
            .await?;
        check_status(response).await?;
        tracing::info!("Page {} updated to version {}", page_id, page.version + 1);
        Ok(())
    }
}

fn parse_page(body: &Value) -> Result<WikiPage, WikiError> {
    let field = |pointer: &str| {
        body.pointer(pointer)
            .ok_or_else(|| WikiError::Decode(format!("page response has no {pointer}")))
    };
    Ok(WikiPage {
        title: field("/title")?.as_str().unwrap_or_default().to_string(),
        body: field("/body/storage/value")?
            .as_str()
            .unwrap_or_default()
            .to_string(),
        version: field("/version/number")?.as_u64().unwrap_or(1),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_shape() {
        let page = parse_page(&json!({
            "id": "42",
            "title": "Weekly",
            "body": {"storage": {"value": "<p>%%%graphs%%%</p>", "representation": "storage"}},
            "version": {"number": 7}
        }))
        .unwrap();
        assert_eq!(page.title, "Weekly");
        assert_eq!(page.version, 7);
        assert!(page.body.contains("%%%graphs%%%"));

        assert!(matches!(
            parse_page(&json!({"title": "x"})),
            Err(WikiError::Decode(_))
        ));
    }
}
