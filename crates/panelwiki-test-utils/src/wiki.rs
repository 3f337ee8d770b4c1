use async_trait::async_trait;
use panelwiki_publish::{Attachment, WikiClient, WikiError, WikiPage};
use std::sync::Mutex;

/// Wiki page kept in memory
#[derive(Debug)]
pub struct RecordingWiki {
    page: Mutex<WikiPage>,
    uploads: Mutex<Vec<Attachment>>,
    updates: Mutex<Vec<String>>,
}

impl RecordingWiki {
    pub fn new(body: &str) -> Self {
        Self {
            page: Mutex::new(WikiPage {
                title: "Report".into(),
                body: body.to_string(),
                version: 1,
            }),
            uploads: Mutex::new(Vec::new()),
            updates: Mutex::new(Vec::new()),
        }
    }

    pub fn uploads(&self) -> Vec<String> {
        self.uploads
            .lock()
            .unwrap()
            .iter()
            .map(|a| a.name.clone())
            .collect()
    }

    pub fn upload(&self, name: &str) -> Option<Attachment> {
        self.uploads
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|a| a.name == name)
            .cloned()
    }

    pub fn body(&self) -> String {
        self.page.lock().unwrap().body.clone()
    }

    pub fn update_count(&self) -> usize {
        self.updates.lock().unwrap().len()
    }
}

#[async_trait]
impl WikiClient for RecordingWiki {
    async fn upload_attachment(
        &self,
        _page_id: &str,
        attachment: &Attachment,
    ) -> Result<String, WikiError> {
        let mut uploads = self.uploads.lock().unwrap();
        uploads.push(attachment.clone());
        Ok(format!("att{}", uploads.len()))
    }

    async fn get_page(&self, _page_id: &str) -> Result<WikiPage, WikiError> {
        Ok(self.page.lock().unwrap().clone())
    }

    async fn set_page_body(&self, _page_id: &str, body: &str) -> Result<(), WikiError> {
        let mut page = self.page.lock().unwrap();
        page.body = body.to_string();
        page.version += 1;
        self.updates.lock().unwrap().push(body.to_string());
        Ok(())
    }
}
