use super::{
    AnalysisBackend, FrameStream, UploadReceipt,
    protocol::{ErrorResponse, UploadResponse},
};
use crate::config::Config;
use async_trait::async_trait;
use eda_core::{SelectedFile, TransportError, UploadError};
use futures::StreamExt;
use reqwest::{
    Client, Url,
    header::ACCEPT,
    multipart::{Form, Part},
};
use std::time::Duration;
use tracing::{debug, instrument};

const UPLOAD_PATH: &str = "upload";
const ANALYZE_PATH: &str = "analyze";

/// Talks to the analysis backend over HTTP: multipart upload, then a
/// `text/event-stream` response per upload.
#[derive(Clone, Debug)]
pub struct HttpBackend {
    client: Client,
    base_url: Url,
    upload_timeout: Option<Duration>,
}

impl HttpBackend {
    pub fn new(server_url: Url, upload_timeout: Option<Duration>) -> Self {
        let mut base_url = server_url;
        // `Url::join` replaces the last segment unless the path ends in '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            client: Client::new(),
            base_url,
            upload_timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.server_url.clone(), config.upload_timeout)
    }

    pub fn upload_url(&self) -> Result<Url, String> {
        self.endpoint(UPLOAD_PATH)
    }

    pub fn stream_url(&self, upload_id: &str) -> Result<Url, String> {
        let mut url = self.endpoint(ANALYZE_PATH)?;
        url.query_pairs_mut().append_pair("filename", upload_id);
        Ok(url)
    }

    fn endpoint(&self, path: &str) -> Result<Url, String> {
        self.base_url
            .join(path)
            .map_err(|e| format!("Invalid endpoint address for '{}': {}", path, e))
    }

    fn map_send_error(&self, err: reqwest::Error) -> UploadError {
        match self.upload_timeout {
            Some(timeout) if err.is_timeout() => UploadError::TimedOut(timeout),
            _ => UploadError::Network(err.to_string()),
        }
    }
}

#[async_trait]
impl AnalysisBackend for HttpBackend {
    #[instrument(skip_all, fields(file = %file.name, size = file.size))]
    async fn upload(&self, file: &SelectedFile) -> Result<UploadReceipt, UploadError> {
        let url = self
            .upload_url()
            .map_err(UploadError::Network)?;

        let contents = tokio::fs::read(&file.path)
            .await
            .map_err(|e| UploadError::Unreadable {
                name: file.name.clone(),
                reason: e.to_string(),
            })?;
        let form = Form::new().part("file", Part::bytes(contents).file_name(file.name.clone()));

        debug!(%url, "Sending upload request");
        let mut request = self.client.post(url).multipart(form);
        if let Some(timeout) = self.upload_timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(|e| self.map_send_error(e))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| self.map_send_error(e))?;
        let parsed = serde_json::from_str::<UploadResponse>(&body);

        if !status.is_success() {
            let reason = parsed
                .ok()
                .and_then(|body| body.error)
                .filter(|reason| !reason.trim().is_empty())
                .unwrap_or_else(|| "Upload failed".to_string());
            return Err(UploadError::Rejected {
                status: status.as_u16(),
                reason,
            });
        }

        let parsed = parsed.map_err(|e| UploadError::MalformedResponse(e.to_string()))?;
        if let Some(reason) = parsed.error {
            return Err(UploadError::Rejected {
                status: status.as_u16(),
                reason,
            });
        }
        let upload_id = parsed
            .filename
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                UploadError::MalformedResponse("response is missing 'filename'".to_string())
            })?;

        Ok(UploadReceipt {
            upload_id,
            message: parsed.message,
        })
    }

    #[instrument(skip(self))]
    async fn open_stream(&self, upload_id: &str) -> Result<FrameStream, TransportError> {
        let url = self
            .stream_url(upload_id)
            .map_err(TransportError::Connect)?;

        debug!(%url, "Opening analysis stream");
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let reason = serde_json::from_str::<ErrorResponse>(&body)
                .map(|body| body.error)
                .unwrap_or(body);
            return Err(TransportError::Status {
                status: status.as_u16(),
                reason,
            });
        }

        Ok(Box::pin(response.bytes_stream().map(|chunk| {
            chunk.map_err(|e| TransportError::Dropped(e.to_string()))
        })))
    }
}
