//! Analysis upload client.

use nutrition_kiosk_core::{AnalysisReport, CaptureKind, CapturedMedia};
use reqwest::multipart::{Form, Part};
use tracing::instrument;

use super::body_prefix;
use super::conversions::{AnalyzeResponse, convert_analysis};
use crate::capture::{Analyzer, UploadError};
use crate::config::ApiConfig;

/// Multipart field the analysis endpoints read the upload from.
const FILE_FIELD: &str = "file";

/// Uploads captures to the remote analysis endpoints.
///
/// No timeout is set on the request itself; the capture workflow bounds
/// the whole upload.
#[derive(Clone)]
pub struct AnalysisClient {
    client: reqwest::Client,
    image_url: String,
    audio_url: String,
}

impl AnalysisClient {
    /// Create a new analysis client on top of a shared HTTP client.
    #[must_use]
    pub fn new(client: reqwest::Client, config: &ApiConfig) -> Self {
        Self {
            client,
            image_url: config.endpoint("analyze-image"),
            audio_url: config.endpoint("analyze-audio"),
        }
    }

    fn url_for(&self, kind: CaptureKind) -> &str {
        match kind {
            CaptureKind::Camera => &self.image_url,
            CaptureKind::Microphone => &self.audio_url,
        }
    }

    #[instrument(skip(self, media), fields(kind = %media.kind, bytes = media.len()))]
    async fn upload(&self, media: CapturedMedia) -> Result<AnalysisReport, UploadError> {
        let url = self.url_for(media.kind).to_string();

        let part = Part::bytes(media.bytes)
            .file_name(media.filename)
            .mime_str(&media.content_type)
            .map_err(|e| UploadError::Malformed(format!("invalid content type: {e}")))?;
        let form = Form::new().part(FILE_FIELD, part);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, url = %url, "Analysis request failed");
                UploadError::Network(e.to_string())
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| UploadError::Network(e.to_string()))?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %body_prefix(&text),
                "Analysis returned non-success status"
            );
            return Err(UploadError::Status {
                status: status.as_u16(),
                body: body_prefix(&text),
            });
        }

        let mut body: AnalyzeResponse = serde_json::from_str(&text).map_err(|e| {
            tracing::error!(error = %e, body = %body_prefix(&text), "Failed to parse analysis response");
            UploadError::Malformed(e.to_string())
        })?;

        if !body.success {
            let message = body
                .message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| "analysis unsuccessful".to_string());
            return Err(UploadError::Rejected(message));
        }

        let Some(analysis) = body.analysis.take() else {
            return Err(UploadError::Malformed("missing analysis".to_string()));
        };

        Ok(convert_analysis(body, analysis))
    }
}

impl Analyzer for AnalysisClient {
    async fn analyze(&self, media: CapturedMedia) -> Result<AnalysisReport, UploadError> {
        self.upload(media).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_per_kind() {
        let config = ApiConfig::new("https://snacks.example.net/api/").unwrap();
        let client = AnalysisClient::new(reqwest::Client::new(), &config);
        assert_eq!(
            client.url_for(CaptureKind::Camera),
            "https://snacks.example.net/api/analyze-image"
        );
        assert_eq!(
            client.url_for(CaptureKind::Microphone),
            "https://snacks.example.net/api/analyze-audio"
        );
    }
}
