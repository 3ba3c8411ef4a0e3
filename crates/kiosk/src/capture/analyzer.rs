//! Upload seam between the capture workflow and the analysis service.

use std::future::Future;
use std::time::Duration;

use nutrition_kiosk_core::{AnalysisReport, CapturedMedia};
use thiserror::Error;

/// Errors that can occur while uploading a capture for analysis.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    /// Request never produced a response (DNS, connect, reset, ...).
    #[error("Could not reach the analysis service: {0}")]
    Network(String),

    /// The service answered with a non-success status.
    #[error("Analysis failed with HTTP {status}")]
    Status { status: u16, body: String },

    /// The body could not be decoded.
    #[error("Analysis response was malformed: {0}")]
    Malformed(String),

    /// The service answered `success: false`.
    #[error("Analysis was rejected: {0}")]
    Rejected(String),

    /// No answer within the configured bound.
    #[error("Analysis did not finish within {} seconds", .0.as_secs())]
    Timeout(Duration),

    /// The request waiting on the analysis went away before it settled.
    #[error("The upload was interrupted before the analysis arrived")]
    Interrupted,
}

/// Something that can turn a capture into an [`AnalysisReport`].
pub trait Analyzer: Send + Sync {
    /// Upload `media` as a single request and wait for the verdict.
    fn analyze(
        &self,
        media: CapturedMedia,
    ) -> impl Future<Output = Result<AnalysisReport, UploadError>> + Send;
}
