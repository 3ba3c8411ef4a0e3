//! Capture workflow state machine.
//!
//! ```text
//! Idle --open--> Acquiring --ok--> Previewing --capture--> Captured --submit--> Uploading
//! Acquiring --device error--> Failed
//! Uploading --> Succeeded | Failed
//! Succeeded | Failed --retry--> Acquiring
//! any --close--> Idle
//! ```
//!
//! Every `open`, `retry` and `close` starts a new cycle. Device grants and
//! analysis responses are tagged with the cycle that requested them and are
//! dropped if the workflow has moved on, so a late response can never
//! overwrite a newer state.
//!
//! State lives behind a `std::sync::Mutex` that is only held for short
//! synchronous sections, never across an `.await`.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use nutrition_kiosk_core::{AnalysisReport, CaptureKind, CapturedMedia};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::analyzer::{Analyzer, UploadError};
use super::device::{DeviceAccessError, MediaDevice, MediaStream};

/// Actions rejected by the current workflow state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    /// An upload is in flight; nothing else may start until it settles.
    #[error("An analysis upload is already in progress")]
    UploadInFlight,

    /// The action is not valid in the current state.
    #[error("Cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },

    /// Captured payload has no bytes.
    #[error("The capture is empty")]
    EmptyCapture,

    /// Captured payload does not match the open device.
    #[error("Received a {actual} capture but the {expected} is open")]
    KindMismatch {
        expected: CaptureKind,
        actual: CaptureKind,
    },
}

/// Why a cycle ended in `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureFailure {
    #[error(transparent)]
    Device(#[from] DeviceAccessError),
    #[error(transparent)]
    Upload(#[from] UploadError),
}

/// Failure category exposed to the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    DeviceAccess,
    Upload,
}

/// Snapshot of the workflow for pages and pollers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CaptureStatus {
    Idle,
    Acquiring {
        kind: CaptureKind,
    },
    Previewing {
        kind: CaptureKind,
    },
    Captured {
        kind: CaptureKind,
        size_bytes: usize,
    },
    Uploading {
        kind: CaptureKind,
    },
    Succeeded {
        kind: CaptureKind,
        analysis: AnalysisReport,
        redirect: String,
    },
    Failed {
        kind: CaptureKind,
        reason: FailureReason,
        message: String,
    },
}

impl CaptureStatus {
    /// Lowercase state name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Acquiring { .. } => "acquiring",
            Self::Previewing { .. } => "previewing",
            Self::Captured { .. } => "captured",
            Self::Uploading { .. } => "uploading",
            Self::Succeeded { .. } => "succeeded",
            Self::Failed { .. } => "failed",
        }
    }

    /// Device kind of the current cycle, if any.
    #[must_use]
    pub const fn kind(&self) -> Option<CaptureKind> {
        match self {
            Self::Idle => None,
            Self::Acquiring { kind }
            | Self::Previewing { kind }
            | Self::Captured { kind, .. }
            | Self::Uploading { kind }
            | Self::Succeeded { kind, .. }
            | Self::Failed { kind, .. } => Some(*kind),
        }
    }
}

#[derive(Debug)]
enum Phase {
    Idle,
    Acquiring,
    Previewing,
    Captured(CapturedMedia),
    Uploading,
    Succeeded(AnalysisReport),
    Failed(CaptureFailure),
}

impl Phase {
    const fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Acquiring => "acquiring",
            Self::Previewing => "previewing",
            Self::Captured(_) => "captured",
            Self::Uploading => "uploading",
            Self::Succeeded(_) => "succeeded",
            Self::Failed(_) => "failed",
        }
    }
}

#[derive(Debug)]
struct Inner {
    phase: Phase,
    cycle: u64,
    kind: Option<CaptureKind>,
    stream: Option<MediaStream>,
    cycle_token: CancellationToken,
}

impl Inner {
    /// Abandon the current cycle: cancel its pending work and release the device.
    fn begin_cycle(&mut self, root: &CancellationToken) {
        self.cycle = self.cycle.wrapping_add(1);
        self.cycle_token.cancel();
        self.cycle_token = root.child_token();
        if let Some(stream) = self.stream.take() {
            stream.release();
        }
    }

    fn status(&self) -> CaptureStatus {
        let Some(kind) = self.kind else {
            return CaptureStatus::Idle;
        };

        match &self.phase {
            Phase::Idle => CaptureStatus::Idle,
            Phase::Acquiring => CaptureStatus::Acquiring { kind },
            Phase::Previewing => CaptureStatus::Previewing { kind },
            Phase::Captured(media) => CaptureStatus::Captured {
                kind,
                size_bytes: media.len(),
            },
            Phase::Uploading => CaptureStatus::Uploading { kind },
            Phase::Succeeded(report) => CaptureStatus::Succeeded {
                kind,
                redirect: report.catalog_path(),
                analysis: report.clone(),
            },
            Phase::Failed(failure) => CaptureStatus::Failed {
                kind,
                reason: match failure {
                    CaptureFailure::Device(_) => FailureReason::DeviceAccess,
                    CaptureFailure::Upload(_) => FailureReason::Upload,
                },
                message: failure.to_string(),
            },
        }
    }
}

/// Fails the upload of `cycle` if the future waiting on it is dropped first.
///
/// Normal completion has already moved the phase on by the time this runs,
/// so it only acts when the caller went away mid-upload.
struct UploadGuard<'a> {
    inner: &'a Mutex<Inner>,
    status_tx: &'a watch::Sender<CaptureStatus>,
    cycle: u64,
}

impl Drop for UploadGuard<'_> {
    fn drop(&mut self) {
        let mut inner = lock_inner(self.inner);
        if inner.cycle == self.cycle && matches!(inner.phase, Phase::Uploading) {
            tracing::warn!(cycle = self.cycle, "Upload abandoned before the analysis arrived");
            inner.phase = Phase::Failed(UploadError::Interrupted.into());
            self.status_tx.send_replace(inner.status());
        }
    }
}

fn lock_inner(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Camera/microphone capture and analysis for one kiosk screen.
pub struct CaptureWorkflow<D, A> {
    device: D,
    analyzer: A,
    upload_timeout: Duration,
    inner: Mutex<Inner>,
    status_tx: watch::Sender<CaptureStatus>,
    root: CancellationToken,
}

impl<D: MediaDevice, A: Analyzer> CaptureWorkflow<D, A> {
    /// Create an idle workflow.
    pub fn new(device: D, analyzer: A, upload_timeout: Duration) -> Self {
        let root = CancellationToken::new();
        let (status_tx, _) = watch::channel(CaptureStatus::Idle);

        Self {
            device,
            analyzer,
            upload_timeout,
            inner: Mutex::new(Inner {
                phase: Phase::Idle,
                cycle: 0,
                kind: None,
                stream: None,
                cycle_token: root.child_token(),
            }),
            status_tx,
            root,
        }
    }

    /// Current state.
    pub fn status(&self) -> CaptureStatus {
        self.lock().status()
    }

    /// Observe state changes.
    pub fn subscribe(&self) -> watch::Receiver<CaptureStatus> {
        self.status_tx.subscribe()
    }

    /// The media device backing this workflow.
    pub const fn device(&self) -> &D {
        &self.device
    }

    /// Open the camera or microphone and start previewing.
    ///
    /// Re-opening the device that is already previewing is a no-op. Opening
    /// a different device releases the current one first.
    ///
    /// # Errors
    ///
    /// Returns `WorkflowError::UploadInFlight` while an upload is pending.
    /// Device failures are not errors here: they move the workflow to
    /// `Failed` and are reported through the returned status.
    pub async fn open(&self, kind: CaptureKind) -> Result<CaptureStatus, WorkflowError> {
        let (cycle, token) = {
            let mut inner = self.lock();
            match inner.phase {
                Phase::Uploading => return Err(WorkflowError::UploadInFlight),
                Phase::Previewing | Phase::Captured(_)
                    if inner.stream.as_ref().map(MediaStream::kind) == Some(kind) =>
                {
                    return Ok(inner.status());
                }
                _ => {}
            }
            self.start_acquiring(&mut inner, kind)
        };

        self.acquire(kind, cycle, token).await
    }

    /// Store a captured still image or recording, replacing any earlier one.
    ///
    /// # Errors
    ///
    /// Returns `WorkflowError::UploadInFlight` while uploading,
    /// `InvalidTransition` unless previewing, `KindMismatch` if the payload
    /// does not come from the open device and `EmptyCapture` for empty data.
    pub fn capture(&self, media: CapturedMedia) -> Result<CaptureStatus, WorkflowError> {
        let mut inner = self.lock();
        match inner.phase {
            Phase::Previewing | Phase::Captured(_) => {}
            Phase::Uploading => return Err(WorkflowError::UploadInFlight),
            ref other => {
                return Err(WorkflowError::InvalidTransition {
                    action: "capture",
                    state: other.name(),
                });
            }
        }

        let Some(expected) = inner.stream.as_ref().map(MediaStream::kind) else {
            return Err(WorkflowError::InvalidTransition {
                action: "capture",
                state: "closed",
            });
        };
        if media.kind != expected {
            return Err(WorkflowError::KindMismatch {
                expected,
                actual: media.kind,
            });
        }
        if media.is_empty() {
            return Err(WorkflowError::EmptyCapture);
        }

        tracing::debug!(kind = %media.kind, bytes = media.len(), "Capture stored");
        inner.phase = Phase::Captured(media);
        Ok(self.publish(&inner))
    }

    /// Upload the captured payload and wait for the analysis.
    ///
    /// The device is released when the upload starts. The upload is bounded
    /// by the workflow's timeout. If the workflow is closed or retried while
    /// waiting, the response is discarded and the newer state is returned.
    /// If this future is dropped before the analysis arrives, the cycle
    /// ends in `Failed` so the kiosk can retry.
    ///
    /// # Errors
    ///
    /// Returns `WorkflowError::UploadInFlight` if an upload is already
    /// pending and `InvalidTransition` if nothing has been captured.
    pub async fn submit(&self) -> Result<CaptureStatus, WorkflowError> {
        let (media, cycle, token) = {
            let mut inner = self.lock();
            let media = match std::mem::replace(&mut inner.phase, Phase::Uploading) {
                Phase::Captured(media) => media,
                other => {
                    let err = if matches!(other, Phase::Uploading) {
                        WorkflowError::UploadInFlight
                    } else {
                        WorkflowError::InvalidTransition {
                            action: "submit",
                            state: other.name(),
                        }
                    };
                    inner.phase = other;
                    return Err(err);
                }
            };

            if let Some(stream) = inner.stream.take() {
                stream.release();
            }
            self.publish(&inner);
            (media, inner.cycle, inner.cycle_token.clone())
        };
        let _guard = UploadGuard {
            inner: &self.inner,
            status_tx: &self.status_tx,
            cycle,
        };

        tracing::info!(
            cycle,
            kind = %media.kind,
            bytes = media.len(),
            "Uploading capture for analysis"
        );

        let outcome = tokio::select! {
            () = token.cancelled() => None,
            result = tokio::time::timeout(self.upload_timeout, self.analyzer.analyze(media)) => Some(result),
        };

        let mut inner = self.lock();
        if inner.cycle != cycle || !matches!(inner.phase, Phase::Uploading) {
            tracing::debug!(
                cycle,
                current = inner.cycle,
                "Discarding analysis response for a superseded cycle"
            );
            return Ok(inner.status());
        }
        let Some(outcome) = outcome else {
            return Ok(inner.status());
        };

        inner.phase = match outcome {
            Ok(Ok(report)) => {
                tracing::info!(
                    cycle,
                    category = %report.recommended_category,
                    products = report.total_products,
                    "Analysis succeeded"
                );
                Phase::Succeeded(report)
            }
            Ok(Err(err)) => {
                tracing::warn!(cycle, error = %err, "Analysis failed");
                Phase::Failed(err.into())
            }
            Err(_) => {
                tracing::warn!(cycle, timeout = ?self.upload_timeout, "Analysis timed out");
                Phase::Failed(UploadError::Timeout(self.upload_timeout).into())
            }
        };
        Ok(self.publish(&inner))
    }

    /// Store `media` and upload it in one step.
    ///
    /// # Errors
    ///
    /// See [`CaptureWorkflow::capture`] and [`CaptureWorkflow::submit`].
    pub async fn capture_and_submit(
        &self,
        media: CapturedMedia,
    ) -> Result<CaptureStatus, WorkflowError> {
        self.capture(media)?;
        self.submit().await
    }

    /// Start over after a result: re-acquire the device and preview again.
    ///
    /// # Errors
    ///
    /// Returns `WorkflowError::UploadInFlight` while uploading and
    /// `InvalidTransition` unless the workflow has succeeded or failed.
    pub async fn retry(&self) -> Result<CaptureStatus, WorkflowError> {
        let (kind, cycle, token) = {
            let mut inner = self.lock();
            match inner.phase {
                Phase::Failed(_) | Phase::Succeeded(_) => {}
                Phase::Uploading => return Err(WorkflowError::UploadInFlight),
                ref other => {
                    return Err(WorkflowError::InvalidTransition {
                        action: "retry",
                        state: other.name(),
                    });
                }
            }
            let Some(kind) = inner.kind else {
                return Err(WorkflowError::InvalidTransition {
                    action: "retry",
                    state: "idle",
                });
            };
            let (cycle, token) = self.start_acquiring(&mut inner, kind);
            (kind, cycle, token)
        };

        tracing::info!(cycle, kind = %kind, "Retrying capture");
        self.acquire(kind, cycle, token).await
    }

    /// Return to idle from any state, releasing the device.
    ///
    /// Any pending acquisition or upload is cancelled and its result ignored.
    pub fn close(&self) -> CaptureStatus {
        let mut inner = self.lock();
        let previous = inner.phase.name();
        inner.begin_cycle(&self.root);
        inner.phase = Phase::Idle;
        inner.kind = None;
        tracing::info!(cycle = inner.cycle, previous, "Capture workflow closed");
        self.publish(&inner)
    }

    fn start_acquiring(
        &self,
        inner: &mut MutexGuard<'_, Inner>,
        kind: CaptureKind,
    ) -> (u64, CancellationToken) {
        inner.begin_cycle(&self.root);
        inner.kind = Some(kind);
        inner.phase = Phase::Acquiring;
        self.publish(inner);
        (inner.cycle, inner.cycle_token.clone())
    }

    async fn acquire(
        &self,
        kind: CaptureKind,
        cycle: u64,
        token: CancellationToken,
    ) -> Result<CaptureStatus, WorkflowError> {
        let result = tokio::select! {
            () = token.cancelled() => None,
            result = self.device.acquire(kind) => Some(result),
        };

        let mut inner = self.lock();
        if inner.cycle != cycle {
            // A stream granted to a superseded cycle is released on drop here
            tracing::debug!(cycle, current = inner.cycle, "Discarding superseded device grant");
            return Ok(inner.status());
        }

        match result {
            Some(Ok(stream)) => {
                tracing::info!(cycle, kind = %kind, tracks = stream.track_count(), "Device acquired");
                inner.stream = Some(stream);
                inner.phase = Phase::Previewing;
            }
            Some(Err(err)) => {
                tracing::warn!(cycle, error = %err, "Device access failed");
                inner.phase = Phase::Failed(err.into());
            }
            None => return Ok(inner.status()),
        }
        Ok(self.publish(&inner))
    }

    fn publish(&self, inner: &Inner) -> CaptureStatus {
        let status = inner.status();
        self.status_tx.send_replace(status.clone());
        status
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        lock_inner(&self.inner)
    }
}

impl<D, A> Drop for CaptureWorkflow<D, A> {
    fn drop(&mut self) {
        self.root.cancel();
        let inner = self.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(stream) = inner.stream.take() {
            stream.release();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use nutrition_kiosk_core::{Price, RecommendedProduct};
    use tokio::sync::Notify;

    use super::*;
    use crate::capture::device::MediaTrack;

    // =========================================================================
    // Mocks
    // =========================================================================

    #[derive(Debug, Default)]
    struct DeviceCounters {
        acquired: AtomicUsize,
        active: AtomicUsize,
    }

    #[derive(Debug)]
    struct MockTrack {
        counters: Arc<DeviceCounters>,
        stopped: bool,
    }

    impl MediaTrack for MockTrack {
        fn id(&self) -> &str {
            "mock-track"
        }

        fn stop(&mut self) {
            if !self.stopped {
                self.stopped = true;
                self.counters.active.fetch_sub(1, Ordering::SeqCst);
            }
        }
    }

    #[derive(Default)]
    struct MockDevice {
        counters: Arc<DeviceCounters>,
        deny: bool,
        gate: Option<Arc<Notify>>,
    }

    impl MockDevice {
        fn acquired(&self) -> usize {
            self.counters.acquired.load(Ordering::SeqCst)
        }

        fn active(&self) -> usize {
            self.counters.active.load(Ordering::SeqCst)
        }
    }

    impl MediaDevice for MockDevice {
        async fn acquire(&self, kind: CaptureKind) -> Result<MediaStream, DeviceAccessError> {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.deny {
                return Err(DeviceAccessError::PermissionDenied(kind));
            }
            self.counters.acquired.fetch_add(1, Ordering::SeqCst);
            self.counters.active.fetch_add(1, Ordering::SeqCst);
            Ok(MediaStream::new(
                kind,
                vec![Box::new(MockTrack {
                    counters: Arc::clone(&self.counters),
                    stopped: false,
                })],
            ))
        }
    }

    enum Reply {
        Report,
        Status(u16),
        Hang,
    }

    struct MockAnalyzer {
        calls: AtomicUsize,
        reply: Reply,
        gate: Option<Arc<Notify>>,
    }

    impl MockAnalyzer {
        fn new(reply: Reply) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                reply,
                gate: None,
            }
        }

        fn gated(reply: Reply, gate: Arc<Notify>) -> Self {
            Self {
                gate: Some(gate),
                ..Self::new(reply)
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Analyzer for MockAnalyzer {
        async fn analyze(&self, media: CapturedMedia) -> Result<AnalysisReport, UploadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            match self.reply {
                Reply::Report => Ok(report(&media)),
                Reply::Status(status) => Err(UploadError::Status {
                    status,
                    body: "Internal Server Error".to_string(),
                }),
                Reply::Hang => std::future::pending().await,
            }
        }
    }

    fn report(media: &CapturedMedia) -> AnalysisReport {
        AnalysisReport {
            filename: media.filename.clone(),
            file_size_bytes: media.len() as u64,
            transcription: None,
            description: "Looks tired".to_string(),
            recommended_category: "Energy Fuel".to_string(),
            products: vec![RecommendedProduct {
                name: "Trail Mix".to_string(),
                price: Price::from_cents(299),
            }],
            total_products: 1,
            message: "ok".to_string(),
        }
    }

    fn photo() -> CapturedMedia {
        CapturedMedia::new(CaptureKind::Camera, None, None, vec![0xFF, 0xD8, 0xFF])
    }

    fn workflow(
        device: MockDevice,
        analyzer: MockAnalyzer,
    ) -> Arc<CaptureWorkflow<MockDevice, MockAnalyzer>> {
        Arc::new(CaptureWorkflow::new(device, analyzer, Duration::from_secs(5)))
    }

    async fn wait_for(rx: &mut watch::Receiver<CaptureStatus>, state: &str) {
        tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|s| s.name() == state))
            .await
            .expect("timed out waiting for state")
            .unwrap();
    }

    // =========================================================================
    // Tests
    // =========================================================================

    #[tokio::test]
    async fn test_happy_path_reaches_succeeded() {
        let wf = workflow(MockDevice::default(), MockAnalyzer::new(Reply::Report));

        let status = wf.open(CaptureKind::Camera).await.unwrap();
        assert_eq!(status, CaptureStatus::Previewing { kind: CaptureKind::Camera });

        let status = wf.capture(photo()).unwrap();
        assert_eq!(status.name(), "captured");

        let status = wf.submit().await.unwrap();
        match status {
            CaptureStatus::Succeeded { analysis, redirect, .. } => {
                assert_eq!(analysis.recommended_category, "Energy Fuel");
                assert_eq!(redirect, "/products?category=Energy+Fuel");
            }
            other => panic!("unexpected status {other:?}"),
        }
        assert_eq!(wf.analyzer.calls(), 1);
        // Device released once the upload started
        assert_eq!(wf.device().active(), 0);
    }

    #[tokio::test]
    async fn test_device_denied_fails_without_upload() {
        let device = MockDevice {
            deny: true,
            ..MockDevice::default()
        };
        let wf = workflow(device, MockAnalyzer::new(Reply::Report));

        let status = wf.open(CaptureKind::Microphone).await.unwrap();
        match &status {
            CaptureStatus::Failed { reason, message, .. } => {
                assert_eq!(*reason, FailureReason::DeviceAccess);
                assert!(message.contains("denied"));
            }
            other => panic!("unexpected status {other:?}"),
        }

        let media = CapturedMedia::new(CaptureKind::Microphone, None, None, vec![1, 2]);
        assert!(matches!(
            wf.capture(media),
            Err(WorkflowError::InvalidTransition { .. })
        ));
        assert!(wf.submit().await.is_err());
        assert_eq!(wf.analyzer.calls(), 0);
    }

    #[tokio::test]
    async fn test_no_second_upload_while_uploading() {
        let gate = Arc::new(Notify::new());
        let wf = workflow(
            MockDevice::default(),
            MockAnalyzer::gated(Reply::Report, Arc::clone(&gate)),
        );
        let mut rx = wf.subscribe();

        wf.open(CaptureKind::Camera).await.unwrap();
        wf.capture(photo()).unwrap();

        let background = Arc::clone(&wf);
        let first = tokio::spawn(async move { background.submit().await });
        wait_for(&mut rx, "uploading").await;

        assert_eq!(wf.submit().await, Err(WorkflowError::UploadInFlight));
        assert_eq!(wf.capture(photo()), Err(WorkflowError::UploadInFlight));
        assert_eq!(
            wf.open(CaptureKind::Camera).await,
            Err(WorkflowError::UploadInFlight)
        );
        assert_eq!(wf.retry().await, Err(WorkflowError::UploadInFlight));

        gate.notify_one();
        let settled = first.await.unwrap().unwrap();
        assert_eq!(settled.name(), "succeeded");
        assert_eq!(wf.analyzer.calls(), 1);
    }

    #[tokio::test]
    async fn test_http_500_fails_with_status_then_retry_previews() {
        let wf = workflow(MockDevice::default(), MockAnalyzer::new(Reply::Status(500)));

        wf.open(CaptureKind::Camera).await.unwrap();
        let status = wf.capture_and_submit(photo()).await.unwrap();
        match &status {
            CaptureStatus::Failed { reason, message, .. } => {
                assert_eq!(*reason, FailureReason::Upload);
                assert!(message.contains("500"), "message was {message}");
            }
            other => panic!("unexpected status {other:?}"),
        }

        let status = wf.retry().await.unwrap();
        assert_eq!(status, CaptureStatus::Previewing { kind: CaptureKind::Camera });
        assert_eq!(wf.device().acquired(), 2);
        assert_eq!(wf.device().active(), 1);
    }

    #[tokio::test]
    async fn test_upload_timeout_fails() {
        let wf = Arc::new(CaptureWorkflow::new(
            MockDevice::default(),
            MockAnalyzer::new(Reply::Hang),
            Duration::from_millis(50),
        ));

        wf.open(CaptureKind::Camera).await.unwrap();
        let status = wf.capture_and_submit(photo()).await.unwrap();
        match status {
            CaptureStatus::Failed { message, .. } => assert!(message.contains("did not finish")),
            other => panic!("unexpected status {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_abandoned_upload_fails_and_can_retry() {
        let wf = Arc::new(CaptureWorkflow::new(
            MockDevice::default(),
            MockAnalyzer::new(Reply::Hang),
            Duration::from_secs(60),
        ));
        let mut rx = wf.subscribe();

        wf.open(CaptureKind::Camera).await.unwrap();
        wf.capture(photo()).unwrap();
        let pending = {
            let wf = Arc::clone(&wf);
            tokio::spawn(async move { wf.submit().await })
        };
        wait_for(&mut rx, "uploading").await;

        // Client disconnect drops the handler future
        pending.abort();
        assert!(pending.await.unwrap_err().is_cancelled());

        match wf.status() {
            CaptureStatus::Failed {
                reason, message, ..
            } => {
                assert_eq!(reason, FailureReason::Upload);
                assert!(message.contains("interrupted"));
            }
            other => panic!("unexpected status {other:?}"),
        }
        assert_eq!(wf.analyzer.calls(), 1);

        let status = wf.retry().await.unwrap();
        assert_eq!(status.name(), "previewing");
        assert_eq!(wf.device().active(), 1);
    }

    #[tokio::test]
    async fn test_close_releases_tracks_from_every_state() {
        // Previewing
        let wf = workflow(MockDevice::default(), MockAnalyzer::new(Reply::Report));
        wf.open(CaptureKind::Camera).await.unwrap();
        assert_eq!(wf.device().active(), 1);
        assert_eq!(wf.close(), CaptureStatus::Idle);
        assert_eq!(wf.device().active(), 0);

        // Captured
        wf.open(CaptureKind::Camera).await.unwrap();
        wf.capture(photo()).unwrap();
        wf.close();
        assert_eq!(wf.device().active(), 0);

        // Failed / Succeeded
        wf.open(CaptureKind::Camera).await.unwrap();
        wf.capture_and_submit(photo()).await.unwrap();
        wf.close();
        assert_eq!(wf.device().active(), 0);

        // Idle
        assert_eq!(wf.close(), CaptureStatus::Idle);
        assert_eq!(wf.device().active(), 0);
    }

    #[tokio::test]
    async fn test_close_while_acquiring_drops_late_grant() {
        let gate = Arc::new(Notify::new());
        let device = MockDevice {
            gate: Some(Arc::clone(&gate)),
            ..MockDevice::default()
        };
        let wf = workflow(device, MockAnalyzer::new(Reply::Report));
        let mut rx = wf.subscribe();

        let background = Arc::clone(&wf);
        let opening = tokio::spawn(async move { background.open(CaptureKind::Camera).await });
        wait_for(&mut rx, "acquiring").await;

        wf.close();
        gate.notify_one();

        let status = opening.await.unwrap().unwrap();
        assert_eq!(status, CaptureStatus::Idle);
        assert_eq!(wf.device().active(), 0);
    }

    #[tokio::test]
    async fn test_close_during_upload_ignores_late_response() {
        let gate = Arc::new(Notify::new());
        let wf = workflow(
            MockDevice::default(),
            MockAnalyzer::gated(Reply::Report, Arc::clone(&gate)),
        );
        let mut rx = wf.subscribe();

        wf.open(CaptureKind::Camera).await.unwrap();
        wf.capture(photo()).unwrap();
        let background = Arc::clone(&wf);
        let upload = tokio::spawn(async move { background.submit().await });
        wait_for(&mut rx, "uploading").await;

        assert_eq!(wf.close(), CaptureStatus::Idle);
        gate.notify_one();

        assert_eq!(upload.await.unwrap().unwrap(), CaptureStatus::Idle);
        assert_eq!(wf.status(), CaptureStatus::Idle);
    }

    #[tokio::test]
    async fn test_reopen_after_close_starts_fresh_cycle() {
        let gate = Arc::new(Notify::new());
        let wf = workflow(
            MockDevice::default(),
            MockAnalyzer::gated(Reply::Report, Arc::clone(&gate)),
        );
        let mut rx = wf.subscribe();

        wf.open(CaptureKind::Camera).await.unwrap();
        wf.capture(photo()).unwrap();
        let background = Arc::clone(&wf);
        let upload = tokio::spawn(async move { background.submit().await });
        wait_for(&mut rx, "uploading").await;

        wf.close();
        wf.open(CaptureKind::Camera).await.unwrap();
        gate.notify_one();
        upload.await.unwrap().unwrap();

        // The stale success must not replace the new preview
        assert_eq!(
            wf.status(),
            CaptureStatus::Previewing { kind: CaptureKind::Camera }
        );
    }

    #[tokio::test]
    async fn test_capture_validation() {
        let wf = workflow(MockDevice::default(), MockAnalyzer::new(Reply::Report));

        assert!(matches!(
            wf.capture(photo()),
            Err(WorkflowError::InvalidTransition { action: "capture", state: "idle" })
        ));

        wf.open(CaptureKind::Camera).await.unwrap();
        let audio = CapturedMedia::new(CaptureKind::Microphone, None, None, vec![1]);
        assert_eq!(
            wf.capture(audio),
            Err(WorkflowError::KindMismatch {
                expected: CaptureKind::Camera,
                actual: CaptureKind::Microphone,
            })
        );

        let empty = CapturedMedia::new(CaptureKind::Camera, None, None, Vec::new());
        assert_eq!(wf.capture(empty), Err(WorkflowError::EmptyCapture));
        assert_eq!(
            wf.status(),
            CaptureStatus::Previewing { kind: CaptureKind::Camera }
        );
    }

    #[tokio::test]
    async fn test_retry_requires_result() {
        let wf = workflow(MockDevice::default(), MockAnalyzer::new(Reply::Report));
        wf.open(CaptureKind::Camera).await.unwrap();
        assert!(matches!(
            wf.retry().await,
            Err(WorkflowError::InvalidTransition { action: "retry", .. })
        ));
    }

    #[tokio::test]
    async fn test_open_same_device_is_idempotent() {
        let wf = workflow(MockDevice::default(), MockAnalyzer::new(Reply::Report));
        wf.open(CaptureKind::Camera).await.unwrap();
        wf.open(CaptureKind::Camera).await.unwrap();
        assert_eq!(wf.device().acquired(), 1);

        // Switching devices releases the camera
        wf.open(CaptureKind::Microphone).await.unwrap();
        assert_eq!(wf.device().acquired(), 2);
        assert_eq!(wf.device().active(), 1);
    }

    #[tokio::test]
    async fn test_drop_releases_tracks() {
        let counters = Arc::new(DeviceCounters::default());
        let device = MockDevice {
            counters: Arc::clone(&counters),
            ..MockDevice::default()
        };
        {
            let wf = workflow(device, MockAnalyzer::new(Reply::Report));
            wf.open(CaptureKind::Camera).await.unwrap();
            assert_eq!(counters.active.load(Ordering::SeqCst), 1);
        }
        assert_eq!(counters.active.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_status_serializes_with_state_tag() {
        let json = serde_json::to_value(CaptureStatus::Uploading {
            kind: CaptureKind::Microphone,
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"state": "uploading", "kind": "microphone"})
        );
    }
}
