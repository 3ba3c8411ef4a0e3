//! Media device bridge to the kiosk browser.
//!
//! The camera and microphone are attached to the kiosk screen, not to the
//! server. The page asks the browser for a stream and reports the outcome
//! here; the capture workflow then acquires a server-side handle for that
//! stream. Releasing the handle is mirrored back to the page through the
//! workflow status, which stops the browser tracks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use nutrition_kiosk_core::CaptureKind;
use uuid::Uuid;

use crate::capture::{DeviceAccessError, MediaDevice, MediaStream, MediaTrack};

/// Outcome of the page's `getUserMedia` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceReport {
    Granted,
    Refused(DeviceAccessError),
}

impl DeviceReport {
    /// Build a report from what the page posted.
    ///
    /// `error_name` is the DOM exception name (`NotAllowedError`, ...).
    #[must_use]
    pub fn from_page(
        kind: CaptureKind,
        granted: bool,
        error_name: Option<&str>,
        message: Option<&str>,
    ) -> Self {
        if granted {
            return Self::Granted;
        }

        let error = match error_name.map(str::trim).unwrap_or_default() {
            "NotAllowedError" | "SecurityError" | "PermissionDeniedError" => {
                DeviceAccessError::PermissionDenied(kind)
            }
            "NotFoundError" | "OverconstrainedError" | "NotReadableError" => {
                DeviceAccessError::Unavailable(kind)
            }
            other => DeviceAccessError::Failed {
                kind,
                message: message
                    .map(str::trim)
                    .filter(|m| !m.is_empty())
                    .or(Some(other).filter(|o| !o.is_empty()))
                    .unwrap_or("unknown error")
                    .to_string(),
            },
        };
        Self::Refused(error)
    }
}

/// [`MediaDevice`] backed by reports from the kiosk page.
///
/// The last report per device kind is kept, so a retry re-acquires with the
/// permission the browser already granted.
#[derive(Debug, Default)]
pub struct BrowserMediaBridge {
    reports: Mutex<HashMap<CaptureKind, DeviceReport>>,
    active: Arc<AtomicUsize>,
}

impl BrowserMediaBridge {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the page's latest `getUserMedia` outcome for `kind`.
    pub fn report(&self, kind: CaptureKind, report: DeviceReport) {
        tracing::debug!(kind = %kind, ?report, "Device report from page");
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(kind, report);
    }

    /// Number of tracks handed out and not yet stopped.
    #[must_use]
    pub fn active_tracks(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

impl MediaDevice for BrowserMediaBridge {
    async fn acquire(&self, kind: CaptureKind) -> Result<MediaStream, DeviceAccessError> {
        let report = self
            .reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .cloned();

        match report {
            Some(DeviceReport::Granted) => {
                let track = BrowserTrack::start(kind, Arc::clone(&self.active));
                Ok(MediaStream::new(kind, vec![Box::new(track)]))
            }
            Some(DeviceReport::Refused(err)) => Err(err),
            None => Err(DeviceAccessError::Failed {
                kind,
                message: "the kiosk page has not requested the device".to_string(),
            }),
        }
    }
}

/// Server-side handle for one browser track.
#[derive(Debug)]
struct BrowserTrack {
    id: String,
    active: Option<Arc<AtomicUsize>>,
}

impl BrowserTrack {
    fn start(kind: CaptureKind, active: Arc<AtomicUsize>) -> Self {
        active.fetch_add(1, Ordering::SeqCst);
        Self {
            id: format!("{kind}-{}", Uuid::new_v4()),
            active: Some(active),
        }
    }
}

impl MediaTrack for BrowserTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn stop(&mut self) {
        if let Some(active) = self.active.take() {
            active.fetch_sub(1, Ordering::SeqCst);
        }
    }
}
