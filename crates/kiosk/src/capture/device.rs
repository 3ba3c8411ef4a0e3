//! Media device access.
//!
//! A [`MediaStream`] owns the tracks handed out by a [`MediaDevice`] and
//! stops every one of them when released or dropped, so no exit path can
//! leave the camera or microphone running.

use std::fmt;
use std::future::Future;

use nutrition_kiosk_core::CaptureKind;
use thiserror::Error;

/// Camera or microphone could not be opened.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceAccessError {
    /// The user (or kiosk policy) refused access.
    #[error("Permission to use the {0} was denied")]
    PermissionDenied(CaptureKind),

    /// No such device is attached or it is busy.
    #[error("No {0} is available")]
    Unavailable(CaptureKind),

    /// Any other failure while opening the device.
    #[error("Could not open the {kind}: {message}")]
    Failed { kind: CaptureKind, message: String },
}

impl DeviceAccessError {
    /// Device the error refers to.
    #[must_use]
    pub const fn kind(&self) -> CaptureKind {
        match self {
            Self::PermissionDenied(kind) | Self::Unavailable(kind) => *kind,
            Self::Failed { kind, .. } => *kind,
        }
    }
}

/// One live track of a media stream.
pub trait MediaTrack: Send + Sync + fmt::Debug {
    /// Track identifier, for logs.
    fn id(&self) -> &str;

    /// Stop the track and release the underlying device. Must be idempotent.
    fn stop(&mut self);
}

/// Source of exclusive camera or microphone streams.
pub trait MediaDevice: Send + Sync {
    /// Acquire a stream for `kind`.
    fn acquire(
        &self,
        kind: CaptureKind,
    ) -> impl Future<Output = Result<MediaStream, DeviceAccessError>> + Send;
}

/// An acquired camera or microphone stream.
#[derive(Debug)]
pub struct MediaStream {
    kind: CaptureKind,
    tracks: Vec<Box<dyn MediaTrack>>,
}

impl MediaStream {
    /// Wrap acquired tracks.
    #[must_use]
    pub fn new(kind: CaptureKind, tracks: Vec<Box<dyn MediaTrack>>) -> Self {
        Self { kind, tracks }
    }

    /// Device kind the stream belongs to.
    #[must_use]
    pub const fn kind(&self) -> CaptureKind {
        self.kind
    }

    /// Number of tracks still held.
    #[must_use]
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Stop every track now.
    pub fn release(mut self) {
        self.stop_all();
    }

    fn stop_all(&mut self) {
        for mut track in self.tracks.drain(..) {
            tracing::debug!(kind = %self.kind, track = track.id(), "Stopping media track");
            track.stop();
        }
    }
}

impl Drop for MediaStream {
    fn drop(&mut self) {
        self.stop_all();
    }
}
