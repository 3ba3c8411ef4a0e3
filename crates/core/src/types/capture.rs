//! Media capture kinds and payloads.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which device a capture uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureKind {
    /// Single still frame from the camera.
    Camera,
    /// Finite audio recording from the microphone.
    Microphone,
}

impl CaptureKind {
    /// Stable lowercase name used in forms and URLs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Camera => "camera",
            Self::Microphone => "microphone",
        }
    }

    /// Filename used when the client did not send one.
    #[must_use]
    pub const fn default_filename(&self) -> &'static str {
        match self {
            Self::Camera => "capture.jpg",
            Self::Microphone => "recording.webm",
        }
    }

    /// Content type used when the client did not send one.
    #[must_use]
    pub const fn default_content_type(&self) -> &'static str {
        match self {
            Self::Camera => "image/jpeg",
            Self::Microphone => "audio/webm",
        }
    }
}

impl fmt::Display for CaptureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error parsing a [`CaptureKind`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown capture kind: {0}")]
pub struct UnknownCaptureKind(pub String);

impl FromStr for CaptureKind {
    type Err = UnknownCaptureKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "camera" | "image" => Ok(Self::Camera),
            "microphone" | "mic" | "audio" => Ok(Self::Microphone),
            other => Err(UnknownCaptureKind(other.to_string())),
        }
    }
}

/// A captured still image or audio recording, ready for upload.
#[derive(Clone, PartialEq, Eq)]
pub struct CapturedMedia {
    pub kind: CaptureKind,
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl CapturedMedia {
    /// Create a payload, falling back to per-kind defaults for blank metadata.
    #[must_use]
    pub fn new(
        kind: CaptureKind,
        filename: Option<String>,
        content_type: Option<String>,
        bytes: Vec<u8>,
    ) -> Self {
        let filename = filename
            .filter(|f| !f.trim().is_empty())
            .unwrap_or_else(|| kind.default_filename().to_string());
        let content_type = content_type
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| kind.default_content_type().to_string());

        Self {
            kind,
            filename,
            content_type,
            bytes,
        }
    }

    /// Payload size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

// Payloads can be megabytes; keep them out of logs.
impl fmt::Debug for CapturedMedia {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapturedMedia")
            .field("kind", &self.kind)
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_capture_kind() {
        assert_eq!("camera".parse::<CaptureKind>().unwrap(), CaptureKind::Camera);
        assert_eq!(" Audio ".parse::<CaptureKind>().unwrap(), CaptureKind::Microphone);
        assert!("scanner".parse::<CaptureKind>().is_err());
    }

    #[test]
    fn test_captured_media_defaults() {
        let media = CapturedMedia::new(CaptureKind::Microphone, Some("  ".into()), None, vec![1]);
        assert_eq!(media.filename, "recording.webm");
        assert_eq!(media.content_type, "audio/webm");
        assert_eq!(media.len(), 1);
    }

    #[test]
    fn test_debug_hides_payload() {
        let media = CapturedMedia::new(CaptureKind::Camera, None, None, vec![0xAB; 64]);
        let debug = format!("{media:?}");
        assert!(debug.contains("len: 64"));
        assert!(!debug.contains("171"));
    }
}
