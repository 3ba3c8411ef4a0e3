//! Camera and microphone capture workflow.

pub mod analyzer;
pub mod device;
pub mod workflow;

pub use analyzer::{Analyzer, UploadError};
pub use device::{DeviceAccessError, MediaDevice, MediaStream, MediaTrack};
pub use workflow::{
    CaptureFailure, CaptureStatus, CaptureWorkflow, FailureReason, WorkflowError,
};
