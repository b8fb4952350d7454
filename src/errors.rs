use crate::types::ScanStatus;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure categories surfaced to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// User declined camera access
    PermissionDenied,
    /// No camera, or the camera is busy or went away
    DeviceUnavailable,
    /// Host has no camera capability at all
    NotSupported,
    /// Decoder failed for a reason other than "no code in frame"
    DecodeFault,
}

impl ErrorKind {
    /// `NotSupported` is terminal, everything else can be retried.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ErrorKind::NotSupported)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::PermissionDenied => "permission_denied",
            ErrorKind::DeviceUnavailable => "device_unavailable",
            ErrorKind::NotSupported => "not_supported",
            ErrorKind::DecodeFault => "decode_fault",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while acquiring or driving a camera.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CameraError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Camera unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("Camera not supported: {0}")]
    NotSupported(String),
}

impl CameraError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CameraError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            CameraError::DeviceUnavailable(_) => ErrorKind::DeviceUnavailable,
            CameraError::NotSupported(_) => ErrorKind::NotSupported,
        }
    }
}

/// A decoder failure unrelated to an ordinary no-match frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Decoder error: {0}")]
pub struct DecoderError(pub String);

impl DecoderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Errors returned by scanner controller commands.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    #[error(transparent)]
    Camera(#[from] CameraError),
    #[error("At least one format must stay enabled")]
    EmptyFormatSet,
    #[error("Cannot {command} while {status}")]
    InvalidState {
        command: &'static str,
        status: ScanStatus,
    },
    #[error("Scanner controller has shut down")]
    ControllerClosed,
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ScanError {
    /// The snapshot-level kind, if this error maps onto one.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            ScanError::Camera(e) => Some(e.kind()),
            _ => None,
        }
    }
}

/// Error recorded in the session snapshot while status is `Error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&CameraError> for ScanFailure {
    fn from(error: &CameraError) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}
