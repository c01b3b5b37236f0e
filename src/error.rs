//! Error types for the appending recorder

use crate::status::StatusError;
use thiserror::Error;

/// Broad category of a [`RecorderError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Io,
    Device,
    Format,
    Internal,
}

/// Errors surfaced by the recorder, either synchronously from construction or
/// asynchronously through `last_error` and the `Error` event.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecorderError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Audio device error: {0}")]
    Device(String),

    #[error("Incompatible audio file: {0}")]
    Format(String),

    #[error("Internal error: {0}")]
    Internal(#[from] StatusError),
}

impl RecorderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) => ErrorKind::Io,
            Self::Device(_) => ErrorKind::Device,
            Self::Format(_) => ErrorKind::Format,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<std::io::Error> for RecorderError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<hound::Error> for RecorderError {
    fn from(err: hound::Error) -> Self {
        match err {
            hound::Error::IoError(e) => Self::Io(e.to_string()),
            other => Self::Format(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::OsStatus;

    #[test]
    fn test_hound_io_errors_map_to_io_kind() {
        let err: RecorderError =
            hound::Error::IoError(std::io::Error::other("disk full")).into();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_hound_format_errors_map_to_format_kind() {
        let err: RecorderError = hound::Error::FormatError("no RIFF tag found").into();
        assert_eq!(err.kind(), ErrorKind::Format);
        assert!(err.to_string().contains("no RIFF tag found"));
    }

    #[test]
    fn test_status_error_is_internal() {
        let status = StatusError::new(OsStatus(-50), "AudioUnitRender", "capture.rs", 12);
        let err: RecorderError = status.into();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_os_resource_errors_map_to_io_kind() {
        let err: RecorderError =
            std::io::Error::new(std::io::ErrorKind::WouldBlock, "Resource temporarily unavailable").into();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(err.to_string().contains("Resource temporarily unavailable"));
    }
}
