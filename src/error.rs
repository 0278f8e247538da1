use thiserror::Error;

/// Failures the capture page reports back to the user.
///
/// Library calls return `anyhow::Result`; these variants sit at the root of the
/// error chain so callers can `downcast_ref::<CaptureError>()` to tell a refused
/// camera apart from a recorder misuse.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("camera access denied for {0}")]
    PermissionDenied(String),
    #[error("camera device unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("detection model is not loaded yet")]
    ModelNotReady,
    #[error("video source unavailable: {0}")]
    SourceUnavailable(String),
    #[error("a video source is already active ({0})")]
    SourceAlreadySelected(String),
    #[error("recording state error: {0}")]
    RecordingState(String),
}

impl CaptureError {
    /// Classify an I/O failure raised while opening a camera device.
    pub fn from_device_io(device: &str, err: &std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(device.to_string()),
            _ => Self::DeviceUnavailable(format!("{}: {}", device, err)),
        }
    }
}

/// Find the `CaptureError` at the root of an `anyhow` chain, if any.
pub fn capture_error(err: &anyhow::Error) -> Option<&CaptureError> {
    err.chain().find_map(|cause| cause.downcast_ref::<CaptureError>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn permission_errors_map_to_permission_denied() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "EACCES");
        assert_eq!(
            CaptureError::from_device_io("/dev/video0", &io),
            CaptureError::PermissionDenied("/dev/video0".to_string())
        );

        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "ENOENT");
        assert!(matches!(
            CaptureError::from_device_io("/dev/video9", &io),
            CaptureError::DeviceUnavailable(_)
        ));
    }

    #[test]
    fn capture_error_survives_context() {
        let err: anyhow::Result<()> =
            Err(anyhow::Error::new(CaptureError::ModelNotReady)).context("select source");
        let err = err.unwrap_err();
        assert_eq!(capture_error(&err), Some(&CaptureError::ModelNotReady));
    }
}
