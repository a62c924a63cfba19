//! Camera device abstraction.
//!
//! The session holds the device exclusively while streaming; dropping the
//! stream releases it.

use std::path::PathBuf;

use thiserror::Error;

use tracknow_core::ErrorKind;

/// Failure within the capture pipeline. All recoverable: the pipeline
/// continues in degraded mode and the user can retry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// No camera, or permission denied. The session stays idle.
    #[error("camera unavailable: {0}")]
    DeviceUnavailable(String),

    /// The stream could not produce a frame. The session keeps streaming.
    #[error("frame capture failed: {0}")]
    CaptureFailed(String),

    /// The classification call failed. Manual entry still works.
    #[error("classification failed: {0}")]
    ClassificationFailed(String),
}

impl From<CaptureError> for ErrorKind {
    fn from(err: CaptureError) -> Self {
        match err {
            CaptureError::DeviceUnavailable(msg) => ErrorKind::DeviceUnavailable(msg),
            CaptureError::CaptureFailed(msg) => ErrorKind::CaptureFailed(msg),
            CaptureError::ClassificationFailed(msg) => ErrorKind::ClassificationFailed(msg),
        }
    }
}

/// One captured frame: an opaque, owned image payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame(Vec<u8>);

impl Frame {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A camera that can be opened into a live stream.
pub trait CameraDevice: Send {
    /// Acquire the device. Fails with [`CaptureError::DeviceUnavailable`]
    /// when no camera is present or permission is denied.
    fn open(&self) -> Result<Box<dyn CameraStream>, CaptureError>;
}

/// A live stream that can grab the current frame on demand.
///
/// Dropping the stream stops it and releases the device.
pub trait CameraStream: Send {
    fn grab_frame(&mut self) -> Result<Frame, CaptureError>;
}

/// Dev/demo camera that "captures" the contents of an image file.
#[derive(Debug, Clone)]
pub struct FileCamera {
    path: PathBuf,
}

impl FileCamera {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CameraDevice for FileCamera {
    fn open(&self) -> Result<Box<dyn CameraStream>, CaptureError> {
        if !self.path.is_file() {
            return Err(CaptureError::DeviceUnavailable(format!(
                "no such image file: {}",
                self.path.display()
            )));
        }
        Ok(Box::new(FileStream {
            path: self.path.clone(),
        }))
    }
}

struct FileStream {
    path: PathBuf,
}

impl CameraStream for FileStream {
    fn grab_frame(&mut self) -> Result<Frame, CaptureError> {
        let bytes = std::fs::read(&self.path)
            .map_err(|e| CaptureError::CaptureFailed(format!("{}: {e}", self.path.display())))?;
        Ok(Frame::new(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_camera_refuses_missing_file() {
        let camera = FileCamera::new("/definitely/not/here.png");
        let err = camera.open().map(|_| ()).unwrap_err();
        assert!(matches!(err, CaptureError::DeviceUnavailable(_)));
    }
}
