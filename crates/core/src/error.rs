//! User-facing error taxonomy.
//!
//! Every component records its most recent failure as an `ErrorKind` for the
//! caller to render. None of these are fatal; the user can always retry the
//! triggering action. Retries are never automatic.

use thiserror::Error;

/// The renderable error taxonomy.
///
/// Crate-level error types (`StoreError`, `CaptureError`, ...) convert into
/// this for display; keep those for propagation and this for `last_error`
/// state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Local validation failed; the store was never called.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// No camera device, or permission denied.
    #[error("camera unavailable: {0}")]
    DeviceUnavailable(String),

    /// The camera stream could not produce a frame.
    #[error("capture failed: {0}")]
    CaptureFailed(String),

    /// The classification service failed; manual entry still works.
    #[error("classification failed: {0}")]
    ClassificationFailed(String),

    /// Transport-level store failure; the operation was abandoned.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// The target document no longer exists. Benign for delete-like ops.
    #[error("not found")]
    NotFound,

    /// Surfaced by the session boundary, not handled by the core.
    #[error("auth error: {0}")]
    Auth(String),
}

impl ErrorKind {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn store_unavailable(msg: impl Into<String>) -> Self {
        Self::StoreUnavailable(msg.into())
    }
}
