//! `tracknow-capture` — the capture-classify-commit pipeline.
//!
//! [`CaptureSession`] owns the camera stream lifecycle and a one-slot draft
//! pending user confirmation. [`ClassifierClient`] pre-fills the draft name
//! from an external image-captioning endpoint; classification is advisory
//! and never blocks manual entry.

pub mod camera;
pub mod classifier;
pub mod session;

pub use camera::{CameraDevice, CameraStream, CaptureError, FileCamera, Frame};
pub use classifier::{Classifier, ClassifierClient, VisionConfig};
pub use session::{CaptureDraft, CaptureSession, CaptureState};
