//! Capture session state machine.
//!
//! ```text
//! Idle -> Streaming -> Captured -> Classifying -> Ready -> Committing -> Streaming
//! ```
//!
//! The session owns at most one in-flight draft (a one-slot arena); a
//! re-capture overwrites it, a confirm consumes it, a teardown discards it.
//! A draft is never partially persisted.

use tracknow_core::ErrorKind;
use tracknow_engine::{EngineError, InventoryEngine};
use tracknow_store::RemoteStore;

use crate::camera::{CameraDevice, CameraStream, CaptureError, Frame};
use crate::classifier::Classifier;

/// Observable session state.
///
/// `Captured`, `Classifying` and `Committing` are transient: they are only
/// held across the suspension points inside [`CaptureSession::capture`] and
/// [`CaptureSession::confirm`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Streaming,
    Captured,
    Classifying,
    Ready,
    Committing,
}

/// Unconfirmed candidate item produced by the capture pipeline.
#[derive(Debug, Clone)]
pub struct CaptureDraft {
    image: Frame,
    suggested_name: String,
    quantity: i64,
}

impl CaptureDraft {
    fn new(image: Frame) -> Self {
        Self {
            image,
            suggested_name: String::new(),
            quantity: 1,
        }
    }

    pub fn image(&self) -> &Frame {
        &self.image
    }

    pub fn suggested_name(&self) -> &str {
        &self.suggested_name
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }
}

/// Owns the camera stream lifecycle and the pending draft.
pub struct CaptureSession {
    camera: Box<dyn CameraDevice>,
    classifier: Box<dyn Classifier>,
    stream: Option<Box<dyn CameraStream>>,
    draft: Option<CaptureDraft>,
    state: CaptureState,
    last_error: Option<ErrorKind>,
}

impl CaptureSession {
    pub fn new(camera: Box<dyn CameraDevice>, classifier: Box<dyn Classifier>) -> Self {
        Self {
            camera,
            classifier,
            stream: None,
            draft: None,
            state: CaptureState::Idle,
            last_error: None,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn draft(&self) -> Option<&CaptureDraft> {
        self.draft.as_ref()
    }

    pub fn last_error(&self) -> Option<ErrorKind> {
        self.last_error.clone()
    }

    /// Acquire the camera and begin streaming.
    ///
    /// On [`CaptureError::DeviceUnavailable`] the session stays `Idle`; the
    /// failure is reported, not fatal.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        if self.state != CaptureState::Idle {
            return Ok(());
        }
        self.last_error = None;

        match self.camera.open() {
            Ok(stream) => {
                self.stream = Some(stream);
                self.state = CaptureState::Streaming;
                Ok(())
            }
            Err(err) => {
                tracing::warn!("camera acquisition failed: {err}");
                self.last_error = Some(err.clone().into());
                Err(err)
            }
        }
    }

    /// Grab the current frame and classify it into a fresh draft.
    ///
    /// Valid while `Streaming`, or from `Ready` as a re-capture (the current
    /// draft is discarded first). Classification failure is advisory: the
    /// session still reaches `Ready`, with the suggested name left blank.
    pub async fn capture(&mut self) -> Result<(), CaptureError> {
        match self.state {
            CaptureState::Streaming | CaptureState::Ready => {}
            _ => {
                let err = CaptureError::CaptureFailed("no active camera stream".to_string());
                self.last_error = Some(err.clone().into());
                return Err(err);
            }
        }
        self.last_error = None;
        // Re-capture overwrites the one-slot draft.
        self.draft = None;

        let Some(stream) = self.stream.as_mut() else {
            let err = CaptureError::CaptureFailed("camera stream is gone".to_string());
            self.state = CaptureState::Idle;
            self.last_error = Some(err.clone().into());
            return Err(err);
        };

        let frame = match stream.grab_frame() {
            Ok(frame) => frame,
            Err(err) => {
                self.state = CaptureState::Streaming;
                self.last_error = Some(err.clone().into());
                return Err(err);
            }
        };

        self.state = CaptureState::Captured;
        let mut draft = CaptureDraft::new(frame);

        self.state = CaptureState::Classifying;
        match self.classifier.classify(draft.image.as_bytes()).await {
            Ok(label) => draft.suggested_name = label,
            Err(err) => {
                // Advisory only: the user can still type a name by hand.
                tracing::warn!("classification failed, leaving name blank: {err}");
                self.last_error = Some(err.into());
            }
        }

        self.draft = Some(draft);
        self.state = CaptureState::Ready;
        Ok(())
    }

    /// Replace the draft's suggested name (user edit).
    pub fn set_name(&mut self, name: &str) {
        if let Some(draft) = self.draft.as_mut() {
            draft.suggested_name = name.to_string();
        }
    }

    pub fn increment_quantity(&mut self) {
        if let Some(draft) = self.draft.as_mut() {
            draft.quantity += 1;
        }
    }

    /// Lower the draft quantity, bounded below at 1.
    pub fn decrement_quantity(&mut self) {
        if let Some(draft) = self.draft.as_mut() {
            draft.quantity = (draft.quantity - 1).max(1);
        }
    }

    /// Commit the draft through the engine.
    ///
    /// On success the draft is consumed and streaming resumes for the next
    /// capture. On `InvalidInput` the session stays `Ready` with the draft
    /// intact so the user can fix it.
    pub async fn confirm<S: RemoteStore + 'static>(
        &mut self,
        engine: &InventoryEngine<S>,
    ) -> Result<tracknow_core::ItemId, EngineError> {
        let Some(draft) = self.draft.as_ref() else {
            let err = EngineError::InvalidInput(tracknow_core::InvalidItem(
                "no draft to confirm".to_string(),
            ));
            self.last_error = Some(err.clone().into());
            return Err(err);
        };
        self.last_error = None;

        let name = draft.suggested_name.clone();
        let quantity = draft.quantity;
        self.state = CaptureState::Committing;

        match engine.add(&name, quantity).await {
            Ok(id) => {
                self.draft = None;
                self.state = if self.stream.is_some() {
                    CaptureState::Streaming
                } else {
                    CaptureState::Idle
                };
                Ok(id)
            }
            Err(err) => {
                self.state = CaptureState::Ready;
                self.last_error = Some(err.clone().into());
                Err(err)
            }
        }
    }

    /// Release the camera stream and discard any draft.
    pub fn stop(&mut self) {
        // Dropping the stream stops it and releases the device.
        self.stream = None;
        self.draft = None;
        self.state = CaptureState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use tracknow_core::OwnerId;
    use tracknow_store::InMemoryStore;

    struct StubCamera {
        available: bool,
        frame_fails: bool,
    }

    impl CameraDevice for StubCamera {
        fn open(&self) -> Result<Box<dyn CameraStream>, CaptureError> {
            if !self.available {
                return Err(CaptureError::DeviceUnavailable(
                    "no camera attached".to_string(),
                ));
            }
            Ok(Box::new(StubStream {
                fails: self.frame_fails,
                counter: 0,
            }))
        }
    }

    struct StubStream {
        fails: bool,
        counter: u8,
    }

    impl CameraStream for StubStream {
        fn grab_frame(&mut self) -> Result<Frame, CaptureError> {
            if self.fails {
                return Err(CaptureError::CaptureFailed("context not ready".to_string()));
            }
            self.counter += 1;
            Ok(Frame::new(vec![self.counter; 4]))
        }
    }

    enum StubClassifier {
        Label(&'static str),
        Failing,
    }

    #[async_trait]
    impl Classifier for StubClassifier {
        async fn classify(&self, _image: &[u8]) -> Result<String, CaptureError> {
            match self {
                StubClassifier::Label(text) => Ok((*text).to_string()),
                StubClassifier::Failing => Err(CaptureError::ClassificationFailed(
                    "empty caption list".to_string(),
                )),
            }
        }
    }

    fn session(available: bool, frame_fails: bool, classifier: StubClassifier) -> CaptureSession {
        CaptureSession::new(
            Box::new(StubCamera {
                available,
                frame_fails,
            }),
            Box::new(classifier),
        )
    }

    #[tokio::test]
    async fn unavailable_device_keeps_session_idle() {
        let mut s = session(false, false, StubClassifier::Label("a red apple"));
        let err = s.start().unwrap_err();
        assert!(matches!(err, CaptureError::DeviceUnavailable(_)));
        assert_eq!(s.state(), CaptureState::Idle);
        assert!(matches!(
            s.last_error(),
            Some(ErrorKind::DeviceUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn capture_with_classification_fills_the_suggested_name() {
        let mut s = session(true, false, StubClassifier::Label("a red apple"));
        s.start().unwrap();
        s.capture().await.unwrap();

        assert_eq!(s.state(), CaptureState::Ready);
        let draft = s.draft().unwrap();
        assert_eq!(draft.suggested_name(), "a red apple");
        assert_eq!(draft.quantity(), 1);
        assert!(!draft.image().is_empty());
    }

    #[tokio::test]
    async fn classification_failure_still_reaches_ready_with_blank_name() {
        let mut s = session(true, false, StubClassifier::Failing);
        s.start().unwrap();
        s.capture().await.unwrap();

        assert_eq!(s.state(), CaptureState::Ready);
        assert_eq!(s.draft().unwrap().suggested_name(), "");
        assert!(matches!(
            s.last_error(),
            Some(ErrorKind::ClassificationFailed(_))
        ));
    }

    #[tokio::test]
    async fn frame_failure_stays_streaming_without_a_draft() {
        let mut s = session(true, true, StubClassifier::Label("a red apple"));
        s.start().unwrap();
        let err = s.capture().await.unwrap_err();

        assert!(matches!(err, CaptureError::CaptureFailed(_)));
        assert_eq!(s.state(), CaptureState::Streaming);
        assert!(s.draft().is_none());
    }

    #[tokio::test]
    async fn capture_without_start_is_rejected() {
        let mut s = session(true, false, StubClassifier::Label("a red apple"));
        let err = s.capture().await.unwrap_err();
        assert!(matches!(err, CaptureError::CaptureFailed(_)));
        assert_eq!(s.state(), CaptureState::Idle);
    }

    #[tokio::test]
    async fn quantity_is_bounded_below_at_one() {
        let mut s = session(true, false, StubClassifier::Label("a red apple"));
        s.start().unwrap();
        s.capture().await.unwrap();

        s.decrement_quantity();
        assert_eq!(s.draft().unwrap().quantity(), 1);
        s.increment_quantity();
        s.increment_quantity();
        assert_eq!(s.draft().unwrap().quantity(), 3);
        s.decrement_quantity();
        assert_eq!(s.draft().unwrap().quantity(), 2);
    }

    #[tokio::test]
    async fn recapture_discards_edits_and_builds_a_fresh_draft() {
        let mut s = session(true, false, StubClassifier::Label("a red apple"));
        s.start().unwrap();
        s.capture().await.unwrap();

        s.set_name("My apple");
        s.increment_quantity();

        s.capture().await.unwrap();
        let draft = s.draft().unwrap();
        assert_eq!(draft.suggested_name(), "a red apple");
        assert_eq!(draft.quantity(), 1);
    }

    #[tokio::test]
    async fn confirm_commits_the_draft_and_resumes_streaming() {
        let store = Arc::new(InMemoryStore::new());
        let engine = InventoryEngine::new(store.clone());
        engine.start(OwnerId::new());

        let mut s = session(true, false, StubClassifier::Label("a red apple"));
        s.start().unwrap();
        s.capture().await.unwrap();
        s.set_name("Apples");
        s.increment_quantity();

        let id = s.confirm(&engine).await.unwrap();
        assert!(s.draft().is_none());
        assert_eq!(s.state(), CaptureState::Streaming);

        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let rev = engine.revision();
                if engine.get(id).is_some() {
                    return;
                }
                engine.changed(rev).await;
            }
        })
        .await
        .unwrap();
        let item = engine.get(id).unwrap();
        assert_eq!(item.name, "Apples");
        assert_eq!(item.quantity, 2);
    }

    #[tokio::test]
    async fn confirm_with_blank_name_stays_ready() {
        let store = Arc::new(InMemoryStore::new());
        let engine = InventoryEngine::new(store.clone());
        engine.start(OwnerId::new());

        let mut s = session(true, false, StubClassifier::Failing);
        s.start().unwrap();
        s.capture().await.unwrap();

        let err = s.confirm(&engine).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
        assert_eq!(s.state(), CaptureState::Ready);
        assert!(s.draft().is_some());
        assert!(matches!(s.last_error(), Some(ErrorKind::InvalidInput(_))));
    }

    #[tokio::test]
    async fn stop_releases_the_stream_and_discards_the_draft() {
        let mut s = session(true, false, StubClassifier::Label("a red apple"));
        s.start().unwrap();
        s.capture().await.unwrap();

        s.stop();
        assert_eq!(s.state(), CaptureState::Idle);
        assert!(s.draft().is_none());
    }
}
