//! External image-classification client.
//!
//! Single POST of raw image bytes to a caption/analyze endpoint; the top
//! caption (highest confidence, first in the list) becomes the suggested
//! name. No retry here; the caller decides whether to retry or proceed
//! without a label.

use async_trait::async_trait;
use serde::Deserialize;

use crate::camera::CaptureError;

const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// Classification seam, so the session can be driven with a stub in tests.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, image: &[u8]) -> Result<String, CaptureError>;
}

/// Endpoint URL and subscription key, environment-supplied and injected at
/// construction. The key is a secret; never log it.
#[derive(Debug, Clone)]
pub struct VisionConfig {
    pub endpoint: String,
    pub subscription_key: String,
}

/// HTTP client for an Azure-Vision-style analyze endpoint.
#[derive(Debug, Clone)]
pub struct ClassifierClient {
    client: reqwest::Client,
    config: VisionConfig,
}

impl ClassifierClient {
    pub fn new(config: VisionConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn analyze_url(&self) -> String {
        let base = self.config.endpoint.trim_end_matches('/');
        format!("{base}/vision/v3.2/analyze?visualFeatures=Description")
    }
}

#[async_trait]
impl Classifier for ClassifierClient {
    async fn classify(&self, image: &[u8]) -> Result<String, CaptureError> {
        let resp = self
            .client
            .post(self.analyze_url())
            .header(SUBSCRIPTION_KEY_HEADER, &self.config.subscription_key)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(image.to_vec())
            .send()
            .await
            .map_err(|e| CaptureError::ClassificationFailed(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(CaptureError::ClassificationFailed(format!(
                "analyze endpoint returned {}",
                resp.status()
            )));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| CaptureError::ClassificationFailed(e.to_string()))?;
        top_caption(&body)
    }
}

#[derive(Debug, Deserialize)]
struct AnalyzeResponse {
    description: Option<Description>,
}

#[derive(Debug, Deserialize)]
struct Description {
    #[serde(default)]
    captions: Vec<Caption>,
}

#[derive(Debug, Deserialize)]
struct Caption {
    text: String,
}

/// Extract the first caption's text. Captions arrive ordered by confidence,
/// highest first.
fn top_caption(body: &str) -> Result<String, CaptureError> {
    let parsed: AnalyzeResponse = serde_json::from_str(body)
        .map_err(|e| CaptureError::ClassificationFailed(format!("malformed response: {e}")))?;

    parsed
        .description
        .and_then(|d| d.captions.into_iter().next())
        .map(|c| c.text)
        .ok_or_else(|| CaptureError::ClassificationFailed("empty caption list".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_caption_takes_the_first_entry() {
        let body = r#"{
            "description": {
                "captions": [
                    {"text": "a red apple", "confidence": 0.97},
                    {"text": "fruit on a table", "confidence": 0.41}
                ]
            }
        }"#;
        assert_eq!(top_caption(body).unwrap(), "a red apple");
    }

    #[test]
    fn empty_caption_list_is_classification_failure() {
        let body = r#"{"description": {"captions": []}}"#;
        let err = top_caption(body).unwrap_err();
        assert!(matches!(err, CaptureError::ClassificationFailed(_)));
    }

    #[test]
    fn missing_description_is_classification_failure() {
        let err = top_caption(r#"{"tags": []}"#).unwrap_err();
        assert!(matches!(err, CaptureError::ClassificationFailed(_)));
    }

    #[test]
    fn malformed_body_is_classification_failure() {
        let err = top_caption("<html>gateway timeout</html>").unwrap_err();
        assert!(matches!(err, CaptureError::ClassificationFailed(_)));
    }
}
