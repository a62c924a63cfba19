//! Environment-supplied configuration.
//!
//! Secrets (the vision subscription key) are injected at construction and
//! never live in core logic.

use std::time::Duration;

use tracknow_capture::VisionConfig;

const DEFAULT_POLL_MS: u64 = 2000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Base URL of the REST document store. Unset means in-memory.
    pub store_url: Option<String>,
    /// Image file the demo camera "captures".
    pub camera_file: Option<String>,
    /// Classifier endpoint + key; both must be set to enable capture.
    pub vision: Option<VisionConfig>,
    /// Snapshot poll interval for the REST store.
    pub poll_interval: Duration,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let vision = match (
            std::env::var("TRACKNOW_VISION_ENDPOINT"),
            std::env::var("TRACKNOW_VISION_KEY"),
        ) {
            (Ok(endpoint), Ok(subscription_key)) => Some(VisionConfig {
                endpoint,
                subscription_key,
            }),
            _ => None,
        };

        let poll_ms = std::env::var("TRACKNOW_POLL_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_POLL_MS);

        Self {
            store_url: std::env::var("TRACKNOW_STORE_URL").ok(),
            camera_file: std::env::var("TRACKNOW_CAMERA_FILE").ok(),
            vision,
            poll_interval: Duration::from_millis(poll_ms),
        }
    }
}
