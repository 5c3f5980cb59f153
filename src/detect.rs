use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Detector code for Tagalog; the domain code for the language is `fil`.
const DETECTOR_TAGALOG: &str = "tl";

#[derive(Debug, Error)]
pub enum DetectError {
    #[error("language detection request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("language detection API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("no language detected")]
    Undetected,
}

/// Detects the language of a piece of text.
#[async_trait]
pub trait LanguageDetector: Send + Sync {
    /// Raw detector code for `text` (not yet normalized).
    async fn detect(&self, text: &str) -> Result<String, DetectError>;
}

/// Map a detector code onto the domain's language codes.
pub fn normalize_detected_code(code: &str) -> String {
    let code = code.trim().to_lowercase();
    if code == DETECTOR_TAGALOG {
        "fil".to_string()
    } else {
        code
    }
}

#[derive(Debug, Serialize)]
struct DetectRequest<'a> {
    q: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct Detection {
    language: String,
    #[allow(dead_code)]
    confidence: f64,
}

/// Client for a LibreTranslate-compatible `/detect` endpoint.
#[derive(Debug, Clone)]
pub struct LibreTranslateDetector {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl LibreTranslateDetector {
    pub fn new(client: reqwest::Client, base_url: &str, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

#[async_trait]
impl LanguageDetector for LibreTranslateDetector {
    async fn detect(&self, text: &str) -> Result<String, DetectError> {
        let response = self
            .client
            .post(format!("{}/detect", self.base_url))
            .json(&DetectRequest {
                q: text,
                api_key: self.api_key.as_deref(),
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(DetectError::Api { status, body });
        }

        // Candidates are ordered by confidence, best first
        let detections: Vec<Detection> = response.json().await?;
        detections
            .into_iter()
            .next()
            .map(|best| best.language)
            .ok_or(DetectError::Undetected)
    }
}
