//! Translator handles and the HTTP inference backend.
//!
//! A `ModelLoader` turns a model identifier into a `Translator` handle. The
//! production loader talks to a Hugging Face style inference API:
//!
//! ```text
//! POST {base}/models/{model_id}
//! {"inputs": "...", "parameters": {"src_lang": "...", "tgt_lang": "..."},
//!  "options": {"wait_for_model": true}}
//!
//! -> [{"translation_text": "..."}]
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Language codes in the scheme of the model being invoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelCodes {
    pub src_lang: String,
    pub tgt_lang: String,
}

/// One output produced by a translation model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationCandidate {
    pub translation_text: String,
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to load model {model}: {message}")]
    Load { model: String, message: String },

    #[error("inference request for {model} failed: {source}")]
    Http {
        model: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("inference API error for {model} ({status}): {body}")]
    Api {
        model: String,
        status: u16,
        body: String,
    },

    #[error("model {model} failed: {message}")]
    Inference { model: String, message: String },

    #[error("model {model} returned no candidates")]
    EmptyOutput { model: String },
}

/// A loaded translation model.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Identifier of the underlying model (e.g. "facebook/nllb-200-distilled-600M")
    fn model_id(&self) -> &str;

    /// Translate `text`, returning the candidates produced by the model.
    async fn translate(
        &self,
        text: &str,
        codes: &ModelCodes,
    ) -> Result<Vec<TranslationCandidate>, ModelError>;
}

/// Instantiates translator handles from model identifiers.
#[async_trait]
pub trait ModelLoader: Send + Sync {
    async fn load(&self, model_id: &str) -> Result<Arc<dyn Translator>, ModelError>;
}

#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
    parameters: &'a ModelCodes,
    options: InferenceOptions,
}

#[derive(Debug, Serialize)]
struct InferenceOptions {
    wait_for_model: bool,
}

/// Loader for models served by an HTTP inference API.
#[derive(Debug, Clone)]
pub struct HttpModelLoader {
    client: reqwest::Client,
    base_url: String,
    api_token: Option<String>,
}

impl HttpModelLoader {
    pub fn new(client: reqwest::Client, base_url: &str, api_token: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
        }
    }
}

#[async_trait]
impl ModelLoader for HttpModelLoader {
    async fn load(&self, model_id: &str) -> Result<Arc<dyn Translator>, ModelError> {
        if model_id.trim().is_empty() {
            return Err(ModelError::Load {
                model: model_id.to_string(),
                message: "empty model id".to_string(),
            });
        }

        Ok(Arc::new(HttpTranslator {
            client: self.client.clone(),
            url: format!("{}/models/{}", self.base_url, model_id),
            model_id: model_id.to_string(),
            api_token: self.api_token.clone(),
        }))
    }
}

/// Translator handle bound to one model of the inference API.
#[derive(Debug)]
pub struct HttpTranslator {
    client: reqwest::Client,
    url: String,
    model_id: String,
    api_token: Option<String>,
}

#[async_trait]
impl Translator for HttpTranslator {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn translate(
        &self,
        text: &str,
        codes: &ModelCodes,
    ) -> Result<Vec<TranslationCandidate>, ModelError> {
        let request = InferenceRequest {
            inputs: text,
            parameters: codes,
            options: InferenceOptions {
                wait_for_model: true,
            },
        };

        debug!(
            "Invoking {} ({} -> {})",
            self.model_id, codes.src_lang, codes.tgt_lang
        );

        let mut builder = self.client.post(&self.url).json(&request);
        if let Some(token) = &self.api_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await.map_err(|source| ModelError::Http {
            model: self.model_id.clone(),
            source,
        })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
            return Err(ModelError::Api {
                model: self.model_id.clone(),
                status,
                body,
            });
        }

        response
            .json::<Vec<TranslationCandidate>>()
            .await
            .map_err(|source| ModelError::Http {
                model: self.model_id.clone(),
                source,
            })
    }
}
