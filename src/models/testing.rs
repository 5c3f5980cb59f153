//! In-process translator stubs for unit tests.

use super::{ModelCodes, ModelError, ModelLoader, TranslationCandidate, Translator};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Loader producing deterministic translators that tag their output with the
/// codes they were invoked with: `"[src>tgt] text"`.
#[derive(Default)]
pub struct FakeLoader {
    loads: AtomicUsize,
    calls: Arc<AtomicUsize>,
    failing_models: HashSet<String>,
    unloadable_models: HashSet<String>,
    silent_models: HashSet<String>,
    blank_models: HashSet<String>,
    load_delay: Option<Duration>,
}

impl FakeLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Translators for `model_id` load fine but fail every inference call.
    pub fn with_failing_model(mut self, model_id: &str) -> Self {
        self.failing_models.insert(model_id.to_string());
        self
    }

    /// Loading `model_id` fails.
    pub fn with_unloadable_model(mut self, model_id: &str) -> Self {
        self.unloadable_models.insert(model_id.to_string());
        self
    }

    /// Translators for `model_id` return no candidates at all.
    pub fn with_silent_model(mut self, model_id: &str) -> Self {
        self.silent_models.insert(model_id.to_string());
        self
    }

    /// Translators for `model_id` return a single candidate with empty text.
    pub fn with_blank_model(mut self, model_id: &str) -> Self {
        self.blank_models.insert(model_id.to_string());
        self
    }

    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = Some(delay);
        self
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Inference calls made through any translator this loader produced.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelLoader for FakeLoader {
    async fn load(&self, model_id: &str) -> Result<Arc<dyn Translator>, ModelError> {
        if let Some(delay) = self.load_delay {
            tokio::time::sleep(delay).await;
        }
        self.loads.fetch_add(1, Ordering::SeqCst);

        if self.unloadable_models.contains(model_id) {
            return Err(ModelError::Load {
                model: model_id.to_string(),
                message: "weights not found".to_string(),
            });
        }

        let behavior = if self.failing_models.contains(model_id) {
            Behavior::Fail
        } else if self.silent_models.contains(model_id) {
            Behavior::NoCandidates
        } else if self.blank_models.contains(model_id) {
            Behavior::BlankText
        } else {
            Behavior::Tag
        };

        Ok(Arc::new(FakeTranslator {
            model_id: model_id.to_string(),
            behavior,
            calls: Arc::clone(&self.calls),
        }))
    }
}

#[derive(Debug, Clone, Copy)]
enum Behavior {
    Tag,
    Fail,
    NoCandidates,
    BlankText,
}

pub struct FakeTranslator {
    model_id: String,
    behavior: Behavior,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Translator for FakeTranslator {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn translate(
        &self,
        text: &str,
        codes: &ModelCodes,
    ) -> Result<Vec<TranslationCandidate>, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        match self.behavior {
            Behavior::Fail => Err(ModelError::Inference {
                model: self.model_id.clone(),
                message: "CUDA out of memory".to_string(),
            }),
            Behavior::NoCandidates => Ok(Vec::new()),
            Behavior::BlankText => Ok(vec![
                TranslationCandidate {
                    translation_text: String::new(),
                },
                TranslationCandidate {
                    translation_text: "second candidate".to_string(),
                },
            ]),
            Behavior::Tag => Ok(vec![
                TranslationCandidate {
                    translation_text: format!("[{}>{}] {}", codes.src_lang, codes.tgt_lang, text),
                },
                TranslationCandidate {
                    translation_text: "second candidate".to_string(),
                },
            ]),
        }
    }
}
