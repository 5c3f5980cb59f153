//! Language-pair to model resolution and the translator handle cache.

use super::{ModelError, ModelLoader, Translator};
use crate::i18n::TranslationMetrics;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Environment variable selecting the model for the Filipino pair.
pub const FILIPINO_MODEL_ENV: &str = "FILIPINO_MODEL";

/// Static model table for every pair except the Filipino one.
const STATIC_MODELS: &[(&str, &str, &str)] = &[
    ("en", "ja", "Helsinki-NLP/opus-mt-en-jap"),
    ("ja", "en", "Helsinki-NLP/opus-mt-jap-en"),
    ("en", "zh", "Helsinki-NLP/opus-mt-en-zh"),
    ("zh", "en", "Helsinki-NLP/opus-mt-zh-en"),
    ("en", "ko", "facebook/nllb-200-distilled-600M"),
    ("ko", "en", "facebook/nllb-200-distilled-600M"),
    ("en", "pag", "Helsinki-NLP/opus-mt-en-pag"),
    ("pag", "en", "Helsinki-NLP/opus-mt-pag-en"),
    ("en", "ilo", "Helsinki-NLP/opus-mt-en-ilo"),
    ("ilo", "en", "Helsinki-NLP/opus-mt-ilo-en"),
    ("en", "ceb", "Helsinki-NLP/opus-mt-en-ceb"),
    ("ceb", "en", "Helsinki-NLP/opus-mt-ceb-en"),
];

/// Alternatives for the Filipino pair, selected through `FILIPINO_MODEL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilipinoModel {
    #[default]
    Nllb,
    NllbLarge,
    Opus,
    OpusLarge,
}

impl FilipinoModel {
    pub const ALL: [FilipinoModel; 4] = [
        FilipinoModel::Nllb,
        FilipinoModel::NllbLarge,
        FilipinoModel::Opus,
        FilipinoModel::OpusLarge,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FilipinoModel::Nllb => "nllb",
            FilipinoModel::NllbLarge => "nllb-large",
            FilipinoModel::Opus => "opus",
            FilipinoModel::OpusLarge => "opus-large",
        }
    }

    pub fn model_id(self) -> &'static str {
        match self {
            FilipinoModel::Nllb => "facebook/nllb-200-distilled-600M",
            FilipinoModel::NllbLarge => "facebook/nllb-200-3.3B",
            // There is no larger opus-mt checkpoint for Tagalog
            FilipinoModel::Opus | FilipinoModel::OpusLarge => "Helsinki-NLP/opus-mt-en-tl",
        }
    }

    /// Case-insensitive lookup by alternative name.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_lowercase();
        Self::ALL.into_iter().find(|model| model.name() == name)
    }

    /// Current selection; unset or unrecognized values fall back to the default.
    pub fn from_env() -> Self {
        std::env::var(FILIPINO_MODEL_ENV)
            .ok()
            .and_then(|value| Self::from_name(&value))
            .unwrap_or_default()
    }
}

fn is_filipino_pair(source: &str, target: &str) -> bool {
    matches!((source, target), ("en", "fil") | ("fil", "en"))
}

/// Resolve the model identifier for a language pair.
///
/// The Filipino pair re-reads `FILIPINO_MODEL` on every call.
pub fn resolve(source: &str, target: &str) -> Option<&'static str> {
    if is_filipino_pair(source, target) {
        return Some(FilipinoModel::from_env().model_id());
    }

    STATIC_MODELS
        .iter()
        .find(|(src, tgt, _)| *src == source && *tgt == target)
        .map(|(_, _, model)| *model)
}

type LanguagePair = (String, String);

/// Lazily loads and caches one translator per language pair.
///
/// Handles are keyed by pair, not by model id, and are never evicted: a
/// change of `FILIPINO_MODEL` only affects pairs that have not been loaded
/// yet, so switching models takes effect on the next process start.
pub struct ModelRegistry {
    loader: Arc<dyn ModelLoader>,
    translators: Mutex<HashMap<LanguagePair, Arc<OnceCell<Arc<dyn Translator>>>>>,
}

impl ModelRegistry {
    pub fn new(loader: Arc<dyn ModelLoader>) -> Self {
        Self {
            loader,
            translators: Mutex::new(HashMap::new()),
        }
    }

    /// Get the translator for a pair, loading it on first use.
    ///
    /// Returns `Ok(None)` when no model is configured for the pair. Concurrent
    /// first calls for one pair share a single load; a failed load is not
    /// cached.
    pub async fn get_translator(
        &self,
        source: &str,
        target: &str,
    ) -> Result<Option<Arc<dyn Translator>>, ModelError> {
        let Some(model_id) = resolve(source, target) else {
            debug!("No model configured for {} -> {}", source, target);
            return Ok(None);
        };

        let cell = {
            let mut translators = self
                .translators
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            Arc::clone(
                translators
                    .entry((source.to_string(), target.to_string()))
                    .or_default(),
            )
        };

        let translator = cell
            .get_or_try_init(|| async {
                info!("Loading model for {} -> {}: {}", source, target, model_id);
                let translator = self.loader.load(model_id).await?;
                TranslationMetrics::global().record_model_load();
                Ok::<_, ModelError>(translator)
            })
            .await?;

        Ok(Some(Arc::clone(translator)))
    }

    /// Model id of the handle currently cached for a pair, if any.
    pub fn loaded_model(&self, source: &str, target: &str) -> Option<String> {
        let translators = self
            .translators
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        translators
            .get(&(source.to_string(), target.to_string()))
            .and_then(|cell| cell.get())
            .map(|translator| translator.model_id().to_string())
    }
}
