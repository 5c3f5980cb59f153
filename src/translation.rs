use crate::i18n::{TranslationMetrics, PIVOT_CODE};
use crate::models::{to_model_code, ModelCodes, ModelError, ModelFamily, ModelRegistry};
use std::sync::Arc;
use tracing::{debug, warn};

/// Adapt a language pair to the code scheme of `family`.
///
/// Returns `None` if either side has no equivalent; raw codes are never used
/// as a substitute.
fn adapt_codes(family: ModelFamily, source: &str, target: &str) -> Option<ModelCodes> {
    Some(ModelCodes {
        src_lang: to_model_code(source, family)?,
        tgt_lang: to_model_code(target, family)?,
    })
}

/// Resolves translators and applies the pivot-through-English fallback.
///
/// The same fallback policy serves the immediate path and the background
/// fan-out, so a language pair always degrades the same way.
pub struct Orchestrator {
    registry: Arc<ModelRegistry>,
}

impl Orchestrator {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Translate `text` with the model configured for `source -> target`.
    ///
    /// * `Ok(Some(text))` - first candidate produced by the model
    /// * `Ok(None)` - no model for the pair, or a code has no equivalent in
    ///   the model's scheme
    /// * `Err` - the model failed to load, failed to run, or produced no text
    pub async fn translate_pair(
        &self,
        text: &str,
        source: &str,
        target: &str,
    ) -> Result<Option<String>, ModelError> {
        let metrics = TranslationMetrics::global();

        let Some(translator) = self.registry.get_translator(source, target).await? else {
            metrics.record_resolution_gap();
            return Ok(None);
        };

        let family = ModelFamily::from_model_id(translator.model_id());
        let Some(codes) = adapt_codes(family, source, target) else {
            warn!(
                "No {:?} code mapping for {} -> {} ({})",
                family,
                source,
                target,
                translator.model_id()
            );
            metrics.record_adaptation_gap();
            return Ok(None);
        };

        metrics.record_inference_call();
        let candidates = translator.translate(text, &codes).await?;

        // An empty text counts as no output, so the fallbacks still apply
        candidates
            .into_iter()
            .next()
            .map(|candidate| candidate.translation_text)
            .filter(|translated| !translated.trim().is_empty())
            .map(Some)
            .ok_or_else(|| ModelError::EmptyOutput {
                model: translator.model_id().to_string(),
            })
    }

    /// `translate_pair` with errors logged and downgraded to `None`.
    async fn attempt(&self, text: &str, source: &str, target: &str) -> Option<String> {
        match self.translate_pair(text, source, target).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Translation {} -> {} failed: {}", source, target, e);
                let metrics = TranslationMetrics::global();
                match e {
                    ModelError::Load { .. } => metrics.record_load_failure(),
                    _ => metrics.record_inference_failure(),
                }
                None
            }
        }
    }

    /// Translate directly, or through the pivot language when the direct pair
    /// yields nothing and neither side is the pivot.
    pub async fn translate_with_pivot(
        &self,
        text: &str,
        source: &str,
        target: &str,
    ) -> Option<String> {
        if let Some(direct) = self.attempt(text, source, target).await {
            return Some(direct);
        }

        if source == PIVOT_CODE || target == PIVOT_CODE {
            return None;
        }

        debug!("Pivoting {} -> {} through {}", source, target, PIVOT_CODE);
        TranslationMetrics::global().record_pivot_attempt();

        let pivot = self.attempt(text, source, PIVOT_CODE).await?;
        self.attempt(&pivot, PIVOT_CODE, target).await
    }

    /// `translate_with_pivot`, substituting the original text on total failure.
    pub async fn translate_or_original(&self, text: &str, source: &str, target: &str) -> String {
        match self.translate_with_pivot(text, source, target).await {
            Some(translated) => translated,
            None => {
                debug!(
                    "No translation for {} -> {}, keeping original text",
                    source, target
                );
                TranslationMetrics::global().record_original_fallback();
                text.to_string()
            }
        }
    }

    /// Translation returned synchronously to the sender.
    ///
    /// No inference is issued when the target is the source language.
    pub async fn immediate_translation(&self, text: &str, source: &str, target: &str) -> String {
        if source == target {
            return text.to_string();
        }

        self.translate_or_original(text, source, target).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::testing::FakeLoader;

    fn orchestrator_with(loader: FakeLoader) -> (Arc<FakeLoader>, Orchestrator) {
        let loader = Arc::new(loader);
        let registry = Arc::new(ModelRegistry::new(loader.clone()));
        (loader, Orchestrator::new(registry))
    }

    // ==================== adapt_codes Tests ====================

    #[test]
    fn test_adapt_codes_nllb() {
        let codes = adapt_codes(ModelFamily::Nllb, "fil", "en").expect("both mapped");
        assert_eq!(codes.src_lang, "tgl_Latn");
        assert_eq!(codes.tgt_lang, "eng_Latn");
    }

    #[test]
    fn test_adapt_codes_nllb_gap() {
        assert!(adapt_codes(ModelFamily::Nllb, "tl", "en").is_none());
        assert!(adapt_codes(ModelFamily::Nllb, "en", "fr").is_none());
    }

    #[test]
    fn test_adapt_codes_generic_passthrough() {
        let codes = adapt_codes(ModelFamily::Generic, "ceb", "en").expect("passthrough");
        assert_eq!(codes.src_lang, "ceb");
        assert_eq!(codes.tgt_lang, "en");
    }

    // ==================== translate_pair Tests ====================

    #[tokio::test]
    async fn test_translate_pair_uses_first_candidate() {
        let (_, orchestrator) = orchestrator_with(FakeLoader::new());

        let result = orchestrator.translate_pair("Hello", "en", "ceb").await.unwrap();
        assert_eq!(result.as_deref(), Some("[en>ceb] Hello"));
    }

    #[tokio::test]
    async fn test_translate_pair_adapts_codes_for_nllb() {
        let (_, orchestrator) = orchestrator_with(FakeLoader::new());

        let result = orchestrator.translate_pair("Hello", "en", "ko").await.unwrap();
        assert_eq!(result.as_deref(), Some("[eng_Latn>kor_Hang] Hello"));
    }

    #[tokio::test]
    async fn test_translate_pair_is_deterministic() {
        let (loader, orchestrator) = orchestrator_with(FakeLoader::new());

        let first = orchestrator.translate_pair("Good night", "zh", "en").await.unwrap();
        let second = orchestrator.translate_pair("Good night", "zh", "en").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(loader.loads(), 1);
        assert_eq!(loader.calls(), 2);
    }

    #[tokio::test]
    async fn test_translate_pair_unconfigured_is_none() {
        let (loader, orchestrator) = orchestrator_with(FakeLoader::new());

        let result = orchestrator.translate_pair("Hello", "ceb", "ilo").await.unwrap();
        assert_eq!(result, None);
        assert_eq!(loader.loads(), 0);
    }

    #[tokio::test]
    async fn test_translate_pair_propagates_model_errors() {
        let (_, orchestrator) = orchestrator_with(
            FakeLoader::new().with_failing_model("Helsinki-NLP/opus-mt-en-zh"),
        );

        let result = orchestrator.translate_pair("Hello", "en", "zh").await;
        assert!(matches!(result, Err(ModelError::Inference { .. })));
    }

    #[tokio::test]
    async fn test_translate_pair_load_failure_is_error() {
        let (_, orchestrator) = orchestrator_with(
            FakeLoader::new().with_unloadable_model("Helsinki-NLP/opus-mt-en-ilo"),
        );

        let result = orchestrator.translate_pair("Hello", "en", "ilo").await;
        assert!(matches!(result, Err(ModelError::Load { .. })));
    }

    // ==================== Fallback Policy Tests ====================

    #[tokio::test]
    async fn test_pivot_used_when_direct_pair_missing() {
        let (_, orchestrator) = orchestrator_with(FakeLoader::new());

        let result = orchestrator
            .translate_with_pivot("Maayong buntag", "ceb", "ko")
            .await;

        assert_eq!(
            result.as_deref(),
            Some("[eng_Latn>kor_Hang] [ceb>en] Maayong buntag")
        );
    }

    #[tokio::test]
    async fn test_no_pivot_when_target_is_english() {
        let (loader, orchestrator) = orchestrator_with(
            FakeLoader::new().with_failing_model("Helsinki-NLP/opus-mt-jap-en"),
        );

        let result = orchestrator.translate_with_pivot("こんにちは", "ja", "en").await;

        assert_eq!(result, None);
        assert_eq!(loader.calls(), 1);
    }

    #[tokio::test]
    async fn test_no_pivot_when_source_is_english() {
        let (loader, orchestrator) = orchestrator_with(FakeLoader::new());

        let result = orchestrator.translate_with_pivot("Hello", "en", "fr").await;

        assert_eq!(result, None);
        assert_eq!(loader.loads(), 0);
    }

    #[tokio::test]
    async fn test_pivot_stops_when_first_leg_fails() {
        let (loader, orchestrator) = orchestrator_with(
            FakeLoader::new().with_failing_model("Helsinki-NLP/opus-mt-pag-en"),
        );

        let result = orchestrator.translate_with_pivot("Hello", "pag", "ja").await;

        assert_eq!(result, None);
        // pag -> en was tried, en -> ja never loaded
        assert_eq!(loader.loads(), 1);
    }

    #[tokio::test]
    async fn test_pivot_second_leg_missing() {
        let (_, orchestrator) = orchestrator_with(FakeLoader::new());

        let result = orchestrator.translate_with_pivot("Hello", "ceb", "xx").await;
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_translate_or_original_substitutes_original() {
        let (_, orchestrator) = orchestrator_with(
            FakeLoader::new().with_failing_model("Helsinki-NLP/opus-mt-ilo-en"),
        );

        let result = orchestrator
            .translate_or_original("Naimbag nga bigat", "ilo", "zh")
            .await;
        assert_eq!(result, "Naimbag nga bigat");
    }

    #[tokio::test]
    async fn test_load_failure_counted_separately() {
        let (_, orchestrator) = orchestrator_with(
            FakeLoader::new().with_unloadable_model("Helsinki-NLP/opus-mt-en-pag"),
        );
        let before = TranslationMetrics::global().report().load_failures;

        let result = orchestrator.translate_or_original("Hello", "en", "pag").await;

        assert_eq!(result, "Hello");
        assert!(TranslationMetrics::global().report().load_failures > before);
    }

    // ==================== Empty Output Tests ====================

    #[tokio::test]
    async fn test_translate_pair_blank_text_is_empty_output() {
        let (_, orchestrator) =
            orchestrator_with(FakeLoader::new().with_blank_model("Helsinki-NLP/opus-mt-en-ceb"));

        let result = orchestrator.translate_pair("Hello", "en", "ceb").await;
        assert!(matches!(result, Err(ModelError::EmptyOutput { .. })));
    }

    #[tokio::test]
    async fn test_translate_pair_no_candidates_is_empty_output() {
        let (_, orchestrator) =
            orchestrator_with(FakeLoader::new().with_silent_model("Helsinki-NLP/opus-mt-en-ceb"));

        let result = orchestrator.translate_pair("Hello", "en", "ceb").await;
        assert!(matches!(result, Err(ModelError::EmptyOutput { .. })));
    }

    #[tokio::test]
    async fn test_immediate_translation_blank_output_keeps_original() {
        let (_, orchestrator) =
            orchestrator_with(FakeLoader::new().with_blank_model("Helsinki-NLP/opus-mt-ceb-en"));

        let result = orchestrator
            .immediate_translation("Maayong buntag", "ceb", "en")
            .await;
        assert_eq!(result, "Maayong buntag");
    }

    #[tokio::test]
    async fn test_pivot_stops_after_blank_first_leg() {
        let (loader, orchestrator) =
            orchestrator_with(FakeLoader::new().with_blank_model("Helsinki-NLP/opus-mt-ceb-en"));

        let result = orchestrator
            .translate_or_original("Maayong buntag", "ceb", "ko")
            .await;

        assert_eq!(result, "Maayong buntag");
        // en -> ko is never asked to translate an empty string
        assert_eq!(loader.loads(), 1);
        assert_eq!(loader.calls(), 1);
    }

    #[tokio::test]
    async fn test_pivot_second_leg_without_candidates_keeps_original() {
        let (loader, orchestrator) =
            orchestrator_with(FakeLoader::new().with_silent_model("Helsinki-NLP/opus-mt-en-zh"));

        let result = orchestrator
            .translate_or_original("Naimbag nga bigat", "ilo", "zh")
            .await;

        assert_eq!(result, "Naimbag nga bigat");
        assert_eq!(loader.calls(), 2);
    }

    // ==================== immediate_translation Tests ====================

    #[tokio::test]
    async fn test_immediate_translation_same_language_skips_inference() {
        let (loader, orchestrator) = orchestrator_with(FakeLoader::new());

        let result = orchestrator
            .immediate_translation("Kumusta ka?", "fil", "fil")
            .await;

        assert_eq!(result, "Kumusta ka?");
        assert_eq!(loader.loads(), 0);
        assert_eq!(loader.calls(), 0);
    }

    #[tokio::test]
    async fn test_immediate_translation_translates() {
        let (_, orchestrator) = orchestrator_with(FakeLoader::new());

        let result = orchestrator.immediate_translation("Hello", "en", "ja").await;
        assert_eq!(result, "[en>ja] Hello");
    }
}
