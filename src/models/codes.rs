//! Language code adaptation for model families.

use crate::i18n::LanguageRegistry;

/// Marker substring identifying NLLB checkpoints in a model id.
const NLLB_MARKER: &str = "nllb";

/// Model families with different language code schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFamily {
    /// Multilingual NLLB models; expect FLORES-200 locale tags such as `tgl_Latn`
    Nllb,
    /// Pair-specific models (e.g. opus-mt); the domain code is passed through
    Generic,
}

impl ModelFamily {
    /// Detect the family of a loaded model from its identifier.
    pub fn from_model_id(model_id: &str) -> Self {
        if model_id.to_lowercase().contains(NLLB_MARKER) {
            ModelFamily::Nllb
        } else {
            ModelFamily::Generic
        }
    }
}

/// Convert a domain language code into the scheme expected by `family`.
///
/// Returns `None` when the family has no equivalent for the code.
pub fn to_model_code(language_code: &str, family: ModelFamily) -> Option<String> {
    match family {
        ModelFamily::Nllb => LanguageRegistry::get()
            .get_by_code(language_code)
            .map(|lang| lang.nllb_code.to_string()),
        ModelFamily::Generic => Some(language_code.to_string()),
    }
}
