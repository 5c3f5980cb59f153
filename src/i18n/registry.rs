//! Language registry: Single source of truth for all supported languages.
//!
//! Every message is fanned out to each language listed here, in this order.
//! The registry is a lazily initialized singleton backed by `OnceLock`.
//! Two-hop translations always go through `PIVOT_CODE`.

use std::sync::OnceLock;

/// Code of the pivot language used for two-hop translations.
pub const PIVOT_CODE: &str = "en";

/// Configuration for a supported language.
#[derive(Debug, Clone)]
pub struct LanguageConfig {
    /// Domain language code (e.g., "en", "fil", "ceb")
    pub code: &'static str,

    /// FLORES-200 locale tag expected by NLLB models (e.g., "tgl_Latn")
    pub nllb_code: &'static str,
}

/// Global language registry singleton.
pub struct LanguageRegistry {
    languages: Vec<LanguageConfig>,
}

static REGISTRY: OnceLock<LanguageRegistry> = OnceLock::new();

impl LanguageRegistry {
    /// Get the global language registry instance.
    pub fn get() -> &'static LanguageRegistry {
        REGISTRY.get_or_init(|| LanguageRegistry {
            languages: default_languages(),
        })
    }

    /// Get a language configuration by its code.
    ///
    /// # Returns
    /// * `Some(&LanguageConfig)` if the language is supported
    /// * `None` otherwise
    pub fn get_by_code(&self, code: &str) -> Option<&LanguageConfig> {
        self.languages.iter().find(|lang| lang.code == code)
    }

    /// All supported languages, in fan-out order.
    pub fn list(&self) -> &[LanguageConfig] {
        &self.languages
    }

    /// All supported language codes, in fan-out order.
    pub fn codes(&self) -> Vec<&'static str> {
        self.languages.iter().map(|lang| lang.code).collect()
    }
}

fn default_languages() -> Vec<LanguageConfig> {
    vec![
        LanguageConfig {
            code: "en",
            nllb_code: "eng_Latn",
        },
        LanguageConfig {
            code: "fil",
            nllb_code: "tgl_Latn",
        },
        LanguageConfig {
            code: "ceb",
            nllb_code: "ceb_Latn",
        },
        LanguageConfig {
            code: "ilo",
            nllb_code: "ilo_Latn",
        },
        LanguageConfig {
            code: "pag",
            nllb_code: "pag_Latn",
        },
        LanguageConfig {
            code: "zh",
            // Use "zho_Hant" for Traditional
            nllb_code: "zho_Hans",
        },
        LanguageConfig {
            code: "ja",
            nllb_code: "jpn_Jpan",
        },
        LanguageConfig {
            code: "ko",
            nllb_code: "kor_Hang",
        },
    ]
}
