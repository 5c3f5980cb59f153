//! Translation model plumbing.
//!
//! - `registry`: language pair to model resolution and the per-pair handle cache
//! - `codes`: model family detection and language code adaptation
//! - `inference`: translator handles and the HTTP inference backend

mod codes;
mod inference;
mod registry;

#[cfg(test)]
pub(crate) mod testing;

pub use codes::{to_model_code, ModelFamily};
pub use inference::{
    HttpModelLoader, HttpTranslator, ModelCodes, ModelError, ModelLoader, TranslationCandidate,
    Translator,
};
pub use registry::{resolve, FilipinoModel, ModelRegistry, FILIPINO_MODEL_ENV};
