//! Language metadata and translation observability.
//!
//! - `registry`: the fixed set of supported languages and their metadata
//! - `metrics`: process-wide translation counters
//!
//! # Example
//!
//! ```rust,ignore
//! use crate::i18n::LanguageRegistry;
//!
//! for lang in LanguageRegistry::get().list() {
//!     println!("{} -> {}", lang.code, lang.nllb_code);
//! }
//! ```

mod metrics;
mod registry;

pub use metrics::{MetricsReport, TranslationMetrics};
pub use registry::{LanguageConfig, LanguageRegistry, PIVOT_CODE};
