//! Translation metrics and observability module.
//!
//! Counts model loads, inference calls, soft failures of the orchestrator
//! and the outcome of background fan-outs.

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

/// Translation counters. The process-wide instance is `TranslationMetrics::global()`.
#[derive(Debug, Default)]
pub struct TranslationMetrics {
    /// Translator handles instantiated (cache misses in the model registry)
    model_loads: AtomicUsize,

    /// Calls made to a loaded translator
    inference_calls: AtomicUsize,

    /// Translator loads that raised an error
    load_failures: AtomicUsize,

    /// Translator calls that raised an error or produced no text
    inference_failures: AtomicUsize,

    /// Pairs with no configured model
    resolution_gaps: AtomicUsize,

    /// Pairs whose codes have no equivalent in the model's code scheme
    adaptation_gaps: AtomicUsize,

    /// Two-hop translations attempted through the pivot language
    pivot_attempts: AtomicUsize,

    /// Translations replaced by the original text
    original_fallbacks: AtomicUsize,

    /// Translation sets persisted
    fanouts_completed: AtomicUsize,

    /// Fan-outs that ended without persisting a translation set
    fanouts_failed: AtomicUsize,
}

static METRICS: OnceLock<TranslationMetrics> = OnceLock::new();

impl TranslationMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the global translation metrics instance.
    pub fn global() -> &'static TranslationMetrics {
        METRICS.get_or_init(TranslationMetrics::new)
    }

    pub fn record_model_load(&self) {
        self.model_loads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_inference_call(&self) {
        self.inference_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_load_failure(&self) {
        self.load_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_inference_failure(&self) {
        self.inference_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_resolution_gap(&self) {
        self.resolution_gaps.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_adaptation_gap(&self) {
        self.adaptation_gaps.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pivot_attempt(&self) {
        self.pivot_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_original_fallback(&self) {
        self.original_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fanout_completed(&self) {
        self.fanouts_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fanout_failed(&self) {
        self.fanouts_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Generate a metrics report.
    pub fn report(&self) -> MetricsReport {
        let inference_calls = self.inference_calls.load(Ordering::Relaxed);
        let inference_failures = self.inference_failures.load(Ordering::Relaxed);
        // Counters are read one at a time and may be momentarily out of step
        let inference_success_rate = if inference_calls > 0 {
            (inference_calls.saturating_sub(inference_failures) as f64 / inference_calls as f64)
                * 100.0
        } else {
            0.0
        };

        MetricsReport {
            model_loads: self.model_loads.load(Ordering::Relaxed),
            load_failures: self.load_failures.load(Ordering::Relaxed),
            inference_calls,
            inference_failures,
            inference_success_rate,
            resolution_gaps: self.resolution_gaps.load(Ordering::Relaxed),
            adaptation_gaps: self.adaptation_gaps.load(Ordering::Relaxed),
            pivot_attempts: self.pivot_attempts.load(Ordering::Relaxed),
            original_fallbacks: self.original_fallbacks.load(Ordering::Relaxed),
            fanouts_completed: self.fanouts_completed.load(Ordering::Relaxed),
            fanouts_failed: self.fanouts_failed.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of the translation counters.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    pub model_loads: usize,
    pub load_failures: usize,
    pub inference_calls: usize,
    pub inference_failures: usize,

    /// Inference success rate as a percentage (0-100)
    pub inference_success_rate: f64,

    pub resolution_gaps: usize,
    pub adaptation_gaps: usize,
    pub pivot_attempts: usize,
    pub original_fallbacks: usize,
    pub fanouts_completed: usize,
    pub fanouts_failed: usize,
}
