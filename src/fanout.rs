//! Background translation of a message into every supported language.

use crate::db::{MessageStore, TranslationSet};
use crate::i18n::{LanguageRegistry, TranslationMetrics};
use crate::translation::Orchestrator;
use anyhow::{Context, Result};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{error, info};

/// Everything the fan-out needs about one accepted message.
#[derive(Debug, Clone)]
pub struct FanOutJob {
    pub message_id: String,
    pub original: String,
    pub source_lang: String,
    pub target_lang: String,
    /// Translation already returned to the sender; reused verbatim
    pub immediate_translation: String,
}

pub struct FanOutCoordinator {
    orchestrator: Arc<Orchestrator>,
    store: Arc<dyn MessageStore>,
}

impl FanOutCoordinator {
    pub fn new(orchestrator: Arc<Orchestrator>, store: Arc<dyn MessageStore>) -> Self {
        Self {
            orchestrator,
            store,
        }
    }

    /// Compute one entry per supported language.
    ///
    /// The source language keeps the original text and the requested target
    /// keeps the immediate translation; neither is sent to a model.
    pub async fn translate_all(&self, job: &FanOutJob) -> BTreeMap<String, String> {
        let mut translations = BTreeMap::new();

        for lang in LanguageRegistry::get().list() {
            let text = if lang.code == job.source_lang {
                job.original.clone()
            } else if lang.code == job.target_lang {
                job.immediate_translation.clone()
            } else {
                self.orchestrator
                    .translate_or_original(&job.original, &job.source_lang, lang.code)
                    .await
            };
            translations.insert(lang.code.to_string(), text);
        }

        translations
    }

    /// Translate and persist the complete set with a single write.
    pub async fn run(&self, job: FanOutJob) -> Result<TranslationSet> {
        info!(
            "Fanning out message {} ({} -> all)",
            job.message_id, job.source_lang
        );

        let set = TranslationSet {
            message_id: job.message_id.clone(),
            translations: self.translate_all(&job).await,
            timestamp: Utc::now(),
        };

        let metrics = TranslationMetrics::global();
        match self
            .store
            .insert_translation_set(&set)
            .await
            .with_context(|| format!("Failed to persist translations for {}", job.message_id))
        {
            Ok(()) => {
                metrics.record_fanout_completed();
                info!(
                    "✓ Stored {} translations for {}",
                    set.translations.len(),
                    set.message_id
                );
                Ok(set)
            }
            Err(e) => {
                metrics.record_fanout_failed();
                Err(e)
            }
        }
    }
}

/// Hands fan-out jobs to a dispatcher that runs each one as its own task.
///
/// Enqueueing never waits on translation work, and a slow or failing job
/// never holds up another.
#[derive(Clone)]
pub struct FanOutQueue {
    sender: mpsc::UnboundedSender<FanOutJob>,
}

impl FanOutQueue {
    /// Spawn the dispatcher.
    ///
    /// Once every queue handle is dropped the dispatcher waits for the
    /// fan-outs already running, then stops.
    pub fn start(coordinator: Arc<FanOutCoordinator>) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let dispatcher = tokio::spawn(dispatch(receiver, coordinator));
        (Self { sender }, dispatcher)
    }

    pub fn enqueue(&self, job: FanOutJob) {
        let message_id = job.message_id.clone();
        if self.sender.send(job).is_err() {
            error!(
                "Fan-out dispatcher is not running, translations for {} will not be stored",
                message_id
            );
            TranslationMetrics::global().record_fanout_failed();
        }
    }
}

async fn dispatch(
    mut receiver: mpsc::UnboundedReceiver<FanOutJob>,
    coordinator: Arc<FanOutCoordinator>,
) {
    let mut running = JoinSet::new();

    loop {
        tokio::select! {
            job = receiver.recv() => match job {
                Some(job) => {
                    running.spawn(run_job(Arc::clone(&coordinator), job));
                }
                None => break,
            },
            Some(finished) = running.join_next(), if !running.is_empty() => {
                report_task_exit(finished);
            }
        }
    }

    if !running.is_empty() {
        info!("Waiting for {} fan-outs to finish", running.len());
    }
    while let Some(finished) = running.join_next().await {
        report_task_exit(finished);
    }

    info!("Fan-out dispatcher stopped");
}

async fn run_job(coordinator: Arc<FanOutCoordinator>, job: FanOutJob) {
    let message_id = job.message_id.clone();
    if let Err(e) = coordinator.run(job).await {
        error!("Background translation failed for {}: {:#}", message_id, e);
    }
}

fn report_task_exit(finished: Result<(), JoinError>) {
    if let Err(e) = finished {
        error!("Fan-out task ended abnormally: {}", e);
        TranslationMetrics::global().record_fanout_failed();
    }
}
