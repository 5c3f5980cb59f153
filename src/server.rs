//! HTTP surface: routes, CORS and JSON error bodies.

use crate::config::Config;
use crate::db::{MemoryStore, MessageStore, NewRawMessage, PgStore};
use crate::detect::{normalize_detected_code, LanguageDetector, LibreTranslateDetector};
use crate::fanout::{FanOutCoordinator, FanOutJob, FanOutQueue};
use crate::i18n::{LanguageRegistry, MetricsReport, TranslationMetrics};
use crate::models::{FilipinoModel, HttpModelLoader, ModelRegistry, FILIPINO_MODEL_ENV};
use crate::translation::Orchestrator;
use anyhow::{Context, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Shared state of the request handlers.
pub struct AppState {
    pub store: Arc<dyn MessageStore>,
    pub detector: Arc<dyn LanguageDetector>,
    pub orchestrator: Arc<Orchestrator>,
    pub fanout: FanOutQueue,
}

impl AppState {
    /// Wire the production collaborators and start the fan-out dispatcher.
    pub async fn from_config(config: &Config) -> Result<(Arc<Self>, JoinHandle<()>)> {
        let store: Arc<dyn MessageStore> = match &config.database_url {
            Some(url) => Arc::new(PgStore::connect(url).await?),
            None => {
                warn!("DATABASE_URL not set, messages are kept in memory only");
                Arc::new(MemoryStore::new())
            }
        };

        // No request timeout: cold model loads can take minutes
        let client = reqwest::Client::builder()
            .build()
            .context("Failed to build HTTP client")?;

        let loader = HttpModelLoader::new(
            client.clone(),
            &config.inference_api_url,
            config.inference_api_token.clone(),
        );
        let registry = Arc::new(ModelRegistry::new(Arc::new(loader)));
        let orchestrator = Arc::new(Orchestrator::new(registry));

        let detector = LibreTranslateDetector::new(
            client,
            &config.detector_url,
            config.detector_api_key.clone(),
        );

        let coordinator = Arc::new(FanOutCoordinator::new(
            Arc::clone(&orchestrator),
            Arc::clone(&store),
        ));
        let (fanout, dispatcher) = FanOutQueue::start(coordinator);

        let state = Arc::new(Self {
            store,
            detector: Arc::new(detector),
            orchestrator,
            fanout,
        });
        Ok((state, dispatcher))
    }
}

/// Error body returned to HTTP callers: `{"error": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(err: impl Display) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(format!("{:#}", err))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!("Request failed: {}", self.message);
        }
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

fn default_lang() -> String {
    "en".to_string()
}

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub text: String,
    #[serde(default = "default_lang")]
    pub target_lang: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendResponse {
    pub status: String,
    pub message: SentMessage,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SentMessage {
    pub id: String,
    pub original: String,
    pub source_lang: String,
    pub translation: String,
    pub target_lang: String,
    pub timestamp: String,
}

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    #[serde(default = "default_lang")]
    pub lang: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessagesResponse {
    pub messages: Vec<MessageView>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageView {
    pub id: String,
    pub original: String,
    pub source_lang: String,
    pub translation: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FilipinoModelInfo {
    /// Model a fresh resolution would pick right now
    pub current_model: String,
    /// Models actually being served, per direction (null until first use)
    pub loaded_models: BTreeMap<String, Option<String>>,
    pub available_models: BTreeMap<String, String>,
    pub environment_variable: String,
    pub usage: String,
}

#[derive(Debug, Deserialize)]
pub struct SwitchQuery {
    pub model_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SwitchResponse {
    pub message: String,
    pub new_model: String,
    pub restart_required: bool,
}

pub fn router(state: Arc<AppState>, cors_origins: &[String]) -> Result<Router> {
    Ok(Router::new()
        .route("/send", post(send_message))
        .route("/messages", get(list_messages))
        .route("/languages", get(list_languages))
        .route("/filipino-model", get(filipino_model_info))
        .route("/switch-filipino-model", post(switch_filipino_model))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .layer(cors_layer(cors_origins)?)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    let origins = origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin)
                .with_context(|| format!("Invalid CORS origin: {}", origin))
        })
        .collect::<Result<Vec<_>>>()?;

    // Credentials rule out wildcards, so mirror the request instead
    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request()))
}

async fn send_message(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SendRequest>, JsonRejection>,
) -> Result<Json<SendResponse>, ApiError> {
    let Json(request) = payload?;
    if request.text.trim().is_empty() {
        return Err(ApiError::bad_request("text must not be empty"));
    }
    let target_lang = request.target_lang.trim().to_lowercase();

    let detected = state
        .detector
        .detect(&request.text)
        .await
        .map_err(ApiError::internal)?;
    let source_lang = normalize_detected_code(&detected);

    let raw = state
        .store
        .insert_raw(NewRawMessage {
            original: request.text,
            source_lang,
            timestamp: Utc::now(),
        })
        .await?;

    let translation = state
        .orchestrator
        .immediate_translation(&raw.original, &raw.source_lang, &target_lang)
        .await;

    info!(
        "Message {} accepted ({} -> {})",
        raw.id, raw.source_lang, target_lang
    );

    state.fanout.enqueue(FanOutJob {
        message_id: raw.id.clone(),
        original: raw.original.clone(),
        source_lang: raw.source_lang.clone(),
        target_lang: target_lang.clone(),
        immediate_translation: translation.clone(),
    });

    Ok(Json(SendResponse {
        status: "ok".to_string(),
        message: SentMessage {
            id: raw.id,
            original: raw.original,
            source_lang: raw.source_lang,
            translation,
            target_lang,
            timestamp: raw.timestamp.to_rfc3339(),
        },
    }))
}

async fn list_messages(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MessagesQuery>,
) -> Result<Json<MessagesResponse>, ApiError> {
    let raw_messages = state.store.list_raw().await?;

    let mut messages = Vec::with_capacity(raw_messages.len());
    for raw in raw_messages {
        let translation = state
            .store
            .find_translation_set(&raw.id)
            .await?
            .and_then(|set| set.translations.get(&query.lang).cloned())
            .unwrap_or_else(|| raw.original.clone());

        messages.push(MessageView {
            id: raw.id,
            original: raw.original,
            source_lang: raw.source_lang,
            translation,
            timestamp: raw.timestamp.to_rfc3339(),
        });
    }

    Ok(Json(MessagesResponse { messages }))
}

async fn list_languages() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "languages": LanguageRegistry::get().codes() }))
}

async fn filipino_model_info(State(state): State<Arc<AppState>>) -> Json<FilipinoModelInfo> {
    let registry = state.orchestrator.registry();
    let loaded_models = [("en", "fil"), ("fil", "en")]
        .into_iter()
        .map(|(src, tgt)| (format!("{}-{}", src, tgt), registry.loaded_model(src, tgt)))
        .collect();

    Json(FilipinoModelInfo {
        current_model: FilipinoModel::from_env().model_id().to_string(),
        loaded_models,
        available_models: FilipinoModel::ALL
            .into_iter()
            .map(|model| (model.name().to_string(), model.model_id().to_string()))
            .collect(),
        environment_variable: FILIPINO_MODEL_ENV.to_string(),
        usage: format!(
            "Set {} environment variable to switch models (nllb, nllb-large, opus, opus-large); \
             loaded models change only after a restart",
            FILIPINO_MODEL_ENV
        ),
    })
}

async fn switch_filipino_model(
    Query(query): Query<SwitchQuery>,
) -> Result<Json<SwitchResponse>, ApiError> {
    let Some(model) = FilipinoModel::from_name(&query.model_name) else {
        let available: Vec<_> = FilipinoModel::ALL.iter().map(|m| m.name()).collect();
        return Err(ApiError::bad_request(format!(
            "Invalid model. Available: {:?}",
            available
        )));
    };

    // Nothing is applied here; the running process keeps its loaded models
    Ok(Json(SwitchResponse {
        message: format!(
            "Model will be switched to {} on next server restart",
            model.name()
        ),
        new_model: model.model_id().to_string(),
        restart_required: true,
    }))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn metrics() -> Json<MetricsReport> {
    Json(TranslationMetrics::global().report())
}

/// Bind the listener and serve until Ctrl-C.
pub async fn serve(config: &Config, state: Arc<AppState>) -> Result<()> {
    let app = router(state, &config.cors_origins)?;

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.port))?;
    info!("✓ Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            // Without a signal handler, run until the process is killed
            error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
