use anyhow::{Context, Result};

const DEFAULT_CORS_ORIGINS: &str = "http://localhost:3000,http://localhost:5173";

#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub port: u16,
    pub cors_origins: Vec<String>,

    // Database (in-memory store when unset)
    pub database_url: Option<String>,

    // Translation models
    pub inference_api_url: String,
    pub inference_api_token: Option<String>,

    // Language detection
    pub detector_url: String,
    pub detector_api_key: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            // Server
            port: match std::env::var("PORT") {
                Ok(port) => port.parse().context("PORT must be a valid port number")?,
                Err(_) => 8000,
            },
            cors_origins: parse_origins(
                &std::env::var("CORS_ORIGINS")
                    .unwrap_or_else(|_| DEFAULT_CORS_ORIGINS.to_string()),
            ),

            // Database
            database_url: non_empty_var("DATABASE_URL"),

            // Translation models
            inference_api_url: std::env::var("INFERENCE_API_URL")
                .unwrap_or_else(|_| "https://api-inference.huggingface.co".to_string()),
            inference_api_token: non_empty_var("INFERENCE_API_TOKEN"),

            // Language detection
            detector_url: std::env::var("DETECTOR_URL")
                .unwrap_or_else(|_| "http://localhost:5000".to_string()),
            detector_api_key: non_empty_var("DETECTOR_API_KEY"),
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Split a comma-separated origin list, dropping blanks.
fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
