use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

use crate::api::middleware::OriginPattern;

/// Application-level constants
pub const APP_NAME: &str = "MRI Analyzer";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Model identifier used for report generation unless `GEMINI_MODEL` overrides it.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_TIMEOUT_SECS: u64 = 120;

/// ONNX export of the pretrained dementia classifier.
pub const DEFAULT_MODEL_PATH: &str = "alzheimers_detection_model.onnx";

/// Square input edge the classifier was trained on.
pub const DEFAULT_MODEL_INPUT_SIZE: u32 = 224;

/// Largest accepted `MODEL_INPUT_SIZE`. The resized RGB buffer is size² × 3 bytes.
pub const MAX_MODEL_INPUT_SIZE: u32 = 4096;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";

/// Upload ceiling. Matches the limit the scan upload gateway enforces.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Frontend origins allowed to call the API with credentials.
/// `*` matches within a single host label (Vercel preview deployments).
pub const DEFAULT_ALLOWED_ORIGINS: &[&str] = &[
    "http://localhost:5173",
    "https://dementia-dreamscape-ui.vercel.app",
    "https://dementia-dreamscape-ui-*.vercel.app",
];

/// Default tracing filter when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "mri_analyzer_lib=info,tower_http=info,warn"
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("{name} has an invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Classifier model not found at {0}")]
    ModelNotFound(PathBuf),

    #[error("Classifier model failed to load: {0}")]
    ModelInit(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

/// Settings for the Gemini report generator.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

/// Everything the service reads from its environment at startup.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_addr: SocketAddr,
    pub model_path: PathBuf,
    pub model_input_size: u32,
    pub max_upload_bytes: usize,
    pub allowed_origins: Vec<String>,
    pub gemini: GeminiConfig,
}

impl ServiceConfig {
    /// Load from the process environment, reading `.env` first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenv::dotenv() {
            tracing::debug!(path = %path.display(), "Loaded .env file");
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let api_key = get("GEMINI_API_KEY").ok_or(ConfigError::Missing("GEMINI_API_KEY"))?;

        let bind_addr = match get("BIND_ADDR") {
            Some(raw) => parse_value("BIND_ADDR", &raw)?,
            None => parse_value("BIND_ADDR", DEFAULT_BIND_ADDR)?,
        };

        let model_input_size = match get("MODEL_INPUT_SIZE") {
            Some(raw) => parse_value::<u32>("MODEL_INPUT_SIZE", &raw)?,
            None => DEFAULT_MODEL_INPUT_SIZE,
        };
        check_range("MODEL_INPUT_SIZE", model_input_size, 1, MAX_MODEL_INPUT_SIZE)?;

        let max_upload_bytes = match get("MAX_UPLOAD_BYTES") {
            Some(raw) => parse_value("MAX_UPLOAD_BYTES", &raw)?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };
        check_range("MAX_UPLOAD_BYTES", max_upload_bytes, 1, usize::MAX)?;

        let timeout_secs = match get("GEMINI_TIMEOUT_SECS") {
            Some(raw) => parse_value("GEMINI_TIMEOUT_SECS", &raw)?,
            None => DEFAULT_GEMINI_TIMEOUT_SECS,
        };
        check_range("GEMINI_TIMEOUT_SECS", timeout_secs, 1, u64::MAX)?;

        let allowed_origins: Vec<String> = match get("CORS_ALLOWED_ORIGINS") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect(),
            None => DEFAULT_ALLOWED_ORIGINS.iter().map(|o| o.to_string()).collect(),
        };
        for origin in &allowed_origins {
            OriginPattern::parse(origin).map_err(|e| ConfigError::Invalid {
                name: "CORS_ALLOWED_ORIGINS",
                value: origin.clone(),
                reason: e.to_string(),
            })?;
        }

        Ok(Self {
            bind_addr,
            model_path: PathBuf::from(
                get("MODEL_PATH").unwrap_or_else(|| DEFAULT_MODEL_PATH.to_string()),
            ),
            model_input_size,
            max_upload_bytes,
            allowed_origins,
            gemini: GeminiConfig {
                api_key,
                model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
                base_url: get("GEMINI_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
                timeout_secs,
            },
        })
    }
}

fn parse_value<T>(name: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        name,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

fn check_range<T>(name: &'static str, value: T, min: T, max: T) -> Result<(), ConfigError>
where
    T: PartialOrd + std::fmt::Display,
{
    if value < min {
        return Err(ConfigError::Invalid {
            name,
            value: value.to_string(),
            reason: format!("must be at least {min}"),
        });
    }
    if value > max {
        return Err(ConfigError::Invalid {
            name,
            value: value.to_string(),
            reason: format!("must be at most {max}"),
        });
    }
    Ok(())
}
