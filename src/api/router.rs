//! Analysis API router.
//!
//! Layer stack (outermost → innermost): trace → CORS → body limit → handler.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::api::endpoints;
use crate::api::middleware::cors_layer;
use crate::api::types::ApiContext;
use crate::config::{ServiceConfig, DEFAULT_ALLOWED_ORIGINS, DEFAULT_MAX_UPLOAD_BYTES};

/// Transport-level knobs for the router.
#[derive(Debug, Clone)]
pub struct RouterSettings {
    pub max_upload_bytes: usize,
    pub allowed_origins: Vec<String>,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            allowed_origins: DEFAULT_ALLOWED_ORIGINS.iter().map(|o| o.to_string()).collect(),
        }
    }
}

impl From<&ServiceConfig> for RouterSettings {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            max_upload_bytes: config.max_upload_bytes,
            allowed_origins: config.allowed_origins.clone(),
        }
    }
}

/// Build the analysis router.
pub fn analysis_router(ctx: ApiContext, settings: &RouterSettings) -> Router {
    Router::new()
        .route("/analyze", post(endpoints::analyze::analyze))
        .route("/health", get(endpoints::health::check))
        .with_state(ctx)
        .layer(DefaultBodyLimit::max(settings.max_upload_bytes))
        .layer(cors_layer(&settings.allowed_origins))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}
