pub mod api;
pub mod config;
pub mod models;
pub mod pipeline;

use std::process::ExitCode;
use std::sync::Arc;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::api::{analysis_router, start_server, ApiContext, RouterSettings};
use crate::config::{ConfigError, ServiceConfig};
use crate::pipeline::{
    Classifier, GeminiClient, ModelInputConfig, ScanAnalyzer, TensorPreprocessor,
};

/// Fatal startup or runtime failure of the service process.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to build async runtime: {0}")]
    Runtime(#[from] std::io::Error),

    #[error("{0}")]
    Server(String),
}

/// Process entry point used by the binary.
pub fn run() -> ExitCode {
    init_tracing();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    match try_run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init();
}

fn try_run() -> Result<(), StartupError> {
    let config = ServiceConfig::from_env()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(serve(config))
}

async fn serve(config: ServiceConfig) -> Result<(), StartupError> {
    let analyzer = build_analyzer(&config)?;
    let app = analysis_router(ApiContext::new(analyzer), &RouterSettings::from(&config));

    let mut server = start_server(config.bind_addr, app)
        .await
        .map_err(StartupError::Server)?;

    tracing::info!(addr = %server.addr, "Ready for scans");

    shutdown_signal().await;
    server.shutdown();
    server.stopped().await;
    Ok(())
}

/// Wire the production pipeline from configuration.
///
/// Fails if the model artifact is missing or unloadable, or if the HTTP
/// client for report generation cannot be built.
pub fn build_analyzer(config: &ServiceConfig) -> Result<ScanAnalyzer, ConfigError> {
    let classifier = load_classifier(config)?;
    let reporter = GeminiClient::new(&config.gemini)?;
    let preprocessor = TensorPreprocessor::new(ModelInputConfig {
        target_size: config.model_input_size,
    });

    tracing::info!(
        model = %config.model_path.display(),
        input_size = preprocessor.target_size(),
        gemini_model = reporter.model(),
        "Analysis pipeline assembled"
    );

    Ok(ScanAnalyzer::new(
        Arc::new(preprocessor),
        classifier,
        Arc::new(reporter),
    ))
}

#[cfg(feature = "onnx-runtime")]
fn load_classifier(config: &ServiceConfig) -> Result<Arc<dyn Classifier>, ConfigError> {
    let classifier = pipeline::OnnxClassifier::load(&config.model_path)?;
    Ok(Arc::new(classifier))
}

#[cfg(not(feature = "onnx-runtime"))]
fn load_classifier(_config: &ServiceConfig) -> Result<Arc<dyn Classifier>, ConfigError> {
    Err(ConfigError::ModelInit(
        "built without the onnx-runtime feature".to_string(),
    ))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown requested");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_model(path: &str) -> ServiceConfig {
        let path = path.to_string();
        ServiceConfig::from_lookup(move |name| match name {
            "GEMINI_API_KEY" => Some("test-key".into()),
            "MODEL_PATH" => Some(path.clone()),
            _ => None,
        })
        .unwrap()
    }

    #[test]
    fn missing_model_fails_startup() {
        let config = config_with_model("/nonexistent/alzheimers_detection_model.onnx");
        let err = build_analyzer(&config).err().unwrap();

        #[cfg(feature = "onnx-runtime")]
        assert!(matches!(err, ConfigError::ModelNotFound(_)));
        #[cfg(not(feature = "onnx-runtime"))]
        assert!(matches!(err, ConfigError::ModelInit(_)));
    }

    #[test]
    fn startup_error_wraps_config_error() {
        let err = StartupError::from(ConfigError::Missing("GEMINI_API_KEY"));
        assert_eq!(err.to_string(), "GEMINI_API_KEY is not set");
    }
}
