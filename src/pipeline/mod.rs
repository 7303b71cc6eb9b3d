//! Scan analysis pipeline: decode → classify → report.
//!
//! Each stage sits behind a trait so the HTTP layer can be exercised with
//! mocks; production wiring lives in `lib::run`.

pub mod classifier;
pub mod orchestrator;
pub mod preprocess;
pub mod report;

pub use classifier::*;
pub use orchestrator::*;
pub use preprocess::*;
pub use report::*;

use thiserror::Error;

/// Failure of one analysis request, tagged by the stage that failed.
///
/// All variants reach the client as the same `{ "error": msg }` body; the
/// tag is kept for logs and library callers.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Model inference failed: {0}")]
    Inference(String),

    #[error("Report generation failed: {0}")]
    ExternalService(String),
}

impl AnalysisError {
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisError::Decode(_) => "decode",
            AnalysisError::Inference(_) => "inference",
            AnalysisError::ExternalService(_) => "external_service",
        }
    }
}
