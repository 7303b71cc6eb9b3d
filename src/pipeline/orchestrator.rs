use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use super::classifier::{classify, Classifier};
use super::preprocess::ImagePreprocessor;
use super::report::{build_report_prompt, ReportGenerator};
use super::AnalysisError;
use crate::models::ClassificationResult;

/// Outcome of a full analysis: verdict plus narrative.
#[derive(Debug, Clone)]
pub struct ScanAnalysis {
    pub classification: ClassificationResult,
    pub insights: String,
}

/// Runs one upload through preprocess → classify → report.
///
/// Cheap to clone; every stage is shared behind an `Arc`.
#[derive(Clone)]
pub struct ScanAnalyzer {
    preprocessor: Arc<dyn ImagePreprocessor>,
    classifier: Arc<dyn Classifier>,
    reporter: Arc<dyn ReportGenerator>,
}

impl ScanAnalyzer {
    pub fn new(
        preprocessor: Arc<dyn ImagePreprocessor>,
        classifier: Arc<dyn Classifier>,
        reporter: Arc<dyn ReportGenerator>,
    ) -> Self {
        Self {
            preprocessor,
            classifier,
            reporter,
        }
    }

    /// Decode and classify on the blocking pool. Inference is CPU-bound and
    /// would otherwise stall the async workers.
    pub async fn classify_image(
        &self,
        image_bytes: Vec<u8>,
    ) -> Result<ClassificationResult, AnalysisError> {
        let preprocessor = Arc::clone(&self.preprocessor);
        let classifier = Arc::clone(&self.classifier);

        tokio::task::spawn_blocking(move || -> Result<ClassificationResult, AnalysisError> {
            let started = Instant::now();
            let tensor = preprocessor.preprocess(&image_bytes)?;
            let result = classify(classifier.as_ref(), &tensor)?;
            debug!(elapsed_ms = started.elapsed().as_millis() as u64, "Classification done");
            Ok(result)
        })
        .await
        .map_err(|e| AnalysisError::Inference(format!("classification task failed: {e}")))?
    }

    /// Full pipeline for one upload.
    pub async fn analyze(&self, image_bytes: Vec<u8>) -> Result<ScanAnalysis, AnalysisError> {
        let size = image_bytes.len();
        let classification = self.classify_image(image_bytes).await?;

        info!(
            size,
            predicted = %classification.predicted,
            confidence = classification.top_confidence(),
            "Scan classified"
        );

        let prompt = build_report_prompt(&classification);
        let started = Instant::now();
        let insights = self.reporter.generate(&prompt).await?;
        debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            chars = insights.len(),
            "Report generated"
        );

        Ok(ScanAnalysis {
            classification,
            insights,
        })
    }
}
