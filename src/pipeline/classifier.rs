use std::sync::atomic::{AtomicUsize, Ordering};

use ndarray::Array4;

use super::AnalysisError;
use crate::models::{ClassificationResult, NUM_CLASSES};

/// Pretrained scan classifier.
///
/// Loaded once at startup and shared read-only across requests. Output
/// position `i` is the probability of `DementiaClass::ALL[i]`.
pub trait Classifier: Send + Sync {
    fn predict(&self, input: &Array4<f32>) -> Result<[f32; NUM_CLASSES], AnalysisError>;
}

/// Run the classifier and fold its output into a `ClassificationResult`.
pub fn classify(
    classifier: &dyn Classifier,
    input: &Array4<f32>,
) -> Result<ClassificationResult, AnalysisError> {
    let probabilities = classifier.predict(input)?;
    if let Some(bad) = probabilities.iter().find(|p| !p.is_finite()) {
        return Err(AnalysisError::Inference(format!(
            "model produced non-finite probability {bad}"
        )));
    }
    Ok(ClassificationResult::from_probabilities(probabilities))
}

/// Copy a flat model output into the fixed label-aligned array.
pub fn probabilities_from_slice(values: &[f32]) -> Result<[f32; NUM_CLASSES], AnalysisError> {
    <[f32; NUM_CLASSES]>::try_from(values).map_err(|_| {
        AnalysisError::Inference(format!(
            "expected {NUM_CLASSES} class scores, model returned {}",
            values.len()
        ))
    })
}

// ═══════════════════════════════════════════════════════════
// ONNX classifier, behind the `onnx-runtime` feature
// ═══════════════════════════════════════════════════════════

#[cfg(feature = "onnx-runtime")]
mod onnx {
    use super::{probabilities_from_slice, AnalysisError, Array4, Classifier, NUM_CLASSES};
    use crate::config::ConfigError;
    use ort::session::Session;
    use std::path::Path;
    use std::sync::Mutex;

    /// Dementia classifier served by ONNX Runtime.
    ///
    /// Expects an NHWC float input `(1, size, size, 3)` and a single softmax
    /// output of four scores.
    ///
    /// `ort::Session::run` takes `&mut self`; the Mutex keeps the public
    /// handle immutable so it can sit in an `Arc<dyn Classifier>`.
    pub struct OnnxClassifier {
        session: Mutex<Session>,
    }

    impl OnnxClassifier {
        pub fn load(model_path: &Path) -> Result<Self, ConfigError> {
            if !model_path.exists() {
                return Err(ConfigError::ModelNotFound(model_path.to_path_buf()));
            }

            let session = Session::builder()
                .map_err(|e: ort::Error| ConfigError::ModelInit(e.to_string()))?
                .with_intra_threads(2)
                .map_err(|e: ort::Error| ConfigError::ModelInit(e.to_string()))?
                .commit_from_file(model_path)
                .map_err(|e: ort::Error| ConfigError::ModelInit(format!("ONNX load failed: {e}")))?;

            tracing::info!(path = %model_path.display(), "Classifier loaded");

            Ok(Self {
                session: Mutex::new(session),
            })
        }
    }

    impl Classifier for OnnxClassifier {
        fn predict(&self, input: &Array4<f32>) -> Result<[f32; NUM_CLASSES], AnalysisError> {
            use ort::value::TensorRef;

            let tensor = TensorRef::from_array_view(input)
                .map_err(|e| AnalysisError::Inference(e.to_string()))?;

            let mut session = self
                .session
                .lock()
                .map_err(|_| AnalysisError::Inference("Session lock poisoned".to_string()))?;

            let outputs = session
                .run(ort::inputs![tensor])
                .map_err(|e| AnalysisError::Inference(format!("ONNX inference failed: {e}")))?;

            // Output shape: [1, 4]
            let (_shape, scores) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| AnalysisError::Inference(format!("Output extraction: {e}")))?;

            probabilities_from_slice(scores)
        }
    }
}

#[cfg(feature = "onnx-runtime")]
pub use onnx::OnnxClassifier;

/// Mock classifier for testing. Returns fixed scores or fails.
pub struct MockClassifier {
    outcome: Result<[f32; NUM_CLASSES], String>,
    calls: AtomicUsize,
}

impl MockClassifier {
    pub fn new(probabilities: [f32; NUM_CLASSES]) -> Self {
        Self {
            outcome: Ok(probabilities),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            outcome: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of `predict` invocations so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Classifier for MockClassifier {
    fn predict(&self, _input: &Array4<f32>) -> Result<[f32; NUM_CLASSES], AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome
            .clone()
            .map_err(AnalysisError::Inference)
    }
}
