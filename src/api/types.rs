//! Shared API types: handler state and response bodies.

use serde::Serialize;

use crate::models::{ConfidenceMap, DementiaClass};
use crate::pipeline::{ScanAnalysis, ScanAnalyzer};

/// Shared state for all API endpoint handlers.
#[derive(Clone)]
pub struct ApiContext {
    pub analyzer: ScanAnalyzer,
}

impl ApiContext {
    pub fn new(analyzer: ScanAnalyzer) -> Self {
        Self { analyzer }
    }
}

/// Successful `/analyze` body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResponse {
    pub predicted_class: DementiaClass,
    pub confidences: ConfidenceMap,
    pub insights: String,
}

impl From<ScanAnalysis> for AnalysisResponse {
    fn from(analysis: ScanAnalysis) -> Self {
        Self {
            predicted_class: analysis.classification.predicted,
            confidences: analysis.classification.confidences,
            insights: analysis.insights,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ClassificationResult;

    #[test]
    fn success_body_uses_wire_names() {
        let response = AnalysisResponse::from(ScanAnalysis {
            classification: ClassificationResult::from_probabilities([0.0, 0.0, 1.0, 0.0]),
            insights: "All clear".into(),
        });
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["predictedClass"], "Non Demented");
        assert_eq!(json["insights"], "All clear");
        assert_eq!(json["confidences"]["Non Demented"], 1.0);
        assert_eq!(json["confidences"].as_object().unwrap().len(), 4);
        assert!(json.get("error").is_none());
    }
}
