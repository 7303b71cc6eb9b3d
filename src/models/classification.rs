use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use super::enums::{DementiaClass, NUM_CLASSES};

/// Per-class probabilities, stored positionally in `DementiaClass::ALL` order.
///
/// Serializes as a JSON object keyed by display label, in label order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceMap([f64; NUM_CLASSES]);

impl ConfidenceMap {
    pub fn get(&self, class: DementiaClass) -> f64 {
        self.0[class.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (DementiaClass, f64)> + '_ {
        DementiaClass::ALL.iter().copied().zip(self.0.iter().copied())
    }
}

impl Serialize for ConfidenceMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(NUM_CLASSES))?;
        for (class, value) in self.iter() {
            map.serialize_entry(class.as_str(), &value)?;
        }
        map.end()
    }
}

/// Classifier verdict for one scan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassificationResult {
    pub predicted: DementiaClass,
    pub confidences: ConfidenceMap,
}

impl ClassificationResult {
    /// Build from raw model output. Predicted class is the first maximum.
    ///
    /// Callers must have rejected non-finite values already.
    pub fn from_probabilities(probabilities: [f32; NUM_CLASSES]) -> Self {
        let mut best = 0;
        for (i, &p) in probabilities.iter().enumerate().skip(1) {
            if p > probabilities[best] {
                best = i;
            }
        }

        let confidences = ConfidenceMap(probabilities.map(f64::from));
        let predicted = DementiaClass::ALL[best];

        Self {
            predicted,
            confidences,
        }
    }

    /// Confidence of the predicted class, in [0, 1].
    pub fn top_confidence(&self) -> f64 {
        self.confidences.get(self.predicted)
    }
}
