//! Decision logic: probabilities → label via a one-sided threshold
//!
//! PNEUMONIA is chosen when its probability meets or exceeds the threshold,
//! otherwise NORMAL. This is not an argmax: a threshold above 0.5 biases
//! toward fewer PNEUMONIA calls.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::classes::{ClassIndex, Label};
use crate::errors::{EngineError, Result};

/// Cutoff the desktop tool has always shipped with
pub const DEFAULT_THRESHOLD: f32 = 0.85;

/// A decision threshold validated to lie in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
pub struct Threshold(f32);

impl Threshold {
    pub fn new(value: f32) -> Result<Self> {
        if (0.0..=1.0).contains(&value) {
            Ok(Self(value))
        } else {
            // NaN lands here too
            Err(EngineError::InvalidThreshold(value))
        }
    }

    pub fn value(&self) -> f32 {
        self.0
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self(DEFAULT_THRESHOLD)
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// Probability assigned to each class
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassProbabilities {
    #[serde(rename = "NORMAL")]
    pub normal: f32,
    #[serde(rename = "PNEUMONIA")]
    pub pneumonia: f32,
}

impl ClassProbabilities {
    /// Pick the two probabilities out of a softmax row using the cached indices
    pub fn from_distribution(distribution: &[f32], classes: &ClassIndex) -> Self {
        Self {
            normal: distribution[classes.index_of(Label::Normal)],
            pneumonia: distribution[classes.index_of(Label::Pneumonia)],
        }
    }

    pub fn get(&self, label: Label) -> f32 {
        match label {
            Label::Normal => self.normal,
            Label::Pneumonia => self.pneumonia,
        }
    }

    pub fn total(&self) -> f32 {
        self.normal + self.pneumonia
    }

    pub fn iter(&self) -> impl Iterator<Item = (Label, f32)> {
        [(Label::Normal, self.normal), (Label::Pneumonia, self.pneumonia)].into_iter()
    }
}

/// Outcome of one classification
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub label: Label,
    /// Probability of `label`, not necessarily of PNEUMONIA
    pub confidence: f32,
    #[serde(rename = "per_class_probability")]
    pub probabilities: ClassProbabilities,
}

/// Apply the threshold rule. The comparison is inclusive.
pub fn decide(probabilities: ClassProbabilities, threshold: Threshold) -> PredictionResult {
    let label = if probabilities.pneumonia >= threshold.value() {
        Label::Pneumonia
    } else {
        Label::Normal
    };

    PredictionResult {
        label,
        confidence: probabilities.get(label),
        probabilities,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probs(normal: f32, pneumonia: f32) -> ClassProbabilities {
        ClassProbabilities { normal, pneumonia }
    }

    #[test]
    fn test_threshold_validation() {
        assert!(Threshold::new(0.0).is_ok());
        assert!(Threshold::new(1.0).is_ok());
        assert!(matches!(Threshold::new(1.01), Err(EngineError::InvalidThreshold(_))));
        assert!(matches!(Threshold::new(-0.1), Err(EngineError::InvalidThreshold(_))));
        assert!(Threshold::new(f32::NAN).is_err());
        assert_eq!(Threshold::default().value(), 0.85);
    }

    #[test]
    fn test_scenario_from_desktop_tool() {
        let p = probs(0.10, 0.90);

        let result = decide(p, Threshold::new(0.85).unwrap());
        assert_eq!(result.label, Label::Pneumonia);
        assert!((result.confidence - 0.90).abs() < 1e-6);

        let result = decide(p, Threshold::new(0.95).unwrap());
        assert_eq!(result.label, Label::Normal);
        assert!((result.confidence - 0.10).abs() < 1e-6);
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let result = decide(probs(0.25, 0.75), Threshold::new(0.75).unwrap());
        assert_eq!(result.label, Label::Pneumonia);
    }

    #[test]
    fn test_not_an_argmax() {
        // PNEUMONIA is the larger class but below the cutoff
        let result = decide(probs(0.3, 0.7), Threshold::default());
        assert_eq!(result.label, Label::Normal);
        assert!((result.confidence - 0.3).abs() < 1e-6);

        // PNEUMONIA is the smaller class but meets a low cutoff
        let result = decide(probs(0.6, 0.4), Threshold::new(0.2).unwrap());
        assert_eq!(result.label, Label::Pneumonia);
    }

    #[test]
    fn test_threshold_monotonicity() {
        for &pneumonia in &[0.0f32, 0.13, 0.5, 0.85, 0.99, 1.0] {
            let p = probs(1.0 - pneumonia, pneumonia);
            let mut seen_normal = false;
            for step in 0..=100 {
                let threshold = Threshold::new(step as f32 / 100.0).unwrap();
                let label = decide(p, threshold).label;
                if seen_normal {
                    assert_eq!(label, Label::Normal, "flipped back at {}", threshold);
                }
                seen_normal |= label == Label::Normal;
            }
        }
    }

    #[test]
    fn test_from_distribution_uses_declared_order() {
        let classes = ClassIndex::from_names(&["PNEUMONIA", "NORMAL"]).unwrap();
        let p = ClassProbabilities::from_distribution(&[0.8, 0.2], &classes);
        assert_eq!(p.pneumonia, 0.8);
        assert_eq!(p.normal, 0.2);
    }

    #[test]
    fn test_result_serializes_class_names() {
        let result = decide(probs(0.1, 0.9), Threshold::default());
        let json = serde_json::to_value(result).unwrap();
        assert_eq!(json["label"], "PNEUMONIA");
        assert!(json["per_class_probability"]["NORMAL"].is_number());
    }
}
