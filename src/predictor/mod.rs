//! Predictor: threshold decision plus the engine that owns the loaded model

pub mod decision;
pub mod engine;

pub use decision::{decide, ClassProbabilities, PredictionResult, Threshold, DEFAULT_THRESHOLD};
pub use engine::Engine;
