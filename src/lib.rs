//! MedVision v0.1.0 - Chest X-ray Pneumonia Screening
//!
//! Loads an EfficientNet-B0 checkpoint, preprocesses chest X-rays exactly as
//! at training time, and labels them NORMAL or PNEUMONIA with a one-sided
//! probability threshold.
//!
//! # Architecture
//!
//! - **Checkpoint**: safetensors container → validated header + weights
//! - **Model**: fixed architecture bound to one compute device
//! - **Predictor**: preprocessing, forward pass, threshold decision, reload-safe engine
//! - **Front-end**: CLI, interactive session, doctor, telemetry

// Inference engine
pub mod errors;
pub mod classes;
pub mod device;
pub mod architecture;
pub mod checkpoint;
pub mod preprocess;
pub mod model;
pub mod predictor;

// Re-export commonly used types
pub use classes::Label;
pub use device::{ComputeDevice, DeviceSelection};
pub use errors::{EngineError, Result};
pub use model::LoadedModel;
pub use predictor::{Engine, PredictionResult, Threshold};

// Terminal front-end
pub mod cli;
pub mod display;
pub mod doctor;
pub mod repl;
pub mod telemetry;

use image::DynamicImage;
use std::path::Path;

/// Load a checkpoint onto `device` and return an explicit model handle
pub fn load_model(path: &Path, device: &DeviceSelection) -> Result<LoadedModel> {
    checkpoint::load_model(path, device)
}

/// Classify `image` with a loaded model handle.
///
/// `None` stands for "nothing loaded yet" and fails with `ModelNotLoaded`.
pub fn predict(
    model: Option<&LoadedModel>,
    image: &DynamicImage,
    threshold: f32,
) -> Result<PredictionResult> {
    let threshold = Threshold::new(threshold)?;
    let model = model.ok_or(EngineError::ModelNotLoaded)?;
    model.predict(image, threshold)
}
