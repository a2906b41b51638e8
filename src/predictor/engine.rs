//! Engine: device, current model slot, telemetry
//!
//! The slot holds an `Arc<LoadedModel>`. A reload builds the new model
//! completely before taking the write lock, and a prediction only holds the
//! read lock long enough to clone the `Arc`, so in-flight predictions finish
//! on the model they started with and never observe a half-loaded one.

use image::DynamicImage;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use crate::checkpoint::load_model;
use crate::device::DeviceSelection;
use crate::errors::{EngineError, Result};
use crate::model::LoadedModel;
use crate::predictor::decision::{PredictionResult, Threshold};
use crate::telemetry::{TelemetryCollector, TelemetryEvent};

pub struct Engine {
    device: DeviceSelection,
    current: RwLock<Option<Arc<LoadedModel>>>,
    telemetry: TelemetryCollector,
}

impl Engine {
    /// Create an engine with no model loaded
    pub fn new(device: DeviceSelection, telemetry: TelemetryCollector) -> Self {
        telemetry.record(TelemetryEvent::DeviceSelected {
            device: device.kind(),
            timestamp: Instant::now(),
        });
        Self {
            device,
            current: RwLock::new(None),
            telemetry,
        }
    }

    /// Engine on the best available device
    pub fn detect() -> Self {
        Self::new(DeviceSelection::detect(), TelemetryCollector::new())
    }

    /// Load a checkpoint and make it the current model.
    ///
    /// On failure the previously loaded model, if any, stays current.
    pub fn load_model(&self, path: &Path) -> Result<Arc<LoadedModel>> {
        let started = Instant::now();
        match load_model(path, &self.device) {
            Ok(model) => {
                let model = Arc::new(model);
                *self.current.write().unwrap_or_else(PoisonError::into_inner) =
                    Some(Arc::clone(&model));
                self.telemetry.record(TelemetryEvent::ModelLoaded {
                    path: path.display().to_string(),
                    device: self.device.kind(),
                    duration_ms: started.elapsed().as_millis() as u64,
                    timestamp: Instant::now(),
                });
                Ok(model)
            }
            Err(err) => {
                self.telemetry.record(TelemetryEvent::ModelLoadFailed {
                    path: path.display().to_string(),
                    reason: err.to_string(),
                    timestamp: Instant::now(),
                });
                Err(err)
            }
        }
    }

    /// Classify `image` with the current model
    pub fn predict(&self, image: &DynamicImage, threshold: f32) -> Result<PredictionResult> {
        let started = Instant::now();
        let outcome = Threshold::new(threshold).and_then(|threshold| {
            let model = self.current().ok_or(EngineError::ModelNotLoaded)?;
            model.predict(image, threshold)
        });

        match &outcome {
            Ok(result) => self.telemetry.record(TelemetryEvent::PredictionCompleted {
                label: result.label,
                confidence: result.confidence,
                duration_ms: started.elapsed().as_millis() as u64,
                timestamp: Instant::now(),
            }),
            Err(err) => self.telemetry.record(TelemetryEvent::PredictionFailed {
                reason: err.to_string(),
                timestamp: Instant::now(),
            }),
        }
        outcome
    }

    /// Handle to the current model, if one is loaded
    pub fn current(&self) -> Option<Arc<LoadedModel>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.current().is_some()
    }

    /// Drop the current model. Callers still holding a handle keep it alive.
    pub fn unload(&self) -> Option<Arc<LoadedModel>> {
        self.current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    pub fn device(&self) -> &DeviceSelection {
        &self.device
    }

    pub fn telemetry(&self) -> &TelemetryCollector {
        &self.telemetry
    }
}
