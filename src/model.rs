//! A loaded, immutable classifier bound to one device

use candle_core::{Module, Tensor, D};
use image::DynamicImage;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::checkpoint::CheckpointHeader;
use crate::classes::ClassIndex;
use crate::device::DeviceSelection;
use crate::errors::Result;
use crate::predictor::decision::{decide, ClassProbabilities, PredictionResult, Threshold};
use crate::preprocess::Preprocessor;

/// Forward pass producing `(1, 2)` logits
pub type Classifier = Box<dyn Module + Send + Sync>;

/// Everything needed to classify an image. Never mutated after construction.
pub struct LoadedModel {
    classifier: Classifier,
    classes: ClassIndex,
    preprocessor: Preprocessor,
    device: DeviceSelection,
    source: PathBuf,
    parameter_count: usize,
    load_time: Duration,
}

impl LoadedModel {
    pub(crate) fn new(
        classifier: Classifier,
        header: CheckpointHeader,
        device: DeviceSelection,
        source: PathBuf,
        parameter_count: usize,
        load_time: Duration,
    ) -> Self {
        Self {
            classifier,
            classes: header.classes,
            preprocessor: Preprocessor::new(header.image_size),
            device,
            source,
            parameter_count,
            load_time,
        }
    }

    /// Run one image through preprocessing, the network, and the threshold rule
    pub fn predict(&self, image: &DynamicImage, threshold: Threshold) -> Result<PredictionResult> {
        let input = self
            .preprocessor
            .preprocess(image)?
            .to_device(self.device.device())?;
        let logits = self.classifier.forward(&input)?;
        let distribution = softmax_row(&logits)?;
        let probabilities = ClassProbabilities::from_distribution(&distribution, &self.classes);
        Ok(decide(probabilities, threshold))
    }

    pub fn classes(&self) -> &ClassIndex {
        &self.classes
    }

    pub fn image_size(&self) -> usize {
        self.preprocessor.image_size()
    }

    pub fn device(&self) -> &DeviceSelection {
        &self.device
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn parameter_count(&self) -> usize {
        self.parameter_count
    }

    pub fn load_time(&self) -> Duration {
        self.load_time
    }
}

impl fmt::Debug for LoadedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedModel")
            .field("classes", &self.classes)
            .field("image_size", &self.image_size())
            .field("device", &self.device.kind())
            .field("source", &self.source)
            .finish()
    }
}

/// Stable softmax over the class axis of a single-row batch.
///
/// candle's softmax subtracts the row maximum before exponentiating.
fn softmax_row(logits: &Tensor) -> Result<Vec<f32>> {
    let probabilities = candle_nn::ops::softmax(logits, D::Minus1)?;
    let row = probabilities.squeeze(0)?.to_device(&candle_core::Device::Cpu)?;
    Ok(row.to_vec1::<f32>()?)
}
