//! Error types for MedVision
//!
//! Every failure the engine can raise is one `EngineError` variant. Load-time
//! variants point at the deployment (checkpoint file, device), predict-time
//! variants point at the caller's input. Lower-level causes are kept as
//! `#[source]` so the whole chain is visible to the front-end.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the inference engine
#[derive(Error, Debug)]
pub enum EngineError {
    /// The checkpoint path does not resolve to an existing file
    #[error("Checkpoint not found at: {}", path.display())]
    CheckpointNotFound { path: PathBuf },

    /// The checkpoint exists but is structurally malformed
    #[error("Invalid checkpoint {}: {defect}", path.display())]
    InvalidCheckpoint {
        path: PathBuf,
        #[source]
        defect: CheckpointDefect,
    },

    /// The stored parameters do not fit the fixed architecture
    #[error(
        "Weight shape mismatch for `{parameter}`: architecture expects {}, checkpoint has {}",
        describe_shape(expected),
        describe_shape(found)
    )]
    WeightShapeMismatch {
        parameter: String,
        expected: Option<Vec<usize>>,
        found: Option<Vec<usize>>,
    },

    /// The image could not be decoded or has no pixels
    #[error("Invalid image input: {0}")]
    InvalidImageInput(#[source] ImageDefect),

    /// Decision threshold outside [0, 1]
    #[error("Threshold must be within [0, 1], got {0}")]
    InvalidThreshold(f32),

    /// Predict was called before a model was loaded
    #[error("No model loaded. Load a checkpoint first")]
    ModelNotLoaded,

    /// A forced device could not be initialised
    #[error("Device {device} is unavailable")]
    DeviceUnavailable {
        device: String,
        #[source]
        source: candle_core::Error,
    },

    /// Tensor backend failure during preprocessing or the forward pass
    #[error("Inference failed: {0}")]
    Inference(#[from] candle_core::Error),
}

/// What is wrong with a checkpoint file
#[derive(Error, Debug)]
pub enum CheckpointDefect {
    #[error("could not read file")]
    Io(#[source] std::io::Error),

    #[error("container could not be decoded")]
    Container(#[source] safetensors::SafeTensorError),

    #[error("tensor data could not be decoded")]
    Tensor(#[source] candle_core::Error),

    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("field `{field}` is malformed: {detail}")]
    MalformedField { field: &'static str, detail: String },

    #[error("expected classes NORMAL and PNEUMONIA, got {0:?}")]
    WrongClasses(Vec<String>),

    #[error("img_size must be between 1 and 4096, got {0}")]
    BadImageSize(i64),

    #[error("unsupported architecture `{0}`, expected efficientnet_b0")]
    UnsupportedArchitecture(String),
}

/// Why an image was rejected
#[derive(Error, Debug)]
pub enum ImageDefect {
    #[error("could not read image file")]
    Io(#[source] std::io::Error),

    #[error("could not decode image")]
    Decode(#[source] image::ImageError),

    #[error("image has no pixels ({width}x{height})")]
    Empty { width: u32, height: u32 },
}

fn describe_shape(shape: &Option<Vec<usize>>) -> String {
    match shape {
        Some(dims) => format!("{:?}", dims),
        None => "nothing".to_string(),
    }
}

impl EngineError {
    /// True when the caller can recover by changing its input
    /// (another image, another threshold, loading first).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            EngineError::InvalidImageInput(_)
                | EngineError::InvalidThreshold(_)
                | EngineError::ModelNotLoaded
        )
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
