//! Checkpoint module
//!
//! A checkpoint is a single safetensors file: one tensor entry per network
//! parameter plus `classes` / `img_size` / `arch` in the header metadata.

pub mod header;
pub mod loader;
pub mod writer;

pub use header::{CheckpointHeader, DEFAULT_IMAGE_SIZE, MAX_IMAGE_SIZE};
pub use loader::{load_model, read_checkpoint, CheckpointContents};
pub use writer::{save_checkpoint, save_with_metadata};
