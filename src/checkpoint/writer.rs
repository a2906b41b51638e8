//! Checkpoint writer
//!
//! Produces the same container the loader consumes. Used by tooling that
//! converts trained weights and by tests that need a checkpoint on disk.

use anyhow::{Context, Result};
use candle_core::{DType, Tensor};
use safetensors::{Dtype, View};
use std::borrow::Cow;
use std::collections::HashMap;
use std::path::Path;

use crate::checkpoint::header::CheckpointHeader;

/// Little-endian F32 buffer in the layout safetensors expects
struct F32Buffer {
    shape: Vec<usize>,
    bytes: Vec<u8>,
}

impl F32Buffer {
    fn from_tensor(tensor: &Tensor) -> candle_core::Result<Self> {
        let values = tensor
            .to_dtype(DType::F32)?
            .flatten_all()?
            .to_vec1::<f32>()?;
        Ok(Self {
            shape: tensor.dims().to_vec(),
            bytes: values.iter().flat_map(|v| v.to_le_bytes()).collect(),
        })
    }
}

impl View for F32Buffer {
    fn dtype(&self) -> Dtype {
        Dtype::F32
    }

    fn shape(&self) -> &[usize] {
        &self.shape
    }

    fn data(&self) -> Cow<[u8]> {
        Cow::Borrowed(&self.bytes)
    }

    fn data_len(&self) -> usize {
        self.bytes.len()
    }
}

/// Write `weights` and `header` as a single safetensors checkpoint
pub fn save_checkpoint<'a, I>(path: &Path, weights: I, header: &CheckpointHeader) -> Result<()>
where
    I: IntoIterator<Item = (&'a String, &'a Tensor)>,
{
    save_with_metadata(path, weights, header.to_metadata())
}

/// Write tensors with an arbitrary header map, unvalidated
pub fn save_with_metadata<'a, I>(
    path: &Path,
    weights: I,
    metadata: HashMap<String, String>,
) -> Result<()>
where
    I: IntoIterator<Item = (&'a String, &'a Tensor)>,
{
    let mut buffers = Vec::new();
    for (name, tensor) in weights {
        let buffer = F32Buffer::from_tensor(tensor)
            .with_context(|| format!("Failed to convert parameter {}", name))?;
        buffers.push((name.clone(), buffer));
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).context("Failed to create checkpoint directory")?;
        }
    }

    safetensors::serialize_to_file(buffers, &Some(metadata), path)
        .with_context(|| format!("Failed to write checkpoint {}", path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::loader::read_checkpoint;
    use crate::classes::{ClassIndex, Label};
    use candle_core::Device;
    use tempfile::TempDir;

    #[test]
    fn test_written_checkpoint_reads_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("tiny.safetensors");
        let header = CheckpointHeader::new(
            ClassIndex::from_names(&["PNEUMONIA", "NORMAL"]).unwrap(),
            48,
        );
        let mut weights = HashMap::new();
        weights.insert(
            "classifier.1.bias".to_string(),
            Tensor::new(&[0.25f32, -0.5], &Device::Cpu).unwrap(),
        );

        save_checkpoint(&path, &weights, &header).unwrap();
        let contents = read_checkpoint(&path).unwrap();

        assert_eq!(contents.header.image_size, 48);
        assert_eq!(contents.header.classes.index_of(Label::Pneumonia), 0);
        let bias = contents.weights["classifier.1.bias"].to_vec1::<f32>().unwrap();
        assert_eq!(bias, vec![0.25, -0.5]);
    }
}
