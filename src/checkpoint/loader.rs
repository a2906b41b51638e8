//! Checkpoint loading: file → validated header → materialised classifier

use candle_core::{DType, Device, Tensor};
use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use crate::architecture;
use crate::checkpoint::header::CheckpointHeader;
use crate::device::DeviceSelection;
use crate::errors::{CheckpointDefect, EngineError, Result};
use crate::model::LoadedModel;

/// Bookkeeping entries torchvision writes for batch norm; not parameters
const IGNORED_SUFFIX: &str = "num_batches_tracked";

/// Raw contents of a checkpoint file after structural validation
pub struct CheckpointContents {
    pub header: CheckpointHeader,
    pub weights: HashMap<String, Tensor>,
}

/// Read and validate a checkpoint without building the network
pub fn read_checkpoint(path: &Path) -> Result<CheckpointContents> {
    if !path.is_file() {
        return Err(EngineError::CheckpointNotFound {
            path: path.to_path_buf(),
        });
    }

    let invalid = |defect| EngineError::InvalidCheckpoint {
        path: path.to_path_buf(),
        defect,
    };

    let buffer = std::fs::read(path).map_err(|e| invalid(CheckpointDefect::Io(e)))?;

    let (_, metadata) = safetensors::SafeTensors::read_metadata(&buffer)
        .map_err(|e| invalid(CheckpointDefect::Container(e)))?;
    let header = CheckpointHeader::from_metadata(metadata.metadata().as_ref()).map_err(invalid)?;

    let weights = candle_core::safetensors::load_buffer(&buffer, &Device::Cpu)
        .map_err(|e| invalid(CheckpointDefect::Tensor(e)))?;
    if weights.is_empty() {
        return Err(invalid(CheckpointDefect::MissingField("state_dict")));
    }

    Ok(CheckpointContents { header, weights })
}

/// Load a checkpoint and bind the classifier to `device`.
///
/// The network is first built with random weights, then every parameter is
/// overwritten from the file. Missing, extra, or differently shaped
/// parameters fail with `WeightShapeMismatch`. candle layers have no
/// training mode, so the result is already in inference mode (batch norm
/// uses running statistics, no dropout).
pub fn load_model(path: &Path, device: &DeviceSelection) -> Result<LoadedModel> {
    let started = Instant::now();
    let CheckpointContents {
        header,
        mut weights,
    } = read_checkpoint(path)?;

    let init = architecture::initialize(device.device())?;
    for (name, var) in init.variables()? {
        let stored = weights
            .remove(&name)
            .ok_or_else(|| EngineError::WeightShapeMismatch {
                parameter: name.clone(),
                expected: Some(var.dims().to_vec()),
                found: None,
            })?;
        if stored.dims() != var.dims() {
            return Err(EngineError::WeightShapeMismatch {
                parameter: name,
                expected: Some(var.dims().to_vec()),
                found: Some(stored.dims().to_vec()),
            });
        }
        var.set(&stored.to_dtype(DType::F32)?.to_device(device.device())?)?;
    }

    let mut unexpected: Vec<_> = weights
        .into_iter()
        .filter(|(name, _)| !name.ends_with(IGNORED_SUFFIX))
        .collect();
    unexpected.sort_by(|a, b| a.0.cmp(&b.0));
    if let Some((name, tensor)) = unexpected.into_iter().next() {
        return Err(EngineError::WeightShapeMismatch {
            parameter: name,
            expected: None,
            found: Some(tensor.dims().to_vec()),
        });
    }

    let parameter_count = init.parameter_count()?;
    Ok(LoadedModel::new(
        Box::new(init.network),
        header,
        device.clone(),
        path.to_path_buf(),
        parameter_count,
        started.elapsed(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::writer::save_checkpoint;
    use crate::classes::ClassIndex;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file() {
        let err = read_checkpoint(Path::new("/definitely/not/here.safetensors")).err().unwrap();
        assert!(matches!(err, EngineError::CheckpointNotFound { .. }));
    }

    #[test]
    fn test_directory_is_not_a_checkpoint() {
        let dir = TempDir::new().unwrap();
        let err = read_checkpoint(dir.path()).err().unwrap();
        assert!(matches!(err, EngineError::CheckpointNotFound { .. }));
    }

    #[test]
    fn test_garbage_file_is_invalid_with_cause() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("garbage.safetensors");
        std::fs::write(&path, b"this is not a checkpoint").unwrap();

        let err = read_checkpoint(&path).err().unwrap();
        match err {
            EngineError::InvalidCheckpoint {
                defect: CheckpointDefect::Container(_),
                ..
            } => {}
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_empty_weights_is_invalid() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.safetensors");
        let header = CheckpointHeader::new(
            ClassIndex::from_names(&["NORMAL", "PNEUMONIA"]).unwrap(),
            224,
        );
        let weights: HashMap<String, Tensor> = HashMap::new();
        save_checkpoint(&path, &weights, &header).unwrap();

        let err = read_checkpoint(&path).err().unwrap();
        assert!(matches!(
            err,
            EngineError::InvalidCheckpoint {
                defect: CheckpointDefect::MissingField("state_dict"),
                ..
            }
        ));
    }

    #[test]
    fn test_partial_weights_are_a_shape_mismatch() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("partial.safetensors");
        let header = CheckpointHeader::new(
            ClassIndex::from_names(&["NORMAL", "PNEUMONIA"]).unwrap(),
            32,
        );
        let mut weights = HashMap::new();
        weights.insert(
            "classifier.1.bias".to_string(),
            Tensor::zeros(2, DType::F32, &Device::Cpu).unwrap(),
        );
        save_checkpoint(&path, &weights, &header).unwrap();

        let err = load_model(&path, &DeviceSelection::cpu()).err().unwrap();
        match err {
            EngineError::WeightShapeMismatch { found: None, .. } => {}
            other => panic!("unexpected: {:?}", other),
        }
    }
}
