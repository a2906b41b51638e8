//! Checkpoint metadata schema
//!
//! The safetensors `__metadata__` map is string-to-string. Values are parsed
//! into a typed header eagerly so a malformed file fails at load time with a
//! named defect rather than later during inference.

use std::collections::HashMap;

use crate::architecture::ARCHITECTURE;
use crate::classes::ClassIndex;
use crate::errors::CheckpointDefect;

pub const CLASSES_KEY: &str = "classes";
pub const IMG_SIZE_KEY: &str = "img_size";
pub const ARCH_KEY: &str = "arch";

/// Spatial resolution assumed when a checkpoint does not declare one
pub const DEFAULT_IMAGE_SIZE: usize = 224;

/// Largest accepted `img_size`
pub const MAX_IMAGE_SIZE: usize = 4096;

/// Validated checkpoint metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointHeader {
    pub classes: ClassIndex,
    pub image_size: usize,
}

impl CheckpointHeader {
    pub fn new(classes: ClassIndex, image_size: usize) -> Self {
        Self {
            classes,
            image_size,
        }
    }

    /// Parse and validate the raw metadata map
    pub fn from_metadata(
        metadata: Option<&HashMap<String, String>>,
    ) -> Result<Self, CheckpointDefect> {
        let metadata = metadata.ok_or(CheckpointDefect::MissingField(CLASSES_KEY))?;

        if let Some(arch) = metadata.get(ARCH_KEY) {
            if arch != ARCHITECTURE {
                return Err(CheckpointDefect::UnsupportedArchitecture(arch.clone()));
            }
        }

        let image_size = match metadata.get(IMG_SIZE_KEY) {
            None => DEFAULT_IMAGE_SIZE,
            Some(raw) => parse_image_size(raw)?,
        };

        let raw_classes = metadata
            .get(CLASSES_KEY)
            .ok_or(CheckpointDefect::MissingField(CLASSES_KEY))?;
        let names: Vec<String> =
            serde_json::from_str(raw_classes).map_err(|e| CheckpointDefect::MalformedField {
                field: CLASSES_KEY,
                detail: e.to_string(),
            })?;
        let classes = ClassIndex::from_names(&names)?;

        Ok(Self {
            classes,
            image_size,
        })
    }

    /// Render back into the string map stored in the container
    pub fn to_metadata(&self) -> HashMap<String, String> {
        let mut metadata = HashMap::new();
        // A Vec<String> always serializes
        let classes = serde_json::to_string(&self.classes.names()).unwrap_or_default();
        metadata.insert(CLASSES_KEY.to_string(), classes);
        metadata.insert(IMG_SIZE_KEY.to_string(), self.image_size.to_string());
        metadata.insert(ARCH_KEY.to_string(), ARCHITECTURE.to_string());
        metadata
    }
}

fn parse_image_size(raw: &str) -> Result<usize, CheckpointDefect> {
    let value: i64 = raw
        .trim()
        .parse()
        .map_err(|_| CheckpointDefect::MalformedField {
            field: IMG_SIZE_KEY,
            detail: format!("`{}` is not an integer", raw),
        })?;
    match usize::try_from(value) {
        Ok(size) if (1..=MAX_IMAGE_SIZE).contains(&size) => Ok(size),
        _ => Err(CheckpointDefect::BadImageSize(value)),
    }
}
