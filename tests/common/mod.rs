//! Shared fixtures: random-weight checkpoints and synthetic X-rays

#![allow(dead_code)]

use candle_core::Device;
use image::{DynamicImage, GrayImage, Luma};
use medvision::architecture;
use medvision::checkpoint::{save_checkpoint, save_with_metadata, CheckpointHeader};
use medvision::classes::ClassIndex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Small resolution keeps the CPU forward pass fast
pub const TEST_IMAGE_SIZE: usize = 32;

/// Write a randomly initialised two-class checkpoint
pub fn write_checkpoint(dir: &Path, name: &str, classes: [&str; 2]) -> PathBuf {
    let path = dir.join(name);
    let init = architecture::initialize(&Device::Cpu).unwrap();
    let header = CheckpointHeader::new(ClassIndex::from_names(&classes).unwrap(), TEST_IMAGE_SIZE);
    save_checkpoint(&path, &init.weights().unwrap(), &header).unwrap();
    path
}

/// Write a checkpoint whose head has `nclasses` outputs
pub fn write_checkpoint_with_head(dir: &Path, name: &str, nclasses: usize) -> PathBuf {
    let path = dir.join(name);
    let init = architecture::initialize_with_head(&Device::Cpu, nclasses).unwrap();
    let header = CheckpointHeader::new(
        ClassIndex::from_names(&["NORMAL", "PNEUMONIA"]).unwrap(),
        TEST_IMAGE_SIZE,
    );
    save_checkpoint(&path, &init.weights().unwrap(), &header).unwrap();
    path
}

/// Write valid weights under a hand-written metadata map
pub fn write_checkpoint_with_metadata(
    dir: &Path,
    name: &str,
    metadata: &[(&str, &str)],
) -> PathBuf {
    let path = dir.join(name);
    let init = architecture::initialize(&Device::Cpu).unwrap();
    let metadata: HashMap<String, String> = metadata
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    save_with_metadata(&path, &init.weights().unwrap(), metadata).unwrap();
    path
}

/// Grayscale radial gradient, bright in the middle
pub fn synthetic_xray(width: u32, height: u32) -> DynamicImage {
    let (cx, cy) = (width as f32 / 2.0, height as f32 / 2.0);
    DynamicImage::ImageLuma8(GrayImage::from_fn(width, height, |x, y| {
        let dx = (x as f32 - cx) / cx;
        let dy = (y as f32 - cy) / cy;
        let v = (1.0 - (dx * dx + dy * dy).sqrt()).clamp(0.0, 1.0);
        Luma([(v * 220.0) as u8 + 20])
    }))
}
