//! Image decoding and the fixed preprocessing pipeline
//!
//! The pipeline must reproduce the training transform exactly: RGB, upright,
//! square resize without aspect preservation, [0, 1] scaling, ImageNet
//! normalisation, batch dimension of one.

use candle_core::{DType, Device, Tensor};
use image::imageops::FilterType;
use image::{DynamicImage, ImageDecoder, ImageReader};
use std::io::Cursor;
use std::path::Path;

use crate::errors::{EngineError, ImageDefect, Result};

/// Per-channel mean of the backbone's pretraining data
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// Per-channel standard deviation of the backbone's pretraining data
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Antialiased bilinear, matching the resize used at training time
const RESIZE_FILTER: FilterType = FilterType::Triangle;

/// Decode an encoded image and apply its EXIF orientation
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    let decode = |e| EngineError::InvalidImageInput(ImageDefect::Decode(e));

    let mut decoder = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| EngineError::InvalidImageInput(ImageDefect::Io(e)))?
        .into_decoder()
        .map_err(decode)?;
    let orientation = decoder.orientation().map_err(decode)?;
    let mut image = DynamicImage::from_decoder(decoder).map_err(decode)?;
    image.apply_orientation(orientation);

    Ok(image)
}

/// Read and decode an image file
pub fn open_image(path: &Path) -> Result<DynamicImage> {
    let bytes =
        std::fs::read(path).map_err(|e| EngineError::InvalidImageInput(ImageDefect::Io(e)))?;
    decode_image(&bytes)
}

/// The fixed transform for one spatial resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preprocessor {
    image_size: usize,
}

impl Preprocessor {
    pub fn new(image_size: usize) -> Self {
        Self { image_size }
    }

    pub fn image_size(&self) -> usize {
        self.image_size
    }

    /// Turn an image into a `(1, 3, size, size)` F32 tensor on the CPU
    pub fn preprocess(&self, image: &DynamicImage) -> Result<Tensor> {
        if image.width() == 0 || image.height() == 0 {
            return Err(EngineError::InvalidImageInput(ImageDefect::Empty {
                width: image.width(),
                height: image.height(),
            }));
        }

        let size = self.image_size as u32;
        let rgb = image.to_rgb8();
        let resized = image::imageops::resize(&rgb, size, size, RESIZE_FILTER);
        let pixels = resized.into_raw();

        let device = Device::Cpu;
        let data = Tensor::from_vec(pixels, (self.image_size, self.image_size, 3), &device)?
            .permute((2, 0, 1))?;
        let mean = Tensor::new(&IMAGENET_MEAN, &device)?.reshape((3, 1, 1))?;
        let std = Tensor::new(&IMAGENET_STD, &device)?.reshape((3, 1, 1))?;

        let normalized = (data.to_dtype(DType::F32)? / 255.)?
            .broadcast_sub(&mean)?
            .broadcast_div(&std)?;

        Ok(normalized.unsqueeze(0)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::png::PngEncoder;
    use image::{ExtendedColorType, GrayImage, ImageEncoder, Luma, Rgb, RgbImage, RgbaImage};

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 7 % 256) as u8, (y * 5 % 256) as u8, ((x + y) % 256) as u8])
        }))
    }

    #[test]
    fn test_output_shape_ignores_aspect_ratio() {
        let tensor = Preprocessor::new(32).preprocess(&gradient(120, 40)).unwrap();
        assert_eq!(tensor.dims(), &[1, 3, 32, 32]);
        assert_eq!(tensor.dtype(), DType::F32);
    }

    #[test]
    fn test_normalization_constants() {
        let white = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([255, 255, 255])));
        let tensor = Preprocessor::new(4).preprocess(&white).unwrap();
        let values = tensor.squeeze(0).unwrap().to_vec3::<f32>().unwrap();
        for c in 0..3 {
            let expected = (1.0 - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
            assert!((values[c][0][0] - expected).abs() < 1e-5);
        }

        let black = DynamicImage::ImageRgb8(RgbImage::new(8, 8));
        let tensor = Preprocessor::new(4).preprocess(&black).unwrap();
        let values = tensor.squeeze(0).unwrap().to_vec3::<f32>().unwrap();
        assert!((values[0][2][2] - (-0.485 / 0.229)).abs() < 1e-5);
    }

    #[test]
    fn test_grayscale_and_alpha_become_three_channels() {
        let gray = DynamicImage::ImageLuma8(GrayImage::from_pixel(10, 10, Luma([128])));
        let tensor = Preprocessor::new(8).preprocess(&gray).unwrap();
        assert_eq!(tensor.dims(), &[1, 3, 8, 8]);

        let rgba = DynamicImage::ImageRgba8(RgbaImage::new(10, 10));
        let tensor = Preprocessor::new(8).preprocess(&rgba).unwrap();
        assert_eq!(tensor.dims(), &[1, 3, 8, 8]);
    }

    #[test]
    fn test_deterministic() {
        let image = gradient(97, 131);
        let preprocessor = Preprocessor::new(32);
        let a = preprocessor.preprocess(&image).unwrap().flatten_all().unwrap();
        let b = preprocessor.preprocess(&image).unwrap().flatten_all().unwrap();
        assert_eq!(a.to_vec1::<f32>().unwrap(), b.to_vec1::<f32>().unwrap());
    }

    #[test]
    fn test_empty_image_rejected() {
        let empty = DynamicImage::ImageRgb8(RgbImage::new(0, 0));
        let err = Preprocessor::new(32).preprocess(&empty).unwrap_err();
        assert!(matches!(err, EngineError::InvalidImageInput(ImageDefect::Empty { .. })));
    }

    #[test]
    fn test_decode_rejects_non_image_bytes() {
        let err = decode_image(b"definitely not a png").unwrap_err();
        assert!(matches!(err, EngineError::InvalidImageInput(_)));
    }

    #[test]
    fn test_decode_png_round_trip() {
        let image = gradient(20, 10);
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        let decoded = decode_image(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (20, 10));
    }

    /// Little-endian TIFF header with a single IFD entry: Orientation (0x0112)
    fn exif_orientation(value: u16) -> Vec<u8> {
        let mut exif = vec![0x49, 0x49, 42, 0, 8, 0, 0, 0];
        exif.extend_from_slice(&1u16.to_le_bytes());
        exif.extend_from_slice(&0x0112u16.to_le_bytes());
        exif.extend_from_slice(&3u16.to_le_bytes());
        exif.extend_from_slice(&1u32.to_le_bytes());
        exif.extend_from_slice(&value.to_le_bytes());
        exif.extend_from_slice(&[0, 0]);
        exif.extend_from_slice(&0u32.to_le_bytes());
        exif
    }

    #[test]
    fn test_decode_applies_exif_rotation() {
        // 3×2 black image with a single red pixel in the top-left corner
        let mut stored = RgbImage::new(3, 2);
        stored.put_pixel(0, 0, Rgb([255, 0, 0]));

        let mut bytes = Vec::new();
        let mut encoder = PngEncoder::new(&mut bytes);
        encoder.set_exif_metadata(exif_orientation(6)).unwrap();
        encoder
            .write_image(stored.as_raw(), 3, 2, ExtendedColorType::Rgb8)
            .unwrap();

        // Orientation 6: rotate 90° clockwise, top-left moves to top-right
        let decoded = decode_image(&bytes).unwrap().to_rgb8();
        assert_eq!(decoded.dimensions(), (2, 3));
        assert_eq!(decoded.get_pixel(1, 0), &Rgb([255, 0, 0]));
        assert_eq!(decoded.get_pixel(0, 0), &Rgb([0, 0, 0]));
    }
}
