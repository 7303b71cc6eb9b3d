//! Image preprocessing for classifier input.
//!
//! Pure bytes-to-tensor transform: no I/O, no model calls.
//!
//! Flow:
//! 1. Decode (format guessed from content)
//! 2. Convert to 8-bit RGB
//! 3. Stretch-resize to `target_size x target_size` (aspect ratio not kept,
//!    the classifier was trained on stretched scans)
//! 4. Scale to [0, 1] into an NHWC `f32` tensor with batch size 1

use image::imageops::FilterType;
use image::GenericImageView;
use ndarray::Array4;
use tracing::debug;

use super::AnalysisError;
use crate::config::{DEFAULT_MODEL_INPUT_SIZE, MAX_MODEL_INPUT_SIZE};

/// What the classifier expects. Changes per model artifact.
#[derive(Debug, Clone)]
pub struct ModelInputConfig {
    /// Square input edge in pixels.
    pub target_size: u32,
}

impl Default for ModelInputConfig {
    fn default() -> Self {
        Self {
            target_size: DEFAULT_MODEL_INPUT_SIZE,
        }
    }
}

/// Turns uploaded bytes into a classifier input tensor.
pub trait ImagePreprocessor: Send + Sync {
    /// Output shape is `(1, size, size, 3)`, values in [0, 1].
    fn preprocess(&self, image_bytes: &[u8]) -> Result<Array4<f32>, AnalysisError>;
}

/// Production preprocessor. Cubic resampling, matching how the training
/// pipeline resized scans.
pub struct TensorPreprocessor {
    config: ModelInputConfig,
}

impl TensorPreprocessor {
    pub fn new(config: ModelInputConfig) -> Self {
        Self { config }
    }

    pub fn target_size(&self) -> u32 {
        self.config.target_size
    }
}

impl Default for TensorPreprocessor {
    fn default() -> Self {
        Self::new(ModelInputConfig::default())
    }
}

impl ImagePreprocessor for TensorPreprocessor {
    fn preprocess(&self, image_bytes: &[u8]) -> Result<Array4<f32>, AnalysisError> {
        let size = self.config.target_size;
        // Resize allocates size² × 3 bytes up front
        if size == 0 || size > MAX_MODEL_INPUT_SIZE {
            return Err(AnalysisError::Inference(format!(
                "model input size {size} outside 1..={MAX_MODEL_INPUT_SIZE}"
            )));
        }

        if image_bytes.is_empty() {
            return Err(AnalysisError::Decode("empty upload".into()));
        }

        let img = image::load_from_memory(image_bytes)
            .map_err(|e| AnalysisError::Decode(e.to_string()))?;
        let (orig_w, orig_h) = img.dimensions();

        let rgb = img.to_rgb8();
        let resized = image::imageops::resize(&rgb, size, size, FilterType::CatmullRom);

        // RgbImage raw layout is row-major HWC, which is the tensor layout too
        let pixels: Vec<f32> = resized
            .into_raw()
            .into_iter()
            .map(|v| f32::from(v) / 255.0)
            .collect();
        let side = size as usize;
        let tensor = Array4::from_shape_vec((1, side, side, 3), pixels)
            .map_err(|e| AnalysisError::Decode(format!("tensor shape: {e}")))?;

        debug!(
            source_dims = %format!("{orig_w}x{orig_h}"),
            output_dims = %format!("{size}x{size}"),
            "Image preprocessed for classifier"
        );

        Ok(tensor)
    }
}


#[cfg(test)]
mod tests {
    use super::test_images::*;
    use super::*;

    fn assert_in_unit_range(tensor: &Array4<f32>) {
        assert!(tensor.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn output_has_model_shape() {
        let pre = TensorPreprocessor::default();
        let tensor = pre.preprocess(&gradient_png(640, 480)).unwrap();
        assert_eq!(tensor.shape(), &[1, 224, 224, 3]);
        assert_in_unit_range(&tensor);
    }

    #[test]
    fn small_images_are_upscaled() {
        let pre = TensorPreprocessor::default();
        let tensor = pre.preprocess(&png(16, 64, [10, 20, 30])).unwrap();
        assert_eq!(tensor.shape(), &[1, 224, 224, 3]);
    }

    #[test]
    fn solid_color_scales_to_unit_range() {
        let pre = TensorPreprocessor::default();
        let tensor = pre.preprocess(&png(100, 100, [255, 0, 51])).unwrap();
        // one 8-bit step of resampling slack
        let tol = 1.0 / 255.0 + 1e-6;
        assert!((tensor[[0, 50, 50, 0]] - 1.0).abs() <= tol);
        assert!(tensor[[0, 50, 50, 1]].abs() <= tol);
        assert!((tensor[[0, 50, 50, 2]] - 0.2).abs() <= tol);
    }

    #[test]
    fn grayscale_is_expanded_to_three_channels() {
        let pre = TensorPreprocessor::default();
        let tensor = pre.preprocess(&grayscale_jpeg(300, 300, 128)).unwrap();
        assert_eq!(tensor.shape(), &[1, 224, 224, 3]);
        let px = [
            tensor[[0, 100, 100, 0]],
            tensor[[0, 100, 100, 1]],
            tensor[[0, 100, 100, 2]],
        ];
        assert!((px[0] - px[1]).abs() < 1e-6 && (px[1] - px[2]).abs() < 1e-6);
        assert_in_unit_range(&tensor);
    }

    #[test]
    fn alpha_channel_is_dropped() {
        let pre = TensorPreprocessor::default();
        let tensor = pre.preprocess(&rgba_png(50, 80, [0, 255, 0, 10])).unwrap();
        assert_eq!(tensor.shape(), &[1, 224, 224, 3]);
        assert!((tensor[[0, 10, 10, 1]] - 1.0).abs() <= 1.0 / 255.0 + 1e-6);
    }

    #[test]
    fn custom_target_size_is_respected() {
        let pre = TensorPreprocessor::new(ModelInputConfig { target_size: 128 });
        let tensor = pre.preprocess(&gradient_png(200, 100)).unwrap();
        assert_eq!(tensor.shape(), &[1, 128, 128, 3]);
        assert_eq!(pre.target_size(), 128);
    }

    #[test]
    fn out_of_range_target_size_fails_without_allocating() {
        for target_size in [0, MAX_MODEL_INPUT_SIZE + 1, u32::MAX] {
            let pre = TensorPreprocessor::new(ModelInputConfig { target_size });
            let err = pre.preprocess(&png(4, 4, [1, 2, 3])).unwrap_err();
            assert!(matches!(err, AnalysisError::Inference(_)));
        }
    }

    #[test]
    fn same_bytes_give_identical_tensors() {
        let pre = TensorPreprocessor::default();
        let bytes = gradient_png(333, 257);
        let first = pre.preprocess(&bytes).unwrap();
        let second = pre.preprocess(&bytes).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn empty_buffer_is_decode_error() {
        let pre = TensorPreprocessor::default();
        let err = pre.preprocess(&[]).unwrap_err();
        assert!(matches!(err, AnalysisError::Decode(_)));
    }

    #[test]
    fn truncated_jpeg_header_is_decode_error() {
        let pre = TensorPreprocessor::default();
        let err = pre.preprocess(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10]).unwrap_err();
        assert!(matches!(err, AnalysisError::Decode(_)));
    }

    #[test]
    fn non_image_bytes_are_decode_error() {
        let pre = TensorPreprocessor::default();
        let err = pre.preprocess(b"%PDF-1.4 not an image").unwrap_err();
        assert!(matches!(err, AnalysisError::Decode(_)));
    }
}
