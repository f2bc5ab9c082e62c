//! ONNX Runtime backend for SAM-style point-prompted segmentation
//!
//! Drives an encoder/decoder ONNX pair: the encoder turns the image into
//! embeddings once per prediction, the decoder turns embeddings plus one
//! positive point into candidate masks with IoU scores. Masks leave this
//! module at the source image's resolution as sigmoid probabilities, ready
//! for threshold-based selection.

use crate::config::{CutoutConfig, ExecutionProvider};
use crate::error::{ObjcutError, Result};
use crate::inference::MaskPredictor;
use crate::models::ModelManager;
use crate::types::{CandidateMask, PointPrompt};
use image::RgbImage;
use instant::Duration;
use ndarray::{Array1, Array2, Array3, Array4};
use ort::execution_providers::{
    CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProvider as OrtExecutionProvider,
};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::TensorRef;

/// Side length of the square tensor the encoder consumes
const MODEL_INPUT_SIZE: u32 = 1024;

/// Spatial size of the decoder's optional mask input
const MASK_INPUT_SIZE: usize = 256;

/// Per-channel normalization applied before encoding (ImageNet statistics)
const PIXEL_MEAN: [f32; 3] = [123.675, 116.28, 103.53];
const PIXEL_STD: [f32; 3] = [58.395, 57.12, 57.375];

const ENCODER_INPUT: &str = "image";
const ENCODER_OUTPUT: &str = "image_embeddings";
const DECODER_MASKS: &str = "masks";
const DECODER_SCORES: &str = "iou_predictions";

/// ONNX Runtime predictor for SAM-style models
pub struct SamOnnxPredictor {
    encoder: Option<Session>,
    decoder: Option<Session>,
    initialized: bool,
}

impl SamOnnxPredictor {
    /// Create a new, uninitialized predictor
    #[must_use]
    pub fn new() -> Self {
        Self {
            encoder: None,
            decoder: None,
            initialized: false,
        }
    }

    /// List all ONNX Runtime execution providers with availability status
    #[must_use]
    pub fn list_providers() -> Vec<(String, bool, String)> {
        let mut providers = Vec::new();

        providers.push((
            "CPU".to_string(),
            true,
            "Always available, uses CPU for inference".to_string(),
        ));

        let cuda_available =
            OrtExecutionProvider::is_available(&CUDAExecutionProvider::default()).unwrap_or(false);
        providers.push((
            "CUDA".to_string(),
            cuda_available,
            "NVIDIA GPU acceleration (requires CUDA toolkit and compatible GPU)".to_string(),
        ));

        let coreml_available =
            OrtExecutionProvider::is_available(&CoreMLExecutionProvider::default())
                .unwrap_or(false);
        providers.push((
            "CoreML".to_string(),
            coreml_available,
            "Apple Neural Engine and GPU acceleration".to_string(),
        ));

        providers
    }

    fn build_session(path: &std::path::Path, config: &CutoutConfig) -> Result<Session> {
        let mut session_builder = Session::builder()
            .map_err(|e| ObjcutError::inference(format!("Failed to create session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| ObjcutError::inference(format!("Failed to set optimization level: {e}")))?;

        session_builder = match config.execution_provider {
            ExecutionProvider::Auto => {
                // Prefer CUDA, then CoreML, then CPU
                let mut providers = Vec::new();

                let cuda_provider = CUDAExecutionProvider::default();
                if OrtExecutionProvider::is_available(&cuda_provider).unwrap_or(false) {
                    log::info!("CUDA execution provider is available and will be used");
                    providers.push(cuda_provider.build());
                } else {
                    log::debug!("CUDA execution provider is not available");
                }

                let coreml_provider = CoreMLExecutionProvider::default();
                if OrtExecutionProvider::is_available(&coreml_provider).unwrap_or(false) {
                    log::info!("CoreML execution provider is available and will be used");
                    providers.push(
                        CoreMLExecutionProvider::default()
                            .with_subgraphs(true)
                            .build(),
                    );
                } else {
                    log::debug!("CoreML execution provider is not available");
                }

                if providers.is_empty() {
                    log::info!("No hardware acceleration available, using CPU");
                    session_builder
                } else {
                    session_builder
                        .with_execution_providers(providers)
                        .map_err(|e| {
                            ObjcutError::inference(format!(
                                "Failed to set auto execution providers: {e}"
                            ))
                        })?
                }
            },
            ExecutionProvider::Cpu => {
                log::info!("Using CPU execution provider");
                session_builder
            },
            ExecutionProvider::Cuda => {
                let cuda_provider = CUDAExecutionProvider::default();
                if OrtExecutionProvider::is_available(&cuda_provider).unwrap_or(false) {
                    log::info!("Using CUDA execution provider");
                    session_builder
                        .with_execution_providers([cuda_provider.build()])
                        .map_err(|e| {
                            ObjcutError::inference(format!(
                                "Failed to set CUDA execution provider: {e}"
                            ))
                        })?
                } else {
                    log::warn!("CUDA requested but not available, falling back to CPU");
                    session_builder
                }
            },
            ExecutionProvider::CoreMl => {
                let coreml_provider = CoreMLExecutionProvider::default();
                if OrtExecutionProvider::is_available(&coreml_provider).unwrap_or(false) {
                    log::info!("Using CoreML execution provider");
                    session_builder
                        .with_execution_providers([CoreMLExecutionProvider::default()
                            .with_subgraphs(true)
                            .build()])
                        .map_err(|e| {
                            ObjcutError::inference(format!(
                                "Failed to set CoreML execution provider: {e}"
                            ))
                        })?
                } else {
                    log::warn!("CoreML requested but not available, falling back to CPU");
                    session_builder
                }
            },
        };

        let intra_threads = if config.intra_threads > 0 {
            config.intra_threads
        } else {
            std::thread::available_parallelism()
                .map(std::num::NonZero::get)
                .unwrap_or(8)
        };
        let inter_threads = if config.inter_threads > 0 {
            config.inter_threads
        } else {
            (std::thread::available_parallelism()
                .map(std::num::NonZero::get)
                .unwrap_or(8)
                / 4)
            .max(1)
        };

        session_builder
            .with_intra_threads(intra_threads)
            .map_err(|e| ObjcutError::inference(format!("Failed to set intra threads: {e}")))?
            .with_inter_threads(inter_threads)
            .map_err(|e| ObjcutError::inference(format!("Failed to set inter threads: {e}")))?
            .commit_from_file(path)
            .map_err(|e| {
                ObjcutError::inference(format!(
                    "Failed to load model '{}': {e}",
                    path.display()
                ))
            })
    }

    /// Resize and normalize the image into the encoder's input tensor
    fn preprocess(image: &RgbImage) -> Array4<f32> {
        let resized = image::imageops::resize(
            image,
            MODEL_INPUT_SIZE,
            MODEL_INPUT_SIZE,
            image::imageops::FilterType::CatmullRom,
        );

        let size = MODEL_INPUT_SIZE as usize;
        let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
        for (x, y, pixel) in resized.enumerate_pixels() {
            for channel in 0..3 {
                tensor[[0, channel, y as usize, x as usize]] =
                    (f32::from(pixel.0[channel]) - PIXEL_MEAN[channel]) / PIXEL_STD[channel];
            }
        }
        tensor
    }

    /// Scale a pixel prompt into the model's 1024-square input space
    ///
    /// The decoder also receives a padding point with label -1, matching the
    /// export convention for prompts without a box.
    fn prompt_tensors(prompt: PointPrompt, dimensions: (u32, u32)) -> (Array3<f32>, Array2<f32>) {
        let (width, height) = dimensions;
        let scale_x = MODEL_INPUT_SIZE as f32 / width as f32;
        let scale_y = MODEL_INPUT_SIZE as f32 / height as f32;

        let mut coords = Array3::<f32>::zeros((1, 2, 2));
        coords[[0, 0, 0]] = prompt.x as f32 * scale_x;
        coords[[0, 0, 1]] = prompt.y as f32 * scale_y;

        let mut labels = Array2::<f32>::zeros((1, 2));
        labels[[0, 0]] = 1.0;
        labels[[0, 1]] = -1.0;

        (coords, labels)
    }

    /// Collect decoder outputs into per-candidate probability rasters
    fn collect_candidates(
        masks: &ndarray::ArrayViewD<'_, f32>,
        scores: &ndarray::ArrayViewD<'_, f32>,
        dimensions: (u32, u32),
    ) -> Result<Vec<CandidateMask>> {
        let shape = masks.shape();
        if shape.len() != 4 {
            return Err(ObjcutError::inference(format!(
                "Decoder mask output has rank {}, expected 4",
                shape.len()
            )));
        }
        let candidate_count = shape[1];
        let mask_height = shape[2];
        let mask_width = shape[3];

        let (width, height) = dimensions;
        let mut candidates = Vec::with_capacity(candidate_count);

        for index in 0..candidate_count {
            let score = *scores
                .get([0, index].as_slice())
                .ok_or_else(|| ObjcutError::inference("Decoder score output too small"))?;

            let mut probabilities = Vec::with_capacity(mask_width * mask_height);
            for y in 0..mask_height {
                for x in 0..mask_width {
                    let logit = masks[[0, index, y, x]];
                    probabilities.push(sigmoid(logit));
                }
            }

            let data = if (mask_width as u32, mask_height as u32) == dimensions {
                probabilities
            } else {
                // Decoder emitted its low-resolution grid: upsample to source size
                resize_probabilities(
                    &probabilities,
                    (mask_width as u32, mask_height as u32),
                    (width, height),
                )?
            };

            candidates.push(CandidateMask::new(data, dimensions, score)?);
        }

        Ok(candidates)
    }
}

impl Default for SamOnnxPredictor {
    fn default() -> Self {
        Self::new()
    }
}

impl MaskPredictor for SamOnnxPredictor {
    fn initialize(&mut self, config: &CutoutConfig) -> Result<Option<Duration>> {
        if self.initialized {
            return Ok(None);
        }

        let load_start = instant::Instant::now();
        let model_manager = ModelManager::from_spec(&config.model_spec)?;

        log::info!(
            "Loading segmentation model from {}",
            model_manager.model_dir().display()
        );
        self.encoder = Some(Self::build_session(&model_manager.encoder_path(), config)?);
        self.decoder = Some(Self::build_session(&model_manager.decoder_path(), config)?);
        self.initialized = true;

        let elapsed = load_start.elapsed();
        log::info!("Model loaded in {}ms", elapsed.as_millis());
        Ok(Some(elapsed))
    }

    fn predict(&mut self, image: &RgbImage, prompt: PointPrompt) -> Result<Vec<CandidateMask>> {
        if !self.initialized {
            return Err(ObjcutError::inference(
                "Backend not initialized. Call initialize() before predict().",
            ));
        }

        let dimensions = image.dimensions();
        let (width, height) = dimensions;

        let image_tensor = Self::preprocess(image);

        let encoder = self
            .encoder
            .as_mut()
            .ok_or_else(|| ObjcutError::inference("Encoder session missing"))?;
        let encoder_outputs = encoder
            .run(ort::inputs![
                ENCODER_INPUT => TensorRef::from_array_view(image_tensor.view())
                    .map_err(|e| ObjcutError::inference(format!("Failed to build encoder input: {e}")))?
            ])
            .map_err(|e| ObjcutError::inference(format!("Encoder inference failed: {e}")))?;
        let embeddings = encoder_outputs[ENCODER_OUTPUT]
            .try_extract_array::<f32>()
            .map_err(|e| ObjcutError::inference(format!("Failed to extract embeddings: {e}")))?
            .to_owned();

        let (point_coords, point_labels) = Self::prompt_tensors(prompt, dimensions);
        let mask_input = Array4::<f32>::zeros((1, 1, MASK_INPUT_SIZE, MASK_INPUT_SIZE));
        let has_mask_input = Array1::<f32>::zeros(1);
        let orig_im_size = ndarray::arr1(&[height as f32, width as f32]);

        let decoder = self
            .decoder
            .as_mut()
            .ok_or_else(|| ObjcutError::inference("Decoder session missing"))?;
        let decoder_outputs = decoder
            .run(ort::inputs![
                "image_embeddings" => TensorRef::from_array_view(embeddings.view())
                    .map_err(|e| ObjcutError::inference(format!("Failed to build decoder input: {e}")))?,
                "point_coords" => TensorRef::from_array_view(point_coords.view())
                    .map_err(|e| ObjcutError::inference(format!("Failed to build decoder input: {e}")))?,
                "point_labels" => TensorRef::from_array_view(point_labels.view())
                    .map_err(|e| ObjcutError::inference(format!("Failed to build decoder input: {e}")))?,
                "mask_input" => TensorRef::from_array_view(mask_input.view())
                    .map_err(|e| ObjcutError::inference(format!("Failed to build decoder input: {e}")))?,
                "has_mask_input" => TensorRef::from_array_view(has_mask_input.view())
                    .map_err(|e| ObjcutError::inference(format!("Failed to build decoder input: {e}")))?,
                "orig_im_size" => TensorRef::from_array_view(orig_im_size.view())
                    .map_err(|e| ObjcutError::inference(format!("Failed to build decoder input: {e}")))?,
            ])
            .map_err(|e| ObjcutError::inference(format!("Decoder inference failed: {e}")))?;

        let masks = decoder_outputs[DECODER_MASKS]
            .try_extract_array::<f32>()
            .map_err(|e| ObjcutError::inference(format!("Failed to extract masks: {e}")))?;
        let scores = decoder_outputs[DECODER_SCORES]
            .try_extract_array::<f32>()
            .map_err(|e| ObjcutError::inference(format!("Failed to extract scores: {e}")))?;

        let candidates = Self::collect_candidates(&masks.view(), &scores.view(), dimensions)?;
        log::debug!(
            "Predicted {} candidate mask(s) for prompt {prompt}",
            candidates.len()
        );
        Ok(candidates)
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Bilinear upsample of a probability raster
fn resize_probabilities(
    values: &[f32],
    from: (u32, u32),
    to: (u32, u32),
) -> Result<Vec<f32>> {
    let buffer: image::ImageBuffer<image::Luma<f32>, Vec<f32>> =
        image::ImageBuffer::from_raw(from.0, from.1, values.to_vec()).ok_or_else(|| {
            ObjcutError::processing("Probability raster does not match its dimensions")
        })?;

    let resized = image::imageops::resize(&buffer, to.0, to.1, image::imageops::FilterType::Triangle);
    Ok(resized.into_raw())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uninitialized_predict_fails() {
        let mut predictor = SamOnnxPredictor::new();
        let image = RgbImage::new(4, 4);
        let result = predictor.predict(&image, PointPrompt::new(1, 1));
        assert!(matches!(result, Err(ObjcutError::Inference(_))));
    }

    #[test]
    fn test_preprocess_shape_and_normalization() {
        let image = RgbImage::from_pixel(10, 10, image::Rgb([255, 0, 128]));
        let tensor = SamOnnxPredictor::preprocess(&image);

        assert_eq!(tensor.shape(), &[1, 3, 1024, 1024]);
        let expected_r = (255.0 - PIXEL_MEAN[0]) / PIXEL_STD[0];
        let expected_g = (0.0 - PIXEL_MEAN[1]) / PIXEL_STD[1];
        assert!((tensor[[0, 0, 512, 512]] - expected_r).abs() < 1e-5);
        assert!((tensor[[0, 1, 512, 512]] - expected_g).abs() < 1e-5);
    }

    #[test]
    fn test_prompt_scaling() {
        let (coords, labels) = SamOnnxPredictor::prompt_tensors(PointPrompt::new(50, 25), (100, 50));

        // Half-way point in both axes lands at 512 in model space
        assert!((coords[[0, 0, 0]] - 512.0).abs() < f32::EPSILON);
        assert!((coords[[0, 0, 1]] - 512.0).abs() < f32::EPSILON);
        // Padding point at the origin with label -1
        assert_eq!(coords[[0, 1, 0]], 0.0);
        assert_eq!(labels[[0, 0]], 1.0);
        assert_eq!(labels[[0, 1]], -1.0);
    }

    #[test]
    fn test_collect_candidates_applies_sigmoid() {
        // Two candidates at source resolution: logits 10 and -10
        let masks = ndarray::ArrayD::from_shape_vec(
            ndarray::IxDyn(&[1, 2, 2, 2]),
            vec![10.0, 10.0, 10.0, 10.0, -10.0, -10.0, -10.0, -10.0],
        )
        .unwrap();
        let scores =
            ndarray::ArrayD::from_shape_vec(ndarray::IxDyn(&[1, 2]), vec![0.9, 0.3]).unwrap();

        let candidates =
            SamOnnxPredictor::collect_candidates(&masks.view(), &scores.view(), (2, 2)).unwrap();

        assert_eq!(candidates.len(), 2);
        assert!((candidates[0].score - 0.9).abs() < f32::EPSILON);
        assert!(candidates[0].data.iter().all(|&p| p > 0.99));
        assert!(candidates[1].data.iter().all(|&p| p < 0.01));
    }

    #[test]
    fn test_collect_candidates_upsamples_low_res() {
        // 2x2 logit grid for a 4x4 source image
        let masks = ndarray::ArrayD::from_shape_vec(
            ndarray::IxDyn(&[1, 1, 2, 2]),
            vec![8.0, 8.0, -8.0, -8.0],
        )
        .unwrap();
        let scores = ndarray::ArrayD::from_shape_vec(ndarray::IxDyn(&[1, 1]), vec![0.5]).unwrap();

        let candidates =
            SamOnnxPredictor::collect_candidates(&masks.view(), &scores.view(), (4, 4)).unwrap();

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].dimensions, (4, 4));
        assert_eq!(candidates[0].data.len(), 16);
        // Top rows stay near 1, bottom rows near 0
        assert!(candidates[0].value(0, 0) > 0.9);
        assert!(candidates[0].value(0, 3) < 0.1);
    }

    #[test]
    fn test_sigmoid_midpoint() {
        assert!((sigmoid(0.0) - 0.5).abs() < f32::EPSILON);
        assert!(sigmoid(10.0) > 0.999);
        assert!(sigmoid(-10.0) < 0.001);
    }
}
