//! Segmentation-and-cutout pipeline
//!
//! `CutoutProcessor` runs the four stages in order — load, predict, select,
//! compose — against one image and one point prompt. Initialization is lazy
//! and explicit; the predictor is injected through a factory so the pipeline
//! itself carries no model state.

use crate::compose::derive_outputs;
use crate::config::CutoutConfig;
use crate::error::{ObjcutError, Result};
use crate::inference::{DefaultPredictorFactory, MaskPredictor, PredictorFactory};
use crate::io::{ImageLoader, ImageSource};
use crate::selector::select_mask;
use crate::types::{CutoutResult, PointPrompt, StageTimings};
use image::RgbImage;
use instant::Instant;
use log::{debug, info};

/// Pipeline driver for single-image object cutout
pub struct CutoutProcessor {
    config: CutoutConfig,
    factory: Box<dyn PredictorFactory>,
    predictor: Option<Box<dyn MaskPredictor>>,
    initialized: bool,
}

impl CutoutProcessor {
    /// Create a processor with the default predictor factory
    #[must_use]
    pub fn new(config: CutoutConfig) -> Self {
        Self::with_factory(config, Box::new(DefaultPredictorFactory))
    }

    /// Create a processor with a custom predictor factory
    #[must_use]
    pub fn with_factory(config: CutoutConfig, factory: Box<dyn PredictorFactory>) -> Self {
        Self {
            config,
            factory,
            predictor: None,
            initialized: false,
        }
    }

    /// The active configuration
    #[must_use]
    pub fn config(&self) -> &CutoutConfig {
        &self.config
    }

    /// Create the predictor and load the model
    ///
    /// Idempotent; later calls are no-ops.
    ///
    /// # Errors
    /// - Predictor construction or model loading failures
    pub fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }

        info!("Initializing cutout processor");
        debug!("Model spec: {:?}", self.config.model_spec);
        debug!("Execution provider: {}", self.config.execution_provider);

        let mut predictor = self.factory.create_predictor()?;
        let load_time = predictor.initialize(&self.config)?;
        if let Some(duration) = load_time {
            debug!("Model load took {}ms", duration.as_millis());
        }

        self.predictor = Some(predictor);
        self.initialized = true;
        Ok(())
    }

    /// Run the pipeline on an already-loaded image
    ///
    /// # Errors
    /// - Prompt outside the image bounds
    /// - Inference, selection, or composition failures
    pub fn process_image(&mut self, image: &RgbImage, prompt: PointPrompt) -> Result<CutoutResult> {
        self.initialize()?;

        let total_start = Instant::now();
        let (width, height) = image.dimensions();

        if !prompt.is_within(width, height) {
            return Err(ObjcutError::invalid_config(format!(
                "Point prompt {prompt} is outside the {width}x{height} image"
            )));
        }

        let predictor = self
            .predictor
            .as_mut()
            .ok_or_else(|| ObjcutError::inference("Predictor missing after initialization"))?;

        let inference_start = Instant::now();
        let candidates = predictor.predict(image, prompt)?;
        let inference_ms = inference_start.elapsed().as_millis() as u64;
        debug!("Inference produced {} candidate(s)", candidates.len());

        let selection_start = Instant::now();
        let mask = select_mask(&candidates, (width, height))?;
        let selection_ms = selection_start.elapsed().as_millis() as u64;

        // Score of the winner, for reporting; select_mask already validated
        // the set is non-empty.
        let score = candidates
            .iter()
            .map(|candidate| candidate.score)
            .fold(f32::NEG_INFINITY, f32::max);

        let compose_start = Instant::now();
        let outputs = derive_outputs(image, &mask)?;
        let compose_ms = compose_start.elapsed().as_millis() as u64;

        let timings = StageTimings {
            load_ms: 0,
            inference_ms,
            selection_ms,
            compose_ms,
            encode_ms: None,
            total_ms: total_start.elapsed().as_millis() as u64,
        };
        info!(
            "Cutout complete: {} object pixel(s), score {score:.4}",
            mask.occupied_count()
        );

        Ok(CutoutResult {
            outputs,
            mask,
            score,
            timings,
        })
    }

    /// Load a source (path or URL) and run the pipeline on it
    ///
    /// # Errors
    /// - Source fetch or decode failures
    /// - Everything [`Self::process_image`] can fail with
    pub async fn process_source(
        &mut self,
        source: &ImageSource,
        prompt: PointPrompt,
    ) -> Result<CutoutResult> {
        let load_start = Instant::now();
        let loader = ImageLoader::new()?;
        let image = loader.load(source).await?;
        let load_ms = load_start.elapsed().as_millis() as u64;
        debug!(
            "Loaded {} ({}x{}) in {load_ms}ms",
            source,
            image.width(),
            image.height()
        );

        let mut result = self.process_image(&image, prompt)?;
        result.timings.load_ms = load_ms;
        result.timings.total_ms += load_ms;
        Ok(result)
    }

    /// Load a local file and run the pipeline on it
    ///
    /// # Errors
    /// - File open or decode failures
    /// - Everything [`Self::process_image`] can fail with
    pub fn process_file<P: AsRef<std::path::Path>>(
        &mut self,
        path: P,
        prompt: PointPrompt,
    ) -> Result<CutoutResult> {
        let load_start = Instant::now();
        let image = ImageLoader::load_from_path(path)?;
        let load_ms = load_start.elapsed().as_millis() as u64;

        let mut result = self.process_image(&image, prompt)?;
        result.timings.load_ms = load_ms;
        result.timings.total_ms += load_ms;
        Ok(result)
    }
}
