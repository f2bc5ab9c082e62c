//! Mask predictor abstraction
//!
//! The segmentation model is an external capability behind a trait so the
//! pipeline can be driven by the ONNX backend in production and by a mock in
//! tests. Initialization is explicit and caller-invoked; constructing a
//! predictor never loads a model.

use crate::config::CutoutConfig;
use crate::error::Result;
use crate::types::{CandidateMask, PointPrompt};
use image::RgbImage;
use instant::Duration;

/// Trait for point-prompted segmentation backends
pub trait MaskPredictor {
    /// Load the model and prepare the backend
    ///
    /// Returns the model load time when the backend measures it.
    ///
    /// # Errors
    /// - Model resolution or loading failures
    /// - Invalid configuration parameters
    fn initialize(&mut self, config: &CutoutConfig) -> Result<Option<Duration>>;

    /// Predict candidate masks for one point prompt
    ///
    /// Every returned mask matches the input image's dimensions; the backend
    /// is responsible for upsampling its internal resolution back to the
    /// original. Candidate order is the model's output order.
    ///
    /// # Errors
    /// - Backend not initialized
    /// - Model inference failures
    fn predict(&mut self, image: &RgbImage, prompt: PointPrompt) -> Result<Vec<CandidateMask>>;

    /// Check if the backend has been initialized
    fn is_initialized(&self) -> bool;
}

/// Factory trait for creating predictors
///
/// The processor takes a factory rather than a concrete backend, keeping
/// model state out of globals and letting tests inject a mock.
pub trait PredictorFactory: Send + Sync {
    /// Create an uninitialized predictor instance
    ///
    /// # Errors
    /// Returns an error when no backend is compiled in or the requested
    /// backend cannot be constructed.
    fn create_predictor(&self) -> Result<Box<dyn MaskPredictor>>;
}

/// Default factory: the ONNX backend when compiled in
pub struct DefaultPredictorFactory;

impl PredictorFactory for DefaultPredictorFactory {
    #[cfg(feature = "onnx")]
    fn create_predictor(&self) -> Result<Box<dyn MaskPredictor>> {
        Ok(Box::new(crate::backends::SamOnnxPredictor::new()))
    }

    #[cfg(not(feature = "onnx"))]
    fn create_predictor(&self) -> Result<Box<dyn MaskPredictor>> {
        Err(crate::error::ObjcutError::invalid_config(
            "No inference backend compiled in. Rebuild with the 'onnx' feature \
             or inject a custom PredictorFactory.",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::test_utils::MockPredictor;

    #[test]
    fn test_mock_predictor_through_trait() {
        let mut predictor: Box<dyn MaskPredictor> = Box::new(MockPredictor::constant_score(0.75));
        assert!(!predictor.is_initialized());

        predictor.initialize(&CutoutConfig::default()).unwrap();
        assert!(predictor.is_initialized());

        let image = RgbImage::new(8, 6);
        let candidates = predictor.predict(&image, PointPrompt::new(4, 3)).unwrap();
        assert!(!candidates.is_empty());
        for candidate in &candidates {
            assert_eq!(candidate.dimensions, (8, 6));
        }
    }

    #[cfg(feature = "onnx")]
    #[test]
    fn test_default_factory_creates_uninitialized_backend() {
        let predictor = DefaultPredictorFactory.create_predictor().unwrap();
        assert!(!predictor.is_initialized());
    }
}
