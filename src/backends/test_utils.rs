//! Mock predictor for testing the pipeline without a model
//!
//! The mock mirrors the real backend's contract: it must be initialized
//! before use, produces masks matching the input dimensions, and is fully
//! deterministic.

use crate::config::CutoutConfig;
use crate::error::{ObjcutError, Result};
use crate::inference::MaskPredictor;
use crate::types::{CandidateMask, PointPrompt};
use image::RgbImage;
use instant::Duration;

enum Behavior {
    /// One candidate: a block of the given half-extent around the prompt
    BlockAroundPrompt { score: f32, half_extent: u32 },
    /// Fixed candidate list, returned regardless of input
    Fixed(Vec<CandidateMask>),
    /// No candidates at all
    Empty,
    /// Inference failure
    Fail(String),
}

/// Deterministic stand-in for a segmentation backend
pub struct MockPredictor {
    behavior: Behavior,
    initialized: bool,
}

impl MockPredictor {
    /// Predict a single 3x3 block candidate around the prompt
    #[must_use]
    pub fn constant_score(score: f32) -> Self {
        Self {
            behavior: Behavior::BlockAroundPrompt {
                score,
                half_extent: 1,
            },
            initialized: false,
        }
    }

    /// Always return exactly these candidates
    #[must_use]
    pub fn with_candidates(candidates: Vec<CandidateMask>) -> Self {
        Self {
            behavior: Behavior::Fixed(candidates),
            initialized: false,
        }
    }

    /// Always return an empty candidate set
    #[must_use]
    pub fn returning_empty() -> Self {
        Self {
            behavior: Behavior::Empty,
            initialized: false,
        }
    }

    /// Always fail inference with the given message
    #[must_use]
    pub fn failing(message: &str) -> Self {
        Self {
            behavior: Behavior::Fail(message.to_string()),
            initialized: false,
        }
    }

    fn block_candidate(
        image: &RgbImage,
        prompt: PointPrompt,
        score: f32,
        half_extent: u32,
    ) -> Result<CandidateMask> {
        let (width, height) = image.dimensions();
        let mut data = vec![0.0; width as usize * height as usize];

        let x0 = prompt.x.saturating_sub(half_extent);
        let y0 = prompt.y.saturating_sub(half_extent);
        let x1 = (prompt.x + half_extent).min(width - 1);
        let y1 = (prompt.y + half_extent).min(height - 1);

        for y in y0..=y1 {
            for x in x0..=x1 {
                data[y as usize * width as usize + x as usize] = 0.9;
            }
        }

        CandidateMask::new(data, (width, height), score)
    }
}

impl MaskPredictor for MockPredictor {
    fn initialize(&mut self, _config: &CutoutConfig) -> Result<Option<Duration>> {
        self.initialized = true;
        Ok(Some(Duration::from_millis(0)))
    }

    fn predict(&mut self, image: &RgbImage, prompt: PointPrompt) -> Result<Vec<CandidateMask>> {
        if !self.initialized {
            return Err(ObjcutError::inference(
                "Mock backend not initialized. Call initialize() before predict().",
            ));
        }

        match &self.behavior {
            Behavior::BlockAroundPrompt { score, half_extent } => Ok(vec![Self::block_candidate(
                image,
                prompt,
                *score,
                *half_extent,
            )?]),
            Behavior::Fixed(candidates) => Ok(candidates.clone()),
            Behavior::Empty => Ok(Vec::new()),
            Behavior::Fail(message) => Err(ObjcutError::inference(message.clone())),
        }
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_candidate_matches_image_dimensions() {
        let mut predictor = MockPredictor::constant_score(0.8);
        predictor.initialize(&CutoutConfig::default()).unwrap();

        let image = RgbImage::new(10, 10);
        let candidates = predictor.predict(&image, PointPrompt::new(5, 5)).unwrap();

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].dimensions, (10, 10));
        assert!((candidates[0].score - 0.8).abs() < f32::EPSILON);
        // 3x3 block around (5, 5)
        assert_eq!(
            candidates[0].data.iter().filter(|&&v| v > 0.5).count(),
            9
        );
    }

    #[test]
    fn test_block_candidate_clamps_at_borders() {
        let mut predictor = MockPredictor::constant_score(0.8);
        predictor.initialize(&CutoutConfig::default()).unwrap();

        let image = RgbImage::new(5, 5);
        let candidates = predictor.predict(&image, PointPrompt::new(0, 0)).unwrap();

        // Corner prompt yields a 2x2 block
        assert_eq!(
            candidates[0].data.iter().filter(|&&v| v > 0.5).count(),
            4
        );
    }

    #[test]
    fn test_requires_initialization() {
        let mut predictor = MockPredictor::constant_score(0.5);
        let image = RgbImage::new(4, 4);
        assert!(predictor.predict(&image, PointPrompt::new(0, 0)).is_err());
    }

    #[test]
    fn test_failing_mock() {
        let mut predictor = MockPredictor::failing("synthetic failure");
        predictor.initialize(&CutoutConfig::default()).unwrap();

        let image = RgbImage::new(4, 4);
        let err = predictor
            .predict(&image, PointPrompt::new(0, 0))
            .unwrap_err();
        assert!(err.to_string().contains("synthetic failure"));
    }
}
