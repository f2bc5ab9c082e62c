//! Core types for the segmentation and cutout pipeline

use crate::error::{ObjcutError, Result};
use image::{RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A single 2D point prompt marking a location inside the object of interest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointPrompt {
    /// X coordinate in pixels, `[0, width)`
    pub x: u32,
    /// Y coordinate in pixels, `[0, height)`
    pub y: u32,
}

impl PointPrompt {
    #[must_use]
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Whether the prompt lies inside an image of the given dimensions
    #[must_use]
    pub fn is_within(&self, width: u32, height: u32) -> bool {
        self.x < width && self.y < height
    }
}

impl std::fmt::Display for PointPrompt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl std::str::FromStr for PointPrompt {
    type Err = ObjcutError;

    /// Parse an `X,Y` pair, e.g. `"450,600"`
    fn from_str(s: &str) -> Result<Self> {
        let (x, y) = s.split_once(',').ok_or_else(|| {
            ObjcutError::invalid_config(format!("Invalid point '{s}': expected X,Y"))
        })?;
        let x = x.trim().parse::<u32>().map_err(|e| {
            ObjcutError::invalid_config(format!("Invalid point x coordinate '{x}': {e}"))
        })?;
        let y = y.trim().parse::<u32>().map_err(|e| {
            ObjcutError::invalid_config(format!("Invalid point y coordinate '{y}': {e}"))
        })?;
        Ok(Self { x, y })
    }
}

/// One candidate object-boundary prediction from the segmentation model
///
/// Raw per-pixel values are probabilities in `[0, 1]` at the source image's
/// resolution, row-major. The score is the model's confidence for this
/// candidate (for SAM-style models, the predicted IoU).
#[derive(Debug, Clone)]
pub struct CandidateMask {
    /// Raw mask values, row-major, `width * height` entries
    pub data: Vec<f32>,
    /// Mask dimensions (width, height)
    pub dimensions: (u32, u32),
    /// Confidence score for this candidate
    pub score: f32,
}

impl CandidateMask {
    /// Create a candidate mask, checking that the buffer matches the dimensions
    pub fn new(data: Vec<f32>, dimensions: (u32, u32), score: f32) -> Result<Self> {
        let expected = dimensions.0 as usize * dimensions.1 as usize;
        if data.len() != expected {
            return Err(ObjcutError::processing(format!(
                "Candidate mask buffer has {} values, dimensions {}x{} require {}",
                data.len(),
                dimensions.0,
                dimensions.1,
                expected
            )));
        }
        Ok(Self {
            data,
            dimensions,
            score,
        })
    }

    /// Raw value at pixel (x, y)
    #[must_use]
    pub fn value(&self, x: u32, y: u32) -> f32 {
        let idx = y as usize * self.dimensions.0 as usize + x as usize;
        self.data.get(idx).copied().unwrap_or(0.0)
    }
}

/// Boolean per-pixel occupancy of the selected object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccupancyMask {
    /// Row-major occupancy flags, `width * height` entries
    pub data: Vec<bool>,
    /// Mask dimensions (width, height)
    pub dimensions: (u32, u32),
}

impl OccupancyMask {
    /// Create an occupancy mask, checking that the buffer matches the dimensions
    pub fn new(data: Vec<bool>, dimensions: (u32, u32)) -> Result<Self> {
        let expected = dimensions.0 as usize * dimensions.1 as usize;
        if data.len() != expected {
            return Err(ObjcutError::processing(format!(
                "Occupancy mask buffer has {} values, dimensions {}x{} require {}",
                data.len(),
                dimensions.0,
                dimensions.1,
                expected
            )));
        }
        Ok(Self { data, dimensions })
    }

    /// Whether pixel (x, y) belongs to the object
    #[must_use]
    pub fn contains(&self, x: u32, y: u32) -> bool {
        let idx = y as usize * self.dimensions.0 as usize + x as usize;
        self.data.get(idx).copied().unwrap_or(false)
    }

    /// Number of pixels belonging to the object
    #[must_use]
    pub fn occupied_count(&self) -> usize {
        self.data.iter().filter(|&&set| set).count()
    }

    /// Tight bounding box of occupied pixels as `(min_x, min_y, max_x, max_y)`,
    /// inclusive on both ends. `None` when no pixel is occupied.
    #[must_use]
    pub fn bounding_box(&self) -> Option<(u32, u32, u32, u32)> {
        let (width, height) = self.dimensions;
        let mut bbox: Option<(u32, u32, u32, u32)> = None;

        for y in 0..height {
            for x in 0..width {
                if self.contains(x, y) {
                    bbox = Some(match bbox {
                        None => (x, y, x, y),
                        Some((min_x, min_y, max_x, max_y)) => {
                            (min_x.min(x), min_y.min(y), max_x.max(x), max_y.max(y))
                        },
                    });
                }
            }
        }

        bbox
    }
}

/// The three rasters derived from one source image and its selected mask
#[derive(Debug, Clone)]
pub struct DerivedOutputs {
    /// Source copy with object pixels erased to black
    pub erased: RgbImage,
    /// Source RGB plus an alpha channel marking object pixels
    pub cutout: RgbaImage,
    /// Object pixels cropped to their tight bounding box
    pub cropped: RgbImage,
}

impl DerivedOutputs {
    /// Write all three outputs as PNG under `dir`, named from `stem`
    ///
    /// Returns the written paths in (erased, cutout, cropped) order. The
    /// output directory is created when missing.
    pub fn save_all<P: AsRef<Path>>(&self, dir: P, stem: &str) -> Result<[PathBuf; 3]> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)
            .map_err(|e| ObjcutError::file_io_error("create output directory", dir, &e))?;

        let erased_path = dir.join(format!("{stem}_removed.png"));
        let cutout_path = dir.join(format!("{stem}_object.png"));
        let cropped_path = dir.join(format!("{stem}_crop.png"));

        self.erased
            .save_with_format(&erased_path, image::ImageFormat::Png)?;
        self.cutout
            .save_with_format(&cutout_path, image::ImageFormat::Png)?;
        self.cropped
            .save_with_format(&cropped_path, image::ImageFormat::Png)?;

        Ok([erased_path, cutout_path, cropped_path])
    }
}

/// Per-stage timing breakdown for one pipeline run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageTimings {
    /// Image loading and decoding
    pub load_ms: u64,
    /// Model inference
    pub inference_ms: u64,
    /// Mask selection and binarization
    pub selection_ms: u64,
    /// Derived-image composition
    pub compose_ms: u64,
    /// Output encoding, when the run saved files
    pub encode_ms: Option<u64>,
    /// End-to-end wall time
    pub total_ms: u64,
}

impl StageTimings {
    /// One-line timing summary for logs
    #[must_use]
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "Total: {}ms | Load: {}ms | Inference: {}ms | Selection: {}ms | Compose: {}ms",
            self.total_ms, self.load_ms, self.inference_ms, self.selection_ms, self.compose_ms
        );
        if let Some(encode_ms) = self.encode_ms {
            summary.push_str(&format!(" | Encode: {encode_ms}ms"));
        }
        summary
    }
}

/// Result of one segmentation-and-cutout run
#[derive(Debug, Clone)]
pub struct CutoutResult {
    /// The three derived rasters
    pub outputs: DerivedOutputs,
    /// The selected occupancy mask
    pub mask: OccupancyMask,
    /// Confidence score of the winning candidate
    pub score: f32,
    /// Per-stage timings
    pub timings: StageTimings,
}

impl CutoutResult {
    /// Write the derived outputs as PNG and record the encoding time
    pub fn save_all<P: AsRef<Path>>(&mut self, dir: P, stem: &str) -> Result<[PathBuf; 3]> {
        let encode_start = instant::Instant::now();
        let paths = self.outputs.save_all(dir, stem)?;
        self.timings.encode_ms = Some(encode_start.elapsed().as_millis() as u64);
        Ok(paths)
    }
}
