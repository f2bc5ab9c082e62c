//! Confidence-based selection among candidate masks
//!
//! The segmentation model proposes several object boundaries per prompt; this
//! module picks the single best one and binarizes it into an occupancy mask.

use crate::error::{ObjcutError, Result};
use crate::types::{CandidateMask, OccupancyMask};

/// Raw mask values strictly greater than this are treated as object pixels
pub const MASK_THRESHOLD: f32 = 0.5;

/// Select the highest-scoring candidate and binarize it
///
/// `expected_dimensions` is the source image's (width, height); every
/// candidate is validated against it before any selection happens, so a
/// malformed candidate aborts the run even when it would not have won.
/// Ties on the maximal score resolve to the first candidate in input order.
///
/// # Errors
/// - [`ObjcutError::EmptyCandidateSet`] when `candidates` is empty
/// - [`ObjcutError::ShapeMismatch`] when any candidate's dimensions differ
///   from `expected_dimensions`
pub fn select_mask(
    candidates: &[CandidateMask],
    expected_dimensions: (u32, u32),
) -> Result<OccupancyMask> {
    if candidates.is_empty() {
        return Err(ObjcutError::EmptyCandidateSet);
    }

    for candidate in candidates {
        if candidate.dimensions != expected_dimensions {
            return Err(ObjcutError::shape_mismatch(
                expected_dimensions,
                candidate.dimensions,
            ));
        }
    }

    // Stable argmax: strictly-greater keeps the earliest maximum
    let mut best = 0;
    for (idx, candidate) in candidates.iter().enumerate().skip(1) {
        if candidate.score > candidates[best].score {
            best = idx;
        }
    }

    let winner = &candidates[best];
    log::debug!(
        "Selected candidate {} of {} (score {:.4})",
        best,
        candidates.len(),
        winner.score
    );

    binarize(winner)
}

/// Threshold a candidate's raw values into a boolean occupancy mask
pub fn binarize(candidate: &CandidateMask) -> Result<OccupancyMask> {
    let data = candidate
        .data
        .iter()
        .map(|&value| value > MASK_THRESHOLD)
        .collect();
    OccupancyMask::new(data, candidate.dimensions)
}
