//! End-to-end pipeline tests with an injected mock predictor

use image::{Rgb, RgbImage};
use objcut::backends::test_utils::MockPredictor;
use objcut::{
    CandidateMask, CutoutConfig, CutoutProcessor, MaskPredictor, ObjcutError, PointPrompt,
    PredictorFactory, Result,
};

/// Factory returning a predictor with a fixed candidate list
struct FixedFactory {
    candidates: Vec<CandidateMask>,
}

impl PredictorFactory for FixedFactory {
    fn create_predictor(&self) -> Result<Box<dyn MaskPredictor>> {
        Ok(Box::new(MockPredictor::with_candidates(
            self.candidates.clone(),
        )))
    }
}

fn candidate(values: Vec<f32>, dims: (u32, u32), score: f32) -> CandidateMask {
    CandidateMask::new(values, dims, score).unwrap()
}

/// 10x10 candidate raster with high probability on rows 3-4 x cols 3-4
fn block_candidate(score: f32) -> CandidateMask {
    let values = (0..10u32)
        .flat_map(|y| {
            (0..10u32).map(move |x| {
                if (3..=4).contains(&x) && (3..=4).contains(&y) {
                    0.9
                } else {
                    0.1
                }
            })
        })
        .collect();
    candidate(values, (10, 10), score)
}

fn run(
    candidates: Vec<CandidateMask>,
    image: &RgbImage,
    prompt: PointPrompt,
) -> Result<objcut::CutoutResult> {
    let mut processor = CutoutProcessor::with_factory(
        CutoutConfig::default(),
        Box::new(FixedFactory { candidates }),
    );
    processor.process_image(image, prompt)
}

#[test]
fn reference_scenario_produces_expected_rasters() {
    let image = RgbImage::from_pixel(10, 10, Rgb([100, 100, 100]));
    let result = run(vec![block_candidate(0.9)], &image, PointPrompt::new(3, 3)).unwrap();

    // erased: all 100 except zeros in the 2x2 block
    for (x, y, pixel) in result.outputs.erased.enumerate_pixels() {
        let inside = (3..=4).contains(&x) && (3..=4).contains(&y);
        let expected = if inside { 0 } else { 100 };
        assert_eq!(pixel.0, [expected; 3], "erased pixel ({x}, {y})");
    }

    // cutout: alpha 255 inside the block, 0 elsewhere
    for (x, y, pixel) in result.outputs.cutout.enumerate_pixels() {
        let inside = (3..=4).contains(&x) && (3..=4).contains(&y);
        assert_eq!(pixel.0[3], if inside { 255 } else { 0 }, "alpha ({x}, {y})");
    }

    // cropped: 2x2 image of value 100
    assert_eq!(result.outputs.cropped.dimensions(), (2, 2));
    for pixel in result.outputs.cropped.pixels() {
        assert_eq!(pixel.0, [100, 100, 100]);
    }
}

#[test]
fn highest_scoring_candidate_wins() {
    let image = RgbImage::from_pixel(4, 1, Rgb([10, 10, 10]));
    let candidates = vec![
        candidate(vec![0.9, 0.9, 0.1, 0.1], (4, 1), 0.2),
        candidate(vec![0.1, 0.1, 0.9, 0.9], (4, 1), 0.8),
    ];

    let result = run(candidates, &image, PointPrompt::new(0, 0)).unwrap();
    assert!(!result.mask.contains(0, 0));
    assert!(result.mask.contains(2, 0));
    assert!((result.score - 0.8).abs() < f32::EPSILON);
}

#[test]
fn score_ties_resolve_to_first_candidate() {
    let image = RgbImage::from_pixel(2, 1, Rgb([10, 10, 10]));
    let candidates = vec![
        candidate(vec![0.9, 0.1], (2, 1), 0.5),
        candidate(vec![0.1, 0.9], (2, 1), 0.5),
    ];

    let result = run(candidates, &image, PointPrompt::new(0, 0)).unwrap();
    assert!(result.mask.contains(0, 0));
    assert!(!result.mask.contains(1, 0));
}

#[test]
fn all_below_threshold_yields_degenerate_outputs() {
    let image = RgbImage::from_pixel(6, 6, Rgb([55, 66, 77]));
    let candidates = vec![candidate(vec![0.2; 36], (6, 6), 0.9)];

    let result = run(candidates, &image, PointPrompt::new(2, 2)).unwrap();

    assert_eq!(result.mask.occupied_count(), 0);
    // Full-size zeroed crop, nothing erased, fully transparent cutout
    assert_eq!(result.outputs.cropped.dimensions(), (6, 6));
    assert!(result.outputs.cropped.pixels().all(|p| p.0 == [0, 0, 0]));
    assert_eq!(result.outputs.erased, image);
    assert!(result.outputs.cutout.pixels().all(|p| p.0[3] == 0));
}

#[test]
fn identical_inputs_produce_byte_identical_files() {
    let mut image = RgbImage::new(10, 10);
    for (x, y, pixel) in image.enumerate_pixels_mut() {
        *pixel = Rgb([(x * 20) as u8, (y * 20) as u8, ((x + y) * 10) as u8]);
    }

    let dir = tempfile::tempdir().unwrap();
    let mut paths = Vec::new();

    for run_index in 0..2 {
        let mut result = run(
            vec![block_candidate(0.9)],
            &image,
            PointPrompt::new(3, 4),
        )
        .unwrap();
        let out_dir = dir.path().join(format!("run{run_index}"));
        paths.push(result.save_all(&out_dir, "scene").unwrap());
    }

    for (first, second) in paths[0].iter().zip(paths[1].iter()) {
        let first_bytes = std::fs::read(first).unwrap();
        let second_bytes = std::fs::read(second).unwrap();
        assert_eq!(first_bytes, second_bytes, "{} differs", first.display());
    }
}

#[test]
fn empty_candidate_set_is_fatal() {
    struct EmptyFactory;
    impl PredictorFactory for EmptyFactory {
        fn create_predictor(&self) -> Result<Box<dyn MaskPredictor>> {
            Ok(Box::new(MockPredictor::returning_empty()))
        }
    }

    let mut processor =
        CutoutProcessor::with_factory(CutoutConfig::default(), Box::new(EmptyFactory));
    let image = RgbImage::new(5, 5);
    let err = processor
        .process_image(&image, PointPrompt::new(1, 1))
        .unwrap_err();
    assert!(matches!(err, ObjcutError::EmptyCandidateSet));
}

#[test]
fn saved_cutout_round_trips_with_alpha() {
    let image = RgbImage::from_pixel(10, 10, Rgb([100, 100, 100]));
    let mut result = run(vec![block_candidate(0.9)], &image, PointPrompt::new(3, 3)).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let [_, cutout_path, _] = result.save_all(dir.path(), "car").unwrap();

    let reloaded = image::open(&cutout_path).unwrap().to_rgba8();
    assert_eq!(reloaded.dimensions(), (10, 10));
    assert_eq!(reloaded.get_pixel(3, 3).0, [100, 100, 100, 255]);
    assert_eq!(reloaded.get_pixel(0, 0).0[3], 0);
}
