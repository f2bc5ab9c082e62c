//! Derivation of the output rasters from a source image and its occupancy mask
//!
//! All three outputs are freshly allocated; the caller's source buffer is
//! never aliased or mutated. Composition is a pure function of (image, mask).

use crate::error::{ObjcutError, Result};
use crate::types::{DerivedOutputs, OccupancyMask};
use image::{Rgb, RgbImage, Rgba, RgbaImage};

/// Produce all three derived rasters from one source image and mask
///
/// # Errors
/// [`ObjcutError::ShapeMismatch`] when the mask dimensions differ from the
/// image dimensions.
pub fn derive_outputs(image: &RgbImage, mask: &OccupancyMask) -> Result<DerivedOutputs> {
    check_dimensions(image, mask)?;

    Ok(DerivedOutputs {
        erased: erase_object(image, mask),
        cutout: cutout_object(image, mask),
        cropped: crop_object(image, mask),
    })
}

/// Copy of the source with every object pixel set to black
#[must_use]
pub fn erase_object(image: &RgbImage, mask: &OccupancyMask) -> RgbImage {
    let mut erased = image.clone();
    for (x, y, pixel) in erased.enumerate_pixels_mut() {
        if mask.contains(x, y) {
            *pixel = Rgb([0, 0, 0]);
        }
    }
    erased
}

/// Source RGB with an alpha channel: 255 on object pixels, 0 elsewhere
#[must_use]
pub fn cutout_object(image: &RgbImage, mask: &OccupancyMask) -> RgbaImage {
    let (width, height) = image.dimensions();
    let mut cutout = RgbaImage::new(width, height);
    for (x, y, pixel) in cutout.enumerate_pixels_mut() {
        let Rgb([r, g, b]) = *image.get_pixel(x, y);
        let alpha = if mask.contains(x, y) { 255 } else { 0 };
        *pixel = Rgba([r, g, b, alpha]);
    }
    cutout
}

/// Object pixels cropped to their tight bounding box
///
/// Pixels inside the box that are not part of the object are black. An
/// all-false mask is a defined degenerate case, not an error: the result is
/// a full-frame image with every pixel zeroed.
#[must_use]
pub fn crop_object(image: &RgbImage, mask: &OccupancyMask) -> RgbImage {
    match mask.bounding_box() {
        Some((min_x, min_y, max_x, max_y)) => {
            let mut cropped = RgbImage::new(max_x - min_x + 1, max_y - min_y + 1);
            for (x, y, pixel) in cropped.enumerate_pixels_mut() {
                let src_x = min_x + x;
                let src_y = min_y + y;
                if mask.contains(src_x, src_y) {
                    *pixel = *image.get_pixel(src_x, src_y);
                }
            }
            cropped
        },
        None => RgbImage::new(image.width(), image.height()),
    }
}

fn check_dimensions(image: &RgbImage, mask: &OccupancyMask) -> Result<()> {
    if image.dimensions() != mask.dimensions {
        return Err(ObjcutError::shape_mismatch(
            image.dimensions(),
            mask.dimensions,
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform_image(width: u32, height: u32, value: u8) -> RgbImage {
        RgbImage::from_pixel(width, height, Rgb([value, value, value]))
    }

    fn block_mask(width: u32, height: u32, x0: u32, y0: u32, x1: u32, y1: u32) -> OccupancyMask {
        let data = (0..height)
            .flat_map(|y| (0..width).map(move |x| x >= x0 && x <= x1 && y >= y0 && y <= y1))
            .collect();
        OccupancyMask::new(data, (width, height)).unwrap()
    }

    #[test]
    fn test_reference_scenario() {
        // 10x10 all-100 source, object on rows 3-4 x cols 3-4
        let image = uniform_image(10, 10, 100);
        let mask = block_mask(10, 10, 3, 3, 4, 4);

        let outputs = derive_outputs(&image, &mask).unwrap();

        for (x, y, pixel) in outputs.erased.enumerate_pixels() {
            let expected = if (3..=4).contains(&x) && (3..=4).contains(&y) {
                Rgb([0, 0, 0])
            } else {
                Rgb([100, 100, 100])
            };
            assert_eq!(*pixel, expected, "erased mismatch at ({x}, {y})");
        }

        for (x, y, pixel) in outputs.cutout.enumerate_pixels() {
            let expected_alpha = if (3..=4).contains(&x) && (3..=4).contains(&y) {
                255
            } else {
                0
            };
            assert_eq!(pixel.0, [100, 100, 100, expected_alpha]);
        }

        assert_eq!(outputs.cropped.dimensions(), (2, 2));
        for pixel in outputs.cropped.pixels() {
            assert_eq!(*pixel, Rgb([100, 100, 100]));
        }
    }

    #[test]
    fn test_erased_and_cutout_are_complementary() {
        let image = uniform_image(6, 4, 80);
        let mask = block_mask(6, 4, 1, 0, 2, 3);
        let outputs = derive_outputs(&image, &mask).unwrap();

        // Every pixel is either erased to black or retained from the source,
        // consistent with the mask, and the cutout alpha agrees.
        for y in 0..4 {
            for x in 0..6 {
                let inside = mask.contains(x, y);
                let erased = *outputs.erased.get_pixel(x, y);
                let alpha = outputs.cutout.get_pixel(x, y).0[3];
                if inside {
                    assert_eq!(erased, Rgb([0, 0, 0]));
                    assert_eq!(alpha, 255);
                } else {
                    assert_eq!(erased, *image.get_pixel(x, y));
                    assert_eq!(alpha, 0);
                }
            }
        }
    }

    #[test]
    fn test_crop_masks_out_non_object_pixels_inside_box() {
        let image = uniform_image(5, 5, 200);
        // L-shaped object: bounding box includes pixels outside the mask
        let mut data = vec![false; 25];
        for y in 1..=3 {
            data[5 * y + 1] = true;
        }
        data[5 * 3 + 3] = true;
        let mask = OccupancyMask::new(data, (5, 5)).unwrap();

        let cropped = crop_object(&image, &mask);
        assert_eq!(cropped.dimensions(), (3, 3));

        // (2, 0) in crop space maps to (3, 1): inside the box, outside the mask
        assert_eq!(*cropped.get_pixel(2, 0), Rgb([0, 0, 0]));
        // (0, 0) maps to (1, 1): object pixel retained
        assert_eq!(*cropped.get_pixel(0, 0), Rgb([200, 200, 200]));
    }

    #[test]
    fn test_all_false_mask_degenerate_crop() {
        let image = uniform_image(7, 3, 50);
        let mask = OccupancyMask::new(vec![false; 21], (7, 3)).unwrap();

        let outputs = derive_outputs(&image, &mask).unwrap();
        assert_eq!(outputs.cropped.dimensions(), (7, 3));
        for pixel in outputs.cropped.pixels() {
            assert_eq!(*pixel, Rgb([0, 0, 0]));
        }
        // The other outputs degrade gracefully too
        assert_eq!(outputs.erased, image);
        assert!(outputs.cutout.pixels().all(|p| p.0[3] == 0));
    }

    #[test]
    fn test_source_is_not_mutated() {
        let image = uniform_image(4, 4, 90);
        let reference = image.clone();
        let mask = block_mask(4, 4, 0, 0, 3, 3);

        let _ = derive_outputs(&image, &mask).unwrap();
        assert_eq!(image, reference);
    }

    #[test]
    fn test_dimension_mismatch() {
        let image = uniform_image(4, 4, 90);
        let mask = OccupancyMask::new(vec![false; 20], (5, 4)).unwrap();
        assert!(matches!(
            derive_outputs(&image, &mask),
            Err(ObjcutError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_single_pixel_object() {
        let image = uniform_image(3, 3, 10);
        let mask = block_mask(3, 3, 2, 2, 2, 2);
        let cropped = crop_object(&image, &mask);
        assert_eq!(cropped.dimensions(), (1, 1));
        assert_eq!(*cropped.get_pixel(0, 0), Rgb([10, 10, 10]));
    }
}
