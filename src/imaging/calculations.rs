//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.
//!
//! Ratios are computed in `f32` and the scaled side is truncated toward zero,
//! never rounded. Outputs must match previously generated variants pixel for
//! pixel, so do not "fix" this to `.round()`.

use super::params::TargetSpec;
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanError {
    #[error("image has a zero dimension ({width}x{height})")]
    ZeroDimension { width: u32, height: u32 },
    #[error("scaling {width}x{height} collapses one side to zero pixels")]
    Collapsed { width: u32, height: u32 },
    #[error("cannot crop {box_width}x{box_height} out of a {width}x{height} image")]
    CropOutOfRange {
        width: u32,
        height: u32,
        box_width: u32,
        box_height: u32,
    },
}

fn check_non_zero(width: u32, height: u32) -> Result<(), PlanError> {
    if width == 0 || height == 0 {
        return Err(PlanError::ZeroDimension { width, height });
    }
    Ok(())
}

/// `side * numerator / denominator`, with the ratio in single precision and
/// the product truncated.
fn scale_side(side: u32, numerator: u32, denominator: u32) -> u32 {
    let ratio = numerator as f32 / denominator as f32;
    (side as f32 * ratio) as u32
}

fn positive(planned: (u32, u32), original: (u32, u32)) -> Result<(u32, u32), PlanError> {
    if planned.0 == 0 || planned.1 == 0 {
        return Err(PlanError::Collapsed {
            width: original.0,
            height: original.1,
        });
    }
    Ok(planned)
}

/// Cap the longer side at `max_side`, preserving aspect ratio.
///
/// Images that already fit are returned unchanged (no upscaling). Square
/// images take the portrait branch, so both sides become `max_side`.
///
/// # Examples
/// ```
/// # use thumbkit::imaging::plan_max_side;
/// assert_eq!(plan_max_side(2000, 1000, 1280), Ok((1280, 640)));
/// assert_eq!(plan_max_side(400, 600, 1280), Ok((400, 600)));
/// ```
pub fn plan_max_side(width: u32, height: u32, max_side: u32) -> Result<(u32, u32), PlanError> {
    check_non_zero(width, height)?;

    let planned = if width > height && width > max_side {
        (max_side, scale_side(max_side, height, width))
    } else if height > max_side {
        (scale_side(max_side, width, height), max_side)
    } else {
        (width, height)
    };

    positive(planned, (width, height))
}

/// Scale so the *shorter* side equals `max_side`.
///
/// Unlike [`plan_max_side`] this always scales, up or down, so the result
/// can be center-cropped to any box no larger than `max_side` on either axis.
///
/// # Examples
/// ```
/// # use thumbkit::imaging::plan_thumbnail_box;
/// assert_eq!(plan_thumbnail_box(1280, 640, 500), Ok((1000, 500)));
/// assert_eq!(plan_thumbnail_box(400, 600, 500), Ok((500, 750)));
/// ```
pub fn plan_thumbnail_box(
    width: u32,
    height: u32,
    max_side: u32,
) -> Result<(u32, u32), PlanError> {
    check_non_zero(width, height)?;

    let planned = if width < height {
        (max_side, scale_side(max_side, height, width))
    } else {
        (scale_side(max_side, width, height), max_side)
    };

    positive(planned, (width, height))
}

/// Origin of a centered `box_width x box_height` crop.
///
/// Margins are split with truncating division, so an odd surplus leaves the
/// extra pixel on the right/bottom. A box larger than the image is an error.
pub fn plan_center_crop(
    width: u32,
    height: u32,
    box_width: u32,
    box_height: u32,
) -> Result<(u32, u32), PlanError> {
    if width < box_width || height < box_height {
        return Err(PlanError::CropOutOfRange {
            width,
            height,
            box_width,
            box_height,
        });
    }
    Ok(((width - box_width) / 2, (height - box_height) / 2))
}

/// Resize dimensions for a [`TargetSpec`].
///
/// For [`TargetSpec::FixedBox`] this is the cover size *before* the crop.
pub fn plan_resize(original: (u32, u32), target: TargetSpec) -> Result<(u32, u32), PlanError> {
    let (width, height) = original;
    match target {
        TargetSpec::MaxSide(n) => plan_max_side(width, height, n),
        TargetSpec::FixedBox(box_w, box_h) => plan_thumbnail_box(width, height, box_w.max(box_h)),
    }
}
