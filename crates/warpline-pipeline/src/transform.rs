//! Geometric transforms: resize, rotation, and perspective warp.
//!
//! All three sample bilinearly. Pixels that map outside the source are
//! filled with zero (black for gray, transparent black for RGBA).

use image::imageops::FilterType;
use image::{Luma, Rgba};
use imageproc::geometric_transformations::{self, Interpolation, Projection};

use crate::handle::ImageHandle;
use crate::types::{BoundingBox, Coordinate, CornerPoints, GrayImage, OperationError, RgbaImage};

/// Resample to exactly `width × height`.
///
/// # Errors
///
/// Returns [`OperationError::InvalidParameter`] if either dimension is
/// zero.
pub fn resize(image: ImageHandle, width: u32, height: u32) -> Result<ImageHandle, OperationError> {
    if width == 0 || height == 0 {
        return Err(OperationError::InvalidParameter(format!(
            "resize target must be non-empty, got {width}x{height}"
        )));
    }
    Ok(image.map(
        |gray| image::imageops::resize(&gray, width, height, FilterType::Triangle),
        |rgba| image::imageops::resize(&rgba, width, height, FilterType::Triangle),
    ))
}

/// Rotate by `angle` degrees (positive is counter-clockwise) about
/// `center`, or about the image center when `None`. The output keeps the
/// input size.
#[must_use = "returns the rotated image"]
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn rotate(image: ImageHandle, angle: f64, center: Option<Coordinate>) -> ImageHandle {
    if angle == 0.0 {
        return image;
    }
    let center = center.map_or_else(
        || (image.width() as f32 / 2.0, image.height() as f32 / 2.0),
        |c| (c.x as f32, c.y as f32),
    );
    // imageproc rotates clockwise for positive theta.
    let theta = -(angle.to_radians() as f32);
    image.map(
        |gray| {
            geometric_transformations::rotate(
                &gray,
                center,
                theta,
                Interpolation::Bilinear,
                Luma([0]),
            )
        },
        |rgba| {
            geometric_transformations::rotate(
                &rgba,
                center,
                theta,
                Interpolation::Bilinear,
                Rgba([0, 0, 0, 0]),
            )
        },
    )
}

/// Map the quadrilateral `points` onto an upright `bbox.width() ×
/// bbox.height()` canvas.
///
/// Source corners are taken in top-left, top-right, bottom-right,
/// bottom-left order and land on `(0, 0)`, `(w - 1, 0)`,
/// `(w - 1, h - 1)`, `(0, h - 1)`.
///
/// # Errors
///
/// Returns [`OperationError::InvalidParameter`] for an empty `bbox` and
/// [`OperationError::DegenerateTransform`] when no projective mapping
/// exists between the two quadrilaterals.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn warp(
    image: ImageHandle,
    points: &CornerPoints,
    bbox: BoundingBox,
) -> Result<ImageHandle, OperationError> {
    let (width, height) = (bbox.width(), bbox.height());
    if width == 0 || height == 0 {
        return Err(OperationError::InvalidParameter(format!(
            "warp target must be non-empty, got {width}x{height}"
        )));
    }

    let corners = points.clockwise();
    // A single row or column collapses the destination quad.
    if width < 2 || height < 2 || quad_area(&corners) < f64::EPSILON {
        return Err(OperationError::DegenerateTransform);
    }

    let from = corners.map(|c| (c.x as f32, c.y as f32));
    let right = (width - 1) as f32;
    let bottom = (height - 1) as f32;
    let to = [(0.0, 0.0), (right, 0.0), (right, bottom), (0.0, bottom)];

    let projection =
        Projection::from_control_points(from, to).ok_or(OperationError::DegenerateTransform)?;

    tracing::debug!(width, height, "perspective warp");
    Ok(image.map(
        |gray| {
            let mut out = GrayImage::new(width, height);
            geometric_transformations::warp_into(
                &gray,
                &projection,
                Interpolation::Bilinear,
                Luma([0]),
                &mut out,
            );
            out
        },
        |rgba| {
            let mut out = RgbaImage::new(width, height);
            geometric_transformations::warp_into(
                &rgba,
                &projection,
                Interpolation::Bilinear,
                Rgba([0, 0, 0, 0]),
                &mut out,
            );
            out
        },
    ))
}

/// Absolute shoelace area of a closed polygon.
fn quad_area(corners: &[Coordinate; 4]) -> f64 {
    let twice: f64 = (0..4)
        .map(|i| {
            let (a, b) = (corners[i], corners[(i + 1) % 4]);
            a.x.mul_add(b.y, -(b.x * a.y))
        })
        .sum();
    (twice / 2.0).abs()
}
