//! Quadrilateral corner extraction.
//!
//! Given a contour, find the minimum-area rotated rectangle that encloses
//! it and label its four vertices:
//!
//! | corner | rule |
//! |---|---|
//! | top-left | smallest `x + y` |
//! | bottom-right | largest `x + y` |
//! | top-right | smallest `y - x` |
//! | bottom-left | largest `y - x` |
//!
//! Ties go to the first vertex in `min_area_rect` order. Every corner is
//! then clamped into the reference canvas.
//!
//! The sum/difference rule is not rotation invariant: a rectangle turned
//! close to 45 degrees can have two vertices tie on one key, which may
//! label the same vertex twice. Document photos are rarely that skewed.

use serde::{Deserialize, Serialize};

use crate::contour::Contour;
use crate::types::{BoundingBox, Coordinate, CornerPoints, Dimensions};

/// Labelled corners plus the reference canvas box they were clamped
/// into. The box is what the warp should target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CornerResult {
    pub points: CornerPoints,
    pub bbox: BoundingBox,
}

impl CornerResult {
    /// The whole canvas, used when there is nothing to detect.
    #[must_use]
    pub fn canvas(canvas: Dimensions) -> Self {
        Self {
            points: CornerPoints::canvas(canvas),
            bbox: canvas.bounding_box(),
        }
    }
}

/// Extract the corners of `contour` relative to `canvas`.
///
/// A missing or empty contour yields the full-canvas corners.
#[must_use]
pub fn corner_points(contour: Option<&Contour>, canvas: Dimensions) -> CornerResult {
    let Some(vertices) = contour.and_then(Contour::min_area_rect) else {
        tracing::debug!("no contour, using full canvas");
        return CornerResult::canvas(canvas);
    };
    let vertices = vertices.map(|p| Coordinate::new(f64::from(p.x), f64::from(p.y)));
    classify(&vertices, canvas)
}

/// Label four rectangle vertices and clamp them into `canvas`.
#[must_use]
pub fn classify(vertices: &[Coordinate], canvas: Dimensions) -> CornerResult {
    let sums: Vec<f64> = vertices.iter().map(|p| p.x + p.y).collect();
    let diffs: Vec<f64> = vertices.iter().map(|p| p.y - p.x).collect();

    let (Some(tl), Some(tr), Some(bl), Some(br)) = (
        first_extreme(&sums, Extreme::Min),
        first_extreme(&diffs, Extreme::Min),
        first_extreme(&diffs, Extreme::Max),
        first_extreme(&sums, Extreme::Max),
    ) else {
        return CornerResult::canvas(canvas);
    };

    CornerResult {
        points: CornerPoints {
            top_left: vertices[tl].clamp_to(canvas),
            top_right: vertices[tr].clamp_to(canvas),
            bottom_left: vertices[bl].clamp_to(canvas),
            bottom_right: vertices[br].clamp_to(canvas),
        },
        bbox: canvas.bounding_box(),
    }
}

#[derive(Clone, Copy)]
enum Extreme {
    Min,
    Max,
}

/// Index of the first minimum or maximum.
///
/// `Iterator::min_by` keeps the first of equal elements but `max_by`
/// keeps the last, so both directions use an explicit strict comparison.
fn first_extreme(values: &[f64], extreme: Extreme) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, &v) in values.iter().enumerate() {
        let better = best.is_none_or(|b| match extreme {
            Extreme::Min => v < values[b],
            Extreme::Max => v > values[b],
        });
        if better {
            best = Some(i);
        }
    }
    best
}
