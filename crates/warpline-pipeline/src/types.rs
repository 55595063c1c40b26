//! Shared types for the warpline pipeline.

use serde::{Deserialize, Serialize};

/// Re-export `GrayImage` so downstream crates can build single-channel
/// sources without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbaImage` so downstream crates can read back processor
/// output without depending on `image` directly.
pub use image::RgbaImage;

/// A 2D point in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Coordinate {
    /// Create a new coordinate.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Clamp both axes into `[0, width] × [0, height]`.
    #[must_use]
    pub fn clamp_to(self, dimensions: Dimensions) -> Self {
        Self {
            x: self.x.clamp(0.0, f64::from(dimensions.width)),
            y: self.y.clamp(0.0, f64::from(dimensions.height)),
        }
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Create new dimensions.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// The bounding box covering the whole canvas, `(0, 0)` to
    /// `(width, height)`.
    #[must_use]
    pub const fn bounding_box(self) -> BoundingBox {
        BoundingBox {
            x0: 0,
            y0: 0,
            x1: self.width,
            y1: self.height,
        }
    }
}

/// Axis-aligned rectangle `{x0, y0, x1, y1}` with `x1 >= x0` and
/// `y1 >= y0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge.
    pub x0: u32,
    /// Top edge.
    pub y0: u32,
    /// Right edge (exclusive when used as a pixel range).
    pub x1: u32,
    /// Bottom edge (exclusive when used as a pixel range).
    pub y1: u32,
}

impl BoundingBox {
    /// Horizontal extent, `x1 - x0` (zero if the box is inverted).
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.x1.saturating_sub(self.x0)
    }

    /// Vertical extent, `y1 - y0` (zero if the box is inverted).
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.y1.saturating_sub(self.y0)
    }
}

/// Four semantically classified corners of a quadrilateral.
///
/// The labels come from the corner classification heuristic in
/// [`crate::corners`], not from vertex order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CornerPoints {
    pub top_left: Coordinate,
    pub top_right: Coordinate,
    pub bottom_left: Coordinate,
    pub bottom_right: Coordinate,
}

impl CornerPoints {
    /// The four corners of a full canvas of the given size.
    #[must_use]
    pub fn canvas(dimensions: Dimensions) -> Self {
        let w = f64::from(dimensions.width);
        let h = f64::from(dimensions.height);
        Self {
            top_left: Coordinate::new(0.0, 0.0),
            top_right: Coordinate::new(w, 0.0),
            bottom_left: Coordinate::new(0.0, h),
            bottom_right: Coordinate::new(w, h),
        }
    }

    /// Corners in perspective-warp source order: top-left, top-right,
    /// bottom-right, bottom-left.
    #[must_use]
    pub const fn clockwise(&self) -> [Coordinate; 4] {
        [
            self.top_left,
            self.top_right,
            self.bottom_right,
            self.bottom_left,
        ]
    }
}

/// Errors raised by an individual operation kernel.
///
/// The registry wraps these in [`PipelineError::Execution`] together
/// with the name of the operation that failed.
#[derive(Debug, thiserror::Error)]
pub enum OperationError {
    /// An option value is outside the range the kernel accepts.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The source and destination quadrilaterals admit no projective
    /// mapping (collinear or coincident points).
    #[error("degenerate perspective transform")]
    DegenerateTransform,
}

/// Errors that can occur while building or running a pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The requested operation name is not registered.
    #[error("operation \"{0}\" not found")]
    OperationNotFound(String),

    /// The processor source is not a supported image.
    #[error("invalid source: {0}")]
    InvalidSource(String),

    /// Contour detection (or another consumer) received an image of the
    /// wrong shape.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A required option was not supplied.
    #[error("operation \"{operation}\" requires parameter \"{parameter}\"")]
    MissingParameter {
        operation: String,
        parameter: String,
    },

    /// An option could not be interpreted for this operation.
    #[error("invalid options for \"{operation}\": {message}")]
    InvalidParameter { operation: String, message: String },

    /// The operation kernel failed.
    #[error("operation \"{operation}\" failed: {source}")]
    Execution {
        operation: String,
        #[source]
        source: OperationError,
    },

    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// No contour was found and falling back to the full canvas is
    /// disabled.
    #[error("no contours found in image")]
    NoContours,

    /// The processor no longer owns an image, either because it was
    /// destroyed or because an earlier operation failed mid-chain.
    #[error("image processor has been released")]
    Released,

    /// Pipeline configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn coordinate_clamp_inside_is_unchanged() {
        let c = Coordinate::new(3.5, 4.0).clamp_to(Dimensions::new(10, 10));
        assert_eq!(c, Coordinate::new(3.5, 4.0));
    }

    #[test]
    fn coordinate_clamp_outside_hits_edges() {
        let dims = Dimensions::new(10, 8);
        assert_eq!(
            Coordinate::new(-2.0, 9.5).clamp_to(dims),
            Coordinate::new(0.0, 8.0)
        );
        assert_eq!(
            Coordinate::new(12.0, -0.1).clamp_to(dims),
            Coordinate::new(10.0, 0.0)
        );
    }

    #[test]
    fn canvas_bounding_box() {
        let bbox = Dimensions::new(6, 8).bounding_box();
        assert_eq!(
            bbox,
            BoundingBox {
                x0: 0,
                y0: 0,
                x1: 6,
                y1: 8
            }
        );
        assert_eq!(bbox.width(), 6);
        assert_eq!(bbox.height(), 8);
    }

    #[test]
    fn inverted_bounding_box_has_zero_extent() {
        let bbox = BoundingBox {
            x0: 5,
            y0: 5,
            x1: 2,
            y1: 9,
        };
        assert_eq!(bbox.width(), 0);
        assert_eq!(bbox.height(), 4);
    }

    #[test]
    fn canvas_corner_points() {
        let points = CornerPoints::canvas(Dimensions::new(6, 8));
        assert_eq!(points.top_left, Coordinate::new(0.0, 0.0));
        assert_eq!(points.top_right, Coordinate::new(6.0, 0.0));
        assert_eq!(points.bottom_left, Coordinate::new(0.0, 8.0));
        assert_eq!(points.bottom_right, Coordinate::new(6.0, 8.0));
    }

    #[test]
    fn clockwise_order_matches_warp_source_order() {
        let points = CornerPoints::canvas(Dimensions::new(2, 3));
        let [a, b, c, d] = points.clockwise();
        assert_eq!(a, points.top_left);
        assert_eq!(b, points.top_right);
        assert_eq!(c, points.bottom_right);
        assert_eq!(d, points.bottom_left);
    }

    #[test]
    fn error_operation_not_found_echoes_name() {
        let err = PipelineError::OperationNotFound("missing-op".to_string());
        assert_eq!(err.to_string(), "operation \"missing-op\" not found");
    }

    #[test]
    fn error_missing_parameter_display() {
        let err = PipelineError::MissingParameter {
            operation: "resize".to_string(),
            parameter: "width".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "operation \"resize\" requires parameter \"width\""
        );
    }

    #[test]
    fn error_execution_keeps_source() {
        let err = PipelineError::Execution {
            operation: "warp".to_string(),
            source: OperationError::DegenerateTransform,
        };
        assert_eq!(
            err.to_string(),
            "operation \"warp\" failed: degenerate perspective transform"
        );
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn corner_points_serde_round_trip() {
        let points = CornerPoints::canvas(Dimensions::new(4, 4));
        let json = serde_json::to_string(&points).unwrap();
        let deserialized: CornerPoints = serde_json::from_str(&json).unwrap();
        assert_eq!(points, deserialized);
    }
}
