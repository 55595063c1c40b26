//! warpline-pipeline: registry-driven raster operations and perspective
//! rectification (sans-IO).
//!
//! Images flow through named operations looked up in an
//! [`OperationRegistry`]. A [`Runtime`] freezes the registry with the
//! built-in operations:
//!
//! grayscale, blur, threshold, adaptive_threshold, canny, border, erode,
//! dilate, morphological_gradient, resize, rotate, convert, warp, invert.
//!
//! An [`ImageProcessor`] chains those operations over one owned
//! [`ImageHandle`]. [`ContourSet`] traces borders in a binary image and
//! extracts the labelled corners of the largest one, and [`rectify`]
//! strings everything together into document rectification:
//! grayscale -> blur -> threshold -> contours -> corners -> warp.
//!
//! This crate has **no I/O dependencies**. It operates on in-memory byte
//! slices and images and logs through `tracing` without installing a
//! subscriber.

pub mod analysis;
pub mod blur;
pub mod border;
pub mod contour;
pub mod corners;
pub mod edge;
pub mod grayscale;
pub mod handle;
pub mod morphology;
pub mod operations;
pub mod processor;
pub mod rectify;
pub mod registry;
pub mod runtime;
pub mod threshold;
pub mod transform;
pub mod types;

pub use analysis::{DirtyCheck, crop, is_dirty, mean_grayscale_value, mean_normalized_lab_lightness};
pub use contour::{Contour, ContourOptions, ContourSet, CornerOptions};
pub use corners::CornerResult;
pub use handle::{ImageHandle, PixelLayout};
pub use operations::{OperationRequest, register_builtins};
pub use processor::ImageProcessor;
pub use rectify::{
    PipelineConfig, PipelineStep, Rectifier, RectifyConfig, RectifyResult, rectify, rectify_image,
};
pub use registry::{Operation, OperationRegistry, Options};
pub use runtime::Runtime;
pub use types::{
    BoundingBox, Coordinate, CornerPoints, Dimensions, GrayImage, OperationError, PipelineError,
    RgbaImage,
};
