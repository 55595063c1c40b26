//! Global and adaptive thresholding.
//!
//! Both operations work on a single channel; color input is converted to
//! grayscale first. The output is always a grayscale image.

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::blur::sigma_for_kernel;
use crate::handle::ImageHandle;
use crate::types::OperationError;

/// How a pixel compares against the threshold `t` with maximum value `m`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdKind {
    /// `v > t ? m : 0`
    Binary,
    /// `v > t ? 0 : m`
    #[default]
    BinaryInv,
    /// `v > t ? t : v`
    Trunc,
    /// `v > t ? v : 0`
    ToZero,
    /// `v > t ? 0 : v`
    ToZeroInv,
}

impl ThresholdKind {
    const fn apply(self, value: u8, threshold: u8, max: u8) -> u8 {
        let above = value > threshold;
        match self {
            Self::Binary => {
                if above {
                    max
                } else {
                    0
                }
            }
            Self::BinaryInv => {
                if above {
                    0
                } else {
                    max
                }
            }
            Self::Trunc => {
                if above {
                    threshold
                } else {
                    value
                }
            }
            Self::ToZero => {
                if above {
                    value
                } else {
                    0
                }
            }
            Self::ToZeroInv => {
                if above {
                    0
                } else {
                    value
                }
            }
        }
    }
}

/// Local mean estimator for adaptive thresholding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdaptiveMethod {
    /// Unweighted mean of the block.
    Mean,
    /// Gaussian-weighted mean of the block.
    #[default]
    Gaussian,
}

/// Apply a global threshold.
///
/// With `otsu` set, `lower` is ignored and the level is computed from the
/// image histogram.
#[must_use = "returns the thresholded image"]
pub fn threshold(
    image: ImageHandle,
    lower: u8,
    upper: u8,
    kind: ThresholdKind,
    otsu: bool,
) -> ImageHandle {
    let gray = image.into_gray();
    let level = if otsu {
        imageproc::contrast::otsu_level(&gray)
    } else {
        lower
    };
    tracing::trace!(level, upper, ?kind, otsu, "threshold");
    ImageHandle::from_gray(threshold_gray(&gray, level, upper, kind))
}

/// Per-pixel threshold on a grayscale buffer.
#[must_use = "returns the thresholded image"]
pub fn threshold_gray(image: &GrayImage, level: u8, max: u8, kind: ThresholdKind) -> GrayImage {
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        pixel.0[0] = kind.apply(pixel.0[0], level, max);
    }
    out
}

/// Threshold each pixel against the mean of its `size × size`
/// neighbourhood minus `constant`.
///
/// # Errors
///
/// Returns [`OperationError::InvalidParameter`] if `size` is not an odd
/// number of at least 3, or if `kind` is not binary or inverted binary.
pub fn adaptive_threshold(
    image: ImageHandle,
    upper: u8,
    method: AdaptiveMethod,
    kind: ThresholdKind,
    size: u32,
    constant: f64,
) -> Result<ImageHandle, OperationError> {
    if size < 3 || size % 2 == 0 {
        return Err(OperationError::InvalidParameter(format!(
            "adaptive threshold block size must be odd and at least 3, got {size}"
        )));
    }
    if !matches!(kind, ThresholdKind::Binary | ThresholdKind::BinaryInv) {
        return Err(OperationError::InvalidParameter(format!(
            "adaptive threshold supports binary and binary_inv, got {kind:?}"
        )));
    }

    let gray = image.into_gray();
    let mean = match method {
        AdaptiveMethod::Mean => {
            let radius = (size - 1) / 2;
            imageproc::filter::box_filter(&gray, radius, radius)
        }
        AdaptiveMethod::Gaussian => {
            imageproc::filter::gaussian_blur_f32(&gray, sigma_for_kernel(size))
        }
    };

    let mut out = gray;
    for (pixel, local) in out.pixels_mut().zip(mean.pixels()) {
        let diff = f64::from(pixel.0[0]) - f64::from(local.0[0]);
        let above = diff > -constant;
        pixel.0[0] = match (kind, above) {
            (ThresholdKind::Binary, true) | (ThresholdKind::BinaryInv, false) => upper,
            _ => 0,
        };
    }
    Ok(ImageHandle::from_gray(out))
}
