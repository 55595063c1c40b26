//! Whole-image measurements and canvas helpers.
//!
//! The measurement functions run their preprocessing through an
//! [`ImageProcessor`], so they need an initialized [`Runtime`].

use image::imageops;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::handle::ImageHandle;
use crate::operations::{BlurOptions, ResizeOptions};
use crate::processor::ImageProcessor;
use crate::runtime::Runtime;
use crate::types::{BoundingBox, Dimensions, PipelineError};

/// Mean pixel value (0-255) after the default blur and grayscale
/// conversion.
///
/// # Errors
///
/// Propagates operation errors from the blur or grayscale step.
pub fn mean_grayscale_value(
    runtime: &Runtime,
    image: impl Into<ImageHandle>,
) -> Result<f64, PipelineError> {
    let mut processor = ImageProcessor::new(runtime, image);
    processor.blur(BlurOptions::default())?.grayscale()?;
    let gray = processor.into_handle()?.into_gray();

    let mean = mean(gray.as_raw().iter().map(|&v| f64::from(v)));
    debug!(mean, "mean grayscale value");
    Ok(mean)
}

/// Mean CIE L* lightness after resizing to `dimensions`, with each pixel
/// divided by the brightest pixel first. The result is in `[0, 1]`; an
/// all-black image gives 0.
///
/// # Errors
///
/// Propagates resize errors, including a zero target size.
pub fn mean_normalized_lab_lightness(
    runtime: &Runtime,
    image: impl Into<ImageHandle>,
    dimensions: Dimensions,
) -> Result<f64, PipelineError> {
    let mut processor = ImageProcessor::new(runtime, image);
    processor.resize(ResizeOptions {
        width: dimensions.width,
        height: dimensions.height,
    })?;
    let rgba = processor.into_handle()?.into_rgba();

    let lightness: Vec<f64> = rgba
        .pixels()
        .map(|p| lab_lightness(p.0[0], p.0[1], p.0[2]))
        .collect();
    let max = lightness.iter().copied().fold(0.0, f64::max);
    if max <= 0.0 {
        return Ok(0.0);
    }

    let mean = mean(lightness.iter().map(|l| l / max));
    debug!(mean, max, "mean normalized lightness");
    Ok(mean)
}

/// Copy the part of `image` inside `bbox`. The box is clamped to the
/// image first, so an out-of-range box yields a smaller (possibly empty)
/// image rather than an error.
#[must_use]
pub fn crop(image: ImageHandle, bbox: BoundingBox) -> ImageHandle {
    let clamped = clamp_box(bbox, image.dimensions());
    let (x, y, w, h) = (clamped.x0, clamped.y0, clamped.width(), clamped.height());
    image.map(
        |gray| imageops::crop_imm(&gray, x, y, w, h).to_image(),
        |rgba| imageops::crop_imm(&rgba, x, y, w, h).to_image(),
    )
}

/// Settings for [`is_dirty`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirtyCheck {
    /// A pixel is white when every color channel is at least this.
    pub threshold: f64,
    /// Share of the majority color below which the image is dirty.
    pub major_color_threshold: f64,
}

impl DirtyCheck {
    pub const DEFAULT_THRESHOLD: f64 = 127.5;
    pub const DEFAULT_MAJOR_COLOR_THRESHOLD: f64 = 0.97;
}

impl Default for DirtyCheck {
    fn default() -> Self {
        Self {
            threshold: Self::DEFAULT_THRESHOLD,
            major_color_threshold: Self::DEFAULT_MAJOR_COLOR_THRESHOLD,
        }
    }
}

/// Whether a (nominally binary) image is mixed rather than dominated by
/// one color.
///
/// Only the central 80% of each axis is inspected, which skips scanner
/// edges and rectification borders. An empty region is never dirty.
#[must_use]
pub fn is_dirty(image: &ImageHandle, check: DirtyCheck) -> bool {
    let Dimensions { width, height } = image.dimensions();
    let region = BoundingBox {
        x0: width / 10,
        y0: height / 10,
        x1: width - width / 10,
        y1: height - height / 10,
    };

    let is_white = |channels: &[u8]| channels.iter().all(|&c| f64::from(c) >= check.threshold);
    let (mut white, mut black) = (0_u64, 0_u64);
    for y in region.y0..region.y1 {
        for x in region.x0..region.x1 {
            if is_white(image.color_at(x, y)) {
                white += 1;
            } else {
                black += 1;
            }
        }
    }

    let total = white + black;
    if total == 0 {
        return false;
    }
    #[allow(clippy::cast_precision_loss)]
    let ratio = white.max(black) as f64 / total as f64;
    debug!(white, black, ratio, "dirty check");
    ratio < check.major_color_threshold
}

fn clamp_box(bbox: BoundingBox, dimensions: Dimensions) -> BoundingBox {
    let x1 = bbox.x1.min(dimensions.width);
    let y1 = bbox.y1.min(dimensions.height);
    BoundingBox {
        x0: bbox.x0.min(x1),
        y0: bbox.y0.min(y1),
        x1,
        y1,
    }
}

/// CIE L* (0-100) of an sRGB color under D65.
fn lab_lightness(r: u8, g: u8, b: u8) -> f64 {
    let luminance = 0.212_6 * srgb_to_linear(r)
        + 0.715_2 * srgb_to_linear(g)
        + 0.072_2 * srgb_to_linear(b);
    if luminance > 0.008_856 {
        116.0f64.mul_add(luminance.cbrt(), -16.0)
    } else {
        903.3 * luminance
    }
}

fn srgb_to_linear(channel: u8) -> f64 {
    let c = f64::from(channel) / 255.0;
    if c <= 0.040_45 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0_u64), |(s, n), v| (s + v, n + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}
