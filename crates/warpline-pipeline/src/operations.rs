//! The built-in operation set.
//!
//! Each operation is a zero-sized type implementing [`Operation`] with a
//! serde options struct. Defaultable operations fill in any field the
//! caller leaves out; `resize`, `convert`, and `warp` have no defaults
//! and reject a call that omits a required field.
//!
//! [`OperationRequest`] is the closed, typed view of the same set: one
//! variant per built-in, each carrying its options struct.

use serde::{Deserialize, Serialize};

use crate::border::BorderKind;
use crate::handle::{ImageHandle, PixelLayout};
use crate::registry::{Operation, OperationRegistry, Options, to_options};
use crate::threshold::{AdaptiveMethod, ThresholdKind};
use crate::types::{BoundingBox, Coordinate, CornerPoints, OperationError, PipelineError};
use crate::{blur, border, edge, grayscale, morphology, threshold, transform};

/// Options for [`Grayscale`] (none).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GrayscaleOptions {}

/// Options for [`Invert`] (none).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InvertOptions {}

/// Options for [`Blur`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlurOptions {
    /// Kernel size `[width, height]`; both odd.
    pub size: [u32; 2],
    /// Gaussian sigma; `0` derives it from `size`.
    pub sigma: f64,
}

impl Default for BlurOptions {
    fn default() -> Self {
        Self {
            size: [5, 5],
            sigma: 0.0,
        }
    }
}

/// Options for [`Threshold`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdOptions {
    /// Threshold level (ignored when `otsu` is set).
    pub lower: u8,
    /// Value written for pixels that pass.
    pub upper: u8,
    pub kind: ThresholdKind,
    /// Compute the level with Otsu's method.
    pub otsu: bool,
}

impl Default for ThresholdOptions {
    fn default() -> Self {
        Self {
            lower: 0,
            upper: 255,
            kind: ThresholdKind::BinaryInv,
            otsu: true,
        }
    }
}

/// Options for [`AdaptiveThreshold`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveThresholdOptions {
    pub upper: u8,
    pub method: AdaptiveMethod,
    /// `binary` or `binary_inv`.
    pub kind: ThresholdKind,
    /// Neighbourhood size; odd and at least 3.
    pub size: u32,
    /// Subtracted from the local mean.
    pub constant: f64,
}

impl Default for AdaptiveThresholdOptions {
    fn default() -> Self {
        Self {
            upper: 255,
            method: AdaptiveMethod::Gaussian,
            kind: ThresholdKind::BinaryInv,
            size: 7,
            constant: 2.0,
        }
    }
}

/// Options for [`Canny`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CannyOptions {
    /// Hysteresis low threshold.
    pub lower: f32,
    /// Hysteresis high threshold.
    pub upper: f32,
}

impl Default for CannyOptions {
    fn default() -> Self {
        Self {
            lower: 50.0,
            upper: 150.0,
        }
    }
}

/// Options for [`Border`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BorderOptions {
    /// Padding on each side, in pixels.
    pub size: u32,
    pub kind: BorderKind,
    /// RGBA fill for `constant` borders.
    pub color: [u8; 4],
}

impl Default for BorderOptions {
    fn default() -> Self {
        Self {
            size: 10,
            kind: BorderKind::Constant,
            color: [255, 255, 255, 255],
        }
    }
}

/// Options for [`Erode`] and [`Dilate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MorphologyOptions {
    /// Structuring element `[width, height]`.
    pub size: [u32; 2],
    /// Number of passes.
    pub iter: u32,
}

impl Default for MorphologyOptions {
    fn default() -> Self {
        Self {
            size: [20, 20],
            iter: 1,
        }
    }
}

/// Options for [`MorphologicalGradient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MorphologicalGradientOptions {
    pub size: [u32; 2],
}

impl Default for MorphologicalGradientOptions {
    fn default() -> Self {
        Self { size: [3, 3] }
    }
}

/// Options for [`Resize`]; both fields required.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResizeOptions {
    pub width: u32,
    pub height: u32,
}

/// Options for [`Rotate`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RotateOptions {
    /// Degrees, positive is counter-clockwise.
    pub angle: f64,
    /// Pivot; the image center when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub center: Option<Coordinate>,
}

/// Options for [`Convert`]; `layout` is required.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvertOptions {
    pub layout: PixelLayout,
}

/// Options for [`Warp`]; both fields required.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WarpOptions {
    /// Source quadrilateral.
    pub points: CornerPoints,
    /// Destination canvas; its width and height size the output.
    pub bbox: BoundingBox,
}

/// Convert to single-channel grayscale.
#[derive(Debug, Clone, Copy)]
pub struct Grayscale;

impl Operation for Grayscale {
    const NAME: &'static str = "grayscale";
    type Options = GrayscaleOptions;

    fn default_options() -> Option<Self::Options> {
        Some(GrayscaleOptions::default())
    }

    fn apply(image: ImageHandle, _options: Self::Options) -> Result<ImageHandle, OperationError> {
        Ok(grayscale::grayscale(image))
    }
}

/// Gaussian blur.
#[derive(Debug, Clone, Copy)]
pub struct Blur;

impl Operation for Blur {
    const NAME: &'static str = "blur";
    type Options = BlurOptions;

    fn default_options() -> Option<Self::Options> {
        Some(BlurOptions::default())
    }

    fn apply(image: ImageHandle, options: Self::Options) -> Result<ImageHandle, OperationError> {
        blur::blur(image, options.size, options.sigma)
    }
}

/// Global threshold, optionally with Otsu's level.
#[derive(Debug, Clone, Copy)]
pub struct Threshold;

impl Operation for Threshold {
    const NAME: &'static str = "threshold";
    type Options = ThresholdOptions;

    fn default_options() -> Option<Self::Options> {
        Some(ThresholdOptions::default())
    }

    fn apply(image: ImageHandle, options: Self::Options) -> Result<ImageHandle, OperationError> {
        Ok(threshold::threshold(
            image,
            options.lower,
            options.upper,
            options.kind,
            options.otsu,
        ))
    }
}

/// Local-mean threshold.
#[derive(Debug, Clone, Copy)]
pub struct AdaptiveThreshold;

impl Operation for AdaptiveThreshold {
    const NAME: &'static str = "adaptive_threshold";
    type Options = AdaptiveThresholdOptions;

    fn default_options() -> Option<Self::Options> {
        Some(AdaptiveThresholdOptions::default())
    }

    fn apply(image: ImageHandle, options: Self::Options) -> Result<ImageHandle, OperationError> {
        threshold::adaptive_threshold(
            image,
            options.upper,
            options.method,
            options.kind,
            options.size,
            options.constant,
        )
    }
}

/// Canny edge map.
#[derive(Debug, Clone, Copy)]
pub struct Canny;

impl Operation for Canny {
    const NAME: &'static str = "canny";
    type Options = CannyOptions;

    fn default_options() -> Option<Self::Options> {
        Some(CannyOptions::default())
    }

    fn apply(image: ImageHandle, options: Self::Options) -> Result<ImageHandle, OperationError> {
        Ok(edge::canny(image, options.lower, options.upper))
    }
}

/// Uniform padding.
#[derive(Debug, Clone, Copy)]
pub struct Border;

impl Operation for Border {
    const NAME: &'static str = "border";
    type Options = BorderOptions;

    fn default_options() -> Option<Self::Options> {
        Some(BorderOptions::default())
    }

    fn apply(image: ImageHandle, options: Self::Options) -> Result<ImageHandle, OperationError> {
        border::border(image, options.size, options.kind, options.color)
    }
}

/// Rectangular erosion.
#[derive(Debug, Clone, Copy)]
pub struct Erode;

impl Operation for Erode {
    const NAME: &'static str = "erode";
    type Options = MorphologyOptions;

    fn default_options() -> Option<Self::Options> {
        Some(MorphologyOptions::default())
    }

    fn apply(image: ImageHandle, options: Self::Options) -> Result<ImageHandle, OperationError> {
        morphology::erode(image, options.size, options.iter)
    }
}

/// Rectangular dilation.
#[derive(Debug, Clone, Copy)]
pub struct Dilate;

impl Operation for Dilate {
    const NAME: &'static str = "dilate";
    type Options = MorphologyOptions;

    fn default_options() -> Option<Self::Options> {
        Some(MorphologyOptions::default())
    }

    fn apply(image: ImageHandle, options: Self::Options) -> Result<ImageHandle, OperationError> {
        morphology::dilate(image, options.size, options.iter)
    }
}

/// Dilation minus erosion.
#[derive(Debug, Clone, Copy)]
pub struct MorphologicalGradient;

impl Operation for MorphologicalGradient {
    const NAME: &'static str = "morphological_gradient";
    type Options = MorphologicalGradientOptions;

    fn default_options() -> Option<Self::Options> {
        Some(MorphologicalGradientOptions::default())
    }

    fn apply(image: ImageHandle, options: Self::Options) -> Result<ImageHandle, OperationError> {
        morphology::morphological_gradient(image, options.size)
    }
}

/// Resample to a fixed size.
#[derive(Debug, Clone, Copy)]
pub struct Resize;

impl Operation for Resize {
    const NAME: &'static str = "resize";
    const REQUIRED: &'static [&'static str] = &["width", "height"];
    type Options = ResizeOptions;

    fn default_options() -> Option<Self::Options> {
        None
    }

    fn apply(image: ImageHandle, options: Self::Options) -> Result<ImageHandle, OperationError> {
        transform::resize(image, options.width, options.height)
    }
}

/// Rotation about a point.
#[derive(Debug, Clone, Copy)]
pub struct Rotate;

impl Operation for Rotate {
    const NAME: &'static str = "rotate";
    type Options = RotateOptions;

    fn default_options() -> Option<Self::Options> {
        Some(RotateOptions::default())
    }

    fn apply(image: ImageHandle, options: Self::Options) -> Result<ImageHandle, OperationError> {
        if !options.angle.is_finite() {
            return Err(OperationError::InvalidParameter(format!(
                "rotation angle must be finite, got {}",
                options.angle
            )));
        }
        Ok(transform::rotate(image, options.angle, options.center))
    }
}

/// Pixel layout conversion.
#[derive(Debug, Clone, Copy)]
pub struct Convert;

impl Operation for Convert {
    const NAME: &'static str = "convert";
    const REQUIRED: &'static [&'static str] = &["layout"];
    type Options = ConvertOptions;

    fn default_options() -> Option<Self::Options> {
        None
    }

    fn apply(image: ImageHandle, options: Self::Options) -> Result<ImageHandle, OperationError> {
        Ok(grayscale::convert(image, options.layout))
    }
}

/// Perspective warp onto an upright canvas.
#[derive(Debug, Clone, Copy)]
pub struct Warp;

impl Operation for Warp {
    const NAME: &'static str = "warp";
    const REQUIRED: &'static [&'static str] = &["points", "bbox"];
    type Options = WarpOptions;

    fn default_options() -> Option<Self::Options> {
        None
    }

    fn apply(image: ImageHandle, options: Self::Options) -> Result<ImageHandle, OperationError> {
        transform::warp(image, &options.points, options.bbox)
    }
}

/// Bitwise NOT of the color channels.
#[derive(Debug, Clone, Copy)]
pub struct Invert;

impl Operation for Invert {
    const NAME: &'static str = "invert";
    type Options = InvertOptions;

    fn default_options() -> Option<Self::Options> {
        Some(InvertOptions::default())
    }

    fn apply(image: ImageHandle, _options: Self::Options) -> Result<ImageHandle, OperationError> {
        Ok(edge::invert(image))
    }
}

/// Register every built-in operation.
pub fn register_builtins(registry: &mut OperationRegistry) {
    registry.register_operation::<Grayscale>();
    registry.register_operation::<Blur>();
    registry.register_operation::<Threshold>();
    registry.register_operation::<AdaptiveThreshold>();
    registry.register_operation::<Canny>();
    registry.register_operation::<Border>();
    registry.register_operation::<Erode>();
    registry.register_operation::<Dilate>();
    registry.register_operation::<MorphologicalGradient>();
    registry.register_operation::<Resize>();
    registry.register_operation::<Rotate>();
    registry.register_operation::<Convert>();
    registry.register_operation::<Warp>();
    registry.register_operation::<Invert>();
}

/// A typed request for one built-in operation.
///
/// Serialized as `{"operation": "<name>", "options": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", content = "options", rename_all = "snake_case")]
pub enum OperationRequest {
    Grayscale(GrayscaleOptions),
    Blur(BlurOptions),
    Threshold(ThresholdOptions),
    AdaptiveThreshold(AdaptiveThresholdOptions),
    Canny(CannyOptions),
    Border(BorderOptions),
    Erode(MorphologyOptions),
    Dilate(MorphologyOptions),
    MorphologicalGradient(MorphologicalGradientOptions),
    Resize(ResizeOptions),
    Rotate(RotateOptions),
    Convert(ConvertOptions),
    Warp(WarpOptions),
    Invert(InvertOptions),
}

impl OperationRequest {
    /// Registry key of the requested operation.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Grayscale(_) => Grayscale::NAME,
            Self::Blur(_) => Blur::NAME,
            Self::Threshold(_) => Threshold::NAME,
            Self::AdaptiveThreshold(_) => AdaptiveThreshold::NAME,
            Self::Canny(_) => Canny::NAME,
            Self::Border(_) => Border::NAME,
            Self::Erode(_) => Erode::NAME,
            Self::Dilate(_) => Dilate::NAME,
            Self::MorphologicalGradient(_) => MorphologicalGradient::NAME,
            Self::Resize(_) => Resize::NAME,
            Self::Rotate(_) => Rotate::NAME,
            Self::Convert(_) => Convert::NAME,
            Self::Warp(_) => Warp::NAME,
            Self::Invert(_) => Invert::NAME,
        }
    }

    /// Flatten the typed options into a registry record.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidParameter`] if the options fail to
    /// serialize (for example a non-finite float).
    pub fn to_options(&self) -> Result<Options, PipelineError> {
        let name = self.name();
        match self {
            Self::Grayscale(o) => to_options(name, o),
            Self::Blur(o) => to_options(name, o),
            Self::Threshold(o) => to_options(name, o),
            Self::AdaptiveThreshold(o) => to_options(name, o),
            Self::Canny(o) => to_options(name, o),
            Self::Border(o) => to_options(name, o),
            Self::Erode(o) | Self::Dilate(o) => to_options(name, o),
            Self::MorphologicalGradient(o) => to_options(name, o),
            Self::Resize(o) => to_options(name, o),
            Self::Rotate(o) => to_options(name, o),
            Self::Convert(o) => to_options(name, o),
            Self::Warp(o) => to_options(name, o),
            Self::Invert(o) => to_options(name, o),
        }
    }
}
