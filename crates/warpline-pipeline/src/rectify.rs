//! Document rectification: find the largest quadrilateral in a photo and
//! warp it upright.
//!
//! [`rectify`] runs the whole thing in one call. [`Rectifier`] drives the
//! same steps one at a time, each stage consuming the previous one so the
//! steps cannot be skipped or reordered:
//!
//! ```rust
//! # use warpline_pipeline::{Rectifier, RectifyConfig, Runtime, PipelineError};
//! # fn run(png: &[u8]) -> Result<(), PipelineError> {
//! let runtime = Runtime::init();
//! let rectified = Rectifier::new(&runtime, RectifyConfig::default())
//!     .decode(png)?
//!     .binarize()?
//!     .find_contours()?
//!     .extract_corners()?
//!     .warp()?;
//! let upright = rectified.image();
//! # let _ = upright;
//! # Ok(())
//! # }
//! ```
//!
//! Binarization is grayscale, blur, threshold, and an optional dilation,
//! all dispatched through the runtime's registry. The warp runs on the
//! original color image, not the binary mask.
//!
//! [`PipelineConfig`] is the free-form counterpart: a serializable list
//! of named operation steps for
//! [`ImageProcessor::apply_config`](crate::ImageProcessor::apply_config).

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::contour::{ContourOptions, ContourSet, CornerOptions};
use crate::corners::CornerResult;
use crate::handle::ImageHandle;
use crate::operations::{
    BlurOptions, MorphologyOptions, OperationRequest, ThresholdOptions, WarpOptions,
};
use crate::processor::ImageProcessor;
use crate::registry::Options;
use crate::runtime::Runtime;
use crate::threshold::ThresholdKind;
use crate::types::{Dimensions, PipelineError};

/// Settings for [`rectify`] and [`Rectifier`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RectifyConfig {
    /// Gaussian kernel applied before thresholding; both sides odd.
    pub blur_size: [u32; 2],

    /// Threshold settings. The default is binary with Otsu's level so a
    /// bright page on a darker background becomes foreground.
    pub threshold: ThresholdOptions,

    /// Dilation kernel applied after thresholding to close gaps in the
    /// page outline. `None` skips the step.
    pub dilate_size: Option<[u32; 2]>,

    /// Contour retrieval settings.
    pub contours: ContourOptions,

    /// Use the full canvas when no contour is found instead of failing
    /// with [`PipelineError::NoContours`].
    pub fallback_to_canvas: bool,
}

impl RectifyConfig {
    pub const DEFAULT_BLUR_SIZE: [u32; 2] = [5, 5];
    pub const DEFAULT_THRESHOLD_KIND: ThresholdKind = ThresholdKind::Binary;
    pub const DEFAULT_FALLBACK_TO_CANVAS: bool = true;

    /// Check the settings without running anything.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] for an even or zero blur
    /// kernel, a zero dilation kernel, or a threshold kind that does not
    /// produce a binary image.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let [bw, bh] = self.blur_size;
        if bw == 0 || bh == 0 || bw % 2 == 0 || bh % 2 == 0 {
            return Err(PipelineError::InvalidConfig(format!(
                "blur_size must be odd and positive, got [{bw}, {bh}]"
            )));
        }
        if let Some([dw, dh]) = self.dilate_size
            && (dw == 0 || dh == 0)
        {
            return Err(PipelineError::InvalidConfig(format!(
                "dilate_size must be positive, got [{dw}, {dh}]"
            )));
        }
        if !matches!(
            self.threshold.kind,
            ThresholdKind::Binary | ThresholdKind::BinaryInv
        ) {
            return Err(PipelineError::InvalidConfig(format!(
                "threshold kind must be binary or binary_inv, got {:?}",
                self.threshold.kind
            )));
        }
        Ok(())
    }
}

impl Default for RectifyConfig {
    fn default() -> Self {
        Self {
            blur_size: Self::DEFAULT_BLUR_SIZE,
            threshold: ThresholdOptions {
                kind: Self::DEFAULT_THRESHOLD_KIND,
                ..ThresholdOptions::default()
            },
            dilate_size: None,
            contours: ContourOptions::default(),
            fallback_to_canvas: Self::DEFAULT_FALLBACK_TO_CANVAS,
        }
    }
}

/// Output of a completed rectification.
#[derive(Debug, Clone, PartialEq)]
pub struct RectifyResult {
    /// The warped, upright image in the source's pixel layout.
    pub image: ImageHandle,
    /// Corners that were warped and the canvas box they targeted.
    pub corners: CornerResult,
    /// Whether the corners are the full-canvas fallback.
    pub fallback: bool,
}

/// Rectify encoded image bytes in one call.
///
/// # Errors
///
/// Any error from the individual [`Rectifier`] stages.
pub fn rectify(
    runtime: &Runtime,
    image_bytes: &[u8],
    config: &RectifyConfig,
) -> Result<RectifyResult, PipelineError> {
    Rectifier::new(runtime, *config)
        .decode(image_bytes)?
        .binarize()?
        .find_contours()?
        .extract_corners()?
        .warp()
        .map(Rectified::into_result)
}

/// Rectify an in-memory image in one call.
///
/// # Errors
///
/// Any error from the individual [`Rectifier`] stages.
pub fn rectify_image(
    runtime: &Runtime,
    image: impl Into<ImageHandle>,
    config: &RectifyConfig,
) -> Result<RectifyResult, PipelineError> {
    Rectifier::new(runtime, *config)
        .source(image)
        .binarize()?
        .find_contours()?
        .extract_corners()?
        .warp()
        .map(Rectified::into_result)
}

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Rectification before a source image is attached.
#[must_use = "rectification stages are consumed by advancing; call .decode() or .source()"]
pub struct Rectifier {
    runtime: Runtime,
    config: RectifyConfig,
}

impl Rectifier {
    pub fn new(runtime: &Runtime, config: RectifyConfig) -> Self {
        Self {
            runtime: runtime.clone(),
            config,
        }
    }

    /// Decode encoded bytes as the source.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EmptyInput`] or
    /// [`PipelineError::ImageDecode`] for unusable bytes.
    pub fn decode(self, image_bytes: &[u8]) -> Result<Loaded, PipelineError> {
        Ok(self.source(ImageHandle::decode(image_bytes)?))
    }

    /// Use an in-memory image as the source.
    pub fn source(self, image: impl Into<ImageHandle>) -> Loaded {
        Loaded {
            runtime: self.runtime,
            config: self.config,
            original: image.into(),
        }
    }
}

// ───────────────────────── Stage 1: Loaded ───────────────────────────

/// Source image attached; nothing processed yet.
#[must_use = "rectification stages are consumed by advancing; call .binarize() to continue"]
pub struct Loaded {
    runtime: Runtime,
    config: RectifyConfig,
    original: ImageHandle,
}

impl Loaded {
    #[must_use]
    pub const fn original(&self) -> &ImageHandle {
        &self.original
    }

    /// Grayscale, blur, threshold, and optionally dilate a copy of the
    /// source.
    ///
    /// # Errors
    ///
    /// [`PipelineError::InvalidConfig`] if the config does not validate,
    /// or any operation error.
    pub fn binarize(self) -> Result<Binarized, PipelineError> {
        self.config.validate()?;

        let mut processor = ImageProcessor::new(&self.runtime, self.original.clone());
        processor
            .grayscale()?
            .blur(BlurOptions {
                size: self.config.blur_size,
                sigma: 0.0,
            })?
            .threshold(self.config.threshold)?;
        if let Some(size) = self.config.dilate_size {
            processor.dilate(MorphologyOptions { size, iter: 1 })?;
        }
        let binary = processor.into_handle()?;
        debug!(
            width = binary.width(),
            height = binary.height(),
            "binarized"
        );

        Ok(Binarized {
            runtime: self.runtime,
            config: self.config,
            original: self.original,
            binary,
        })
    }
}

// ───────────────────────── Stage 2: Binarized ────────────────────────

/// Binary mask computed.
#[must_use = "rectification stages are consumed by advancing; call .find_contours() to continue"]
pub struct Binarized {
    runtime: Runtime,
    config: RectifyConfig,
    original: ImageHandle,
    binary: ImageHandle,
}

impl Binarized {
    /// The thresholded mask.
    #[must_use]
    pub const fn binary(&self) -> &ImageHandle {
        &self.binary
    }

    /// Trace contours in the mask.
    ///
    /// # Errors
    ///
    /// Propagates [`ContourSet::find`] errors.
    pub fn find_contours(self) -> Result<ContoursFound, PipelineError> {
        let contours = ContourSet::find(&self.binary, self.config.contours)?;
        Ok(ContoursFound {
            runtime: self.runtime,
            config: self.config,
            original: self.original,
            binary: self.binary,
            contours,
        })
    }
}

// ───────────────────────── Stage 3: ContoursFound ────────────────────

/// Contours traced.
#[must_use = "rectification stages are consumed by advancing; call .extract_corners() to continue"]
pub struct ContoursFound {
    runtime: Runtime,
    config: RectifyConfig,
    original: ImageHandle,
    binary: ImageHandle,
    contours: ContourSet,
}

impl ContoursFound {
    #[must_use]
    pub const fn contours(&self) -> &ContourSet {
        &self.contours
    }

    #[must_use]
    pub const fn binary(&self) -> &ImageHandle {
        &self.binary
    }

    /// Label the corners of the largest contour against the source
    /// canvas.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::NoContours`] when nothing was found and
    /// `fallback_to_canvas` is off.
    pub fn extract_corners(mut self) -> Result<CornersFound, PipelineError> {
        let canvas: Dimensions = self.original.dimensions();
        let fallback = self.contours.largest_contour_area().is_none();
        if fallback {
            if !self.config.fallback_to_canvas {
                return Err(PipelineError::NoContours);
            }
            warn!(
                contours = self.contours.len(),
                "no usable contour, rectifying the full canvas"
            );
        }
        let corners = self.contours.corner_points(CornerOptions::canvas(canvas));
        debug!(?corners, "corners extracted");
        self.contours.destroy();

        Ok(CornersFound {
            runtime: self.runtime,
            original: self.original,
            corners,
            fallback,
        })
    }
}

// ───────────────────────── Stage 4: CornersFound ─────────────────────

/// Corners labelled and clamped.
#[must_use = "rectification stages are consumed by advancing; call .warp() to continue"]
pub struct CornersFound {
    runtime: Runtime,
    original: ImageHandle,
    corners: CornerResult,
    fallback: bool,
}

impl CornersFound {
    #[must_use]
    pub const fn corners(&self) -> &CornerResult {
        &self.corners
    }

    /// Whether the corners are the full-canvas fallback.
    #[must_use]
    pub const fn is_fallback(&self) -> bool {
        self.fallback
    }

    /// Warp the source image so the corners land on the canvas box.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Execution`] when the quadrilateral is
    /// degenerate.
    pub fn warp(self) -> Result<Rectified, PipelineError> {
        let mut processor = ImageProcessor::new(&self.runtime, self.original);
        processor.run(OperationRequest::Warp(WarpOptions {
            points: self.corners.points,
            bbox: self.corners.bbox,
        }))?;
        Ok(Rectified {
            image: processor.into_handle()?,
            corners: self.corners,
            fallback: self.fallback,
        })
    }
}

// ───────────────────────── Stage 5: Rectified ────────────────────────

/// Final stage.
#[must_use = "call .into_result() or .image() to use the output"]
pub struct Rectified {
    image: ImageHandle,
    corners: CornerResult,
    fallback: bool,
}

impl Rectified {
    /// The upright image.
    #[must_use]
    pub const fn image(&self) -> &ImageHandle {
        &self.image
    }

    #[must_use]
    pub fn into_result(self) -> RectifyResult {
        RectifyResult {
            image: self.image,
            corners: self.corners,
            fallback: self.fallback,
        }
    }
}

// ───────────────────────── Recipes ───────────────────────────────────

/// One named operation with its options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineStep {
    pub operation: String,
    #[serde(default)]
    pub options: Options,
}

/// A serializable list of operation steps, run in order by
/// [`ImageProcessor::apply_config`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub steps: Vec<PipelineStep>,
}

impl PipelineConfig {
    /// Build a recipe from typed requests.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidParameter`] if a request's options
    /// fail to serialize.
    pub fn from_requests(
        requests: impl IntoIterator<Item = OperationRequest>,
    ) -> Result<Self, PipelineError> {
        let steps = requests
            .into_iter()
            .map(|request| {
                Ok(PipelineStep {
                    operation: request.name().to_owned(),
                    options: request.to_options()?,
                })
            })
            .collect::<Result<_, PipelineError>>()?;
        Ok(Self { steps })
    }

    /// Check every step against `runtime` without touching an image.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] naming the first step
    /// whose operation is unknown or whose options do not validate.
    pub fn validate(&self, runtime: &Runtime) -> Result<(), PipelineError> {
        for (index, step) in self.steps.iter().enumerate() {
            let _prepared = runtime
                .registry()
                .prepare(&step.operation, step.options.clone())
                .map_err(|err| PipelineError::InvalidConfig(format!("step {index}: {err}")))?;
        }
        Ok(())
    }
}
