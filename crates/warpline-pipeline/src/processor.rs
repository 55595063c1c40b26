//! Chainable image processor.
//!
//! An [`ImageProcessor`] owns exactly one current [`ImageHandle`]. Every
//! operation takes that handle, runs a registered operation on it, and
//! stores the result, so a chain like
//!
//! ```text
//! processor.grayscale()?.blur(BlurOptions::default())?.canny(CannyOptions::default())?;
//! ```
//!
//! never holds more than one live image.
//!
//! Options are validated before the handle is taken, so a bad option
//! leaves the processor usable. A kernel that fails part way has already
//! consumed the handle; the processor is then released and every later
//! call returns [`PipelineError::Released`].

use image::DynamicImage;
use tracing::{debug, error};

use crate::contour::{ContourOptions, ContourSet};
use crate::handle::{ImageHandle, PixelLayout};
use crate::operations::{
    AdaptiveThresholdOptions, BlurOptions, BorderOptions, CannyOptions, ConvertOptions,
    MorphologicalGradientOptions, MorphologyOptions, OperationRequest, ResizeOptions,
    RotateOptions, ThresholdOptions, WarpOptions,
};
use crate::rectify::PipelineConfig;
use crate::registry::Options;
use crate::runtime::Runtime;
use crate::types::{Dimensions, PipelineError, RgbaImage};

/// Stateful façade over one image and a runtime's operation table.
#[derive(Debug, Clone)]
pub struct ImageProcessor {
    runtime: Runtime,
    image: Option<ImageHandle>,
    dimensions: Dimensions,
    layout: PixelLayout,
}

impl ImageProcessor {
    /// Start a chain from an in-memory image.
    pub fn new(runtime: &Runtime, source: impl Into<ImageHandle>) -> Self {
        let image = source.into();
        Self {
            runtime: runtime.clone(),
            dimensions: image.dimensions(),
            layout: image.layout(),
            image: Some(image),
        }
    }

    /// Decode encoded image bytes (PNG, JPEG, BMP, WebP).
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EmptyInput`] for empty input and
    /// [`PipelineError::ImageDecode`] for unreadable data.
    pub fn from_bytes(runtime: &Runtime, bytes: &[u8]) -> Result<Self, PipelineError> {
        Ok(Self::new(runtime, ImageHandle::decode(bytes)?))
    }

    /// Wrap a raw row-major buffer with 1 (gray) or 4 (RGBA) channels.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidSource`] if the channel count is
    /// unsupported or the buffer length does not match.
    pub fn from_raw(
        runtime: &Runtime,
        width: u32,
        height: u32,
        channels: u8,
        data: Vec<u8>,
    ) -> Result<Self, PipelineError> {
        Ok(Self::new(
            runtime,
            ImageHandle::from_raw(width, height, channels, data)?,
        ))
    }

    /// Run a registered operation by name with `options` merged over its
    /// defaults.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::Released`] if the processor has no image.
    /// - [`PipelineError::OperationNotFound`],
    ///   [`PipelineError::MissingParameter`], or
    ///   [`PipelineError::InvalidParameter`] before any pixel is touched;
    ///   the processor keeps its image.
    /// - [`PipelineError::Execution`] if the kernel fails; the processor
    ///   is released.
    pub fn execute(&mut self, name: &str, options: Options) -> Result<&mut Self, PipelineError> {
        if self.image.is_none() {
            return Err(PipelineError::Released);
        }
        let prepared = self.runtime.registry().prepare(name, options)?;
        let image = self.image.take().ok_or(PipelineError::Released)?;

        match prepared.run(image) {
            Ok(result) => {
                debug!(
                    operation = name,
                    width = result.width,
                    height = result.height,
                    "step complete"
                );
                self.dimensions = Dimensions::new(result.width, result.height);
                self.layout = result.image.layout();
                self.image = Some(result.image);
                Ok(self)
            }
            Err(err) => {
                error!(operation = name, error = %err, "operation failed");
                Err(err)
            }
        }
    }

    /// Run a typed request through the same registry path as
    /// [`execute`](Self::execute).
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub fn run(&mut self, request: OperationRequest) -> Result<&mut Self, PipelineError> {
        let options = request.to_options()?;
        self.execute(request.name(), options)
    }

    /// Run every step of `config` in order, stopping at the first error.
    ///
    /// # Errors
    ///
    /// The first error any step returns.
    pub fn apply_config(&mut self, config: &PipelineConfig) -> Result<&mut Self, PipelineError> {
        for step in &config.steps {
            self.execute(&step.operation, step.options.clone())?;
        }
        Ok(self)
    }

    /// Convert to grayscale. Usually the first step; an already-gray
    /// image passes through.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub fn grayscale(&mut self) -> Result<&mut Self, PipelineError> {
        self.run(OperationRequest::Grayscale(crate::operations::GrayscaleOptions {}))
    }

    /// Gaussian blur. Use after grayscale and before thresholding or
    /// edge detection.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub fn blur(&mut self, options: BlurOptions) -> Result<&mut Self, PipelineError> {
        self.run(OperationRequest::Blur(options))
    }

    /// Global threshold. Use after blur; color input is converted to
    /// grayscale.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub fn threshold(&mut self, options: ThresholdOptions) -> Result<&mut Self, PipelineError> {
        self.run(OperationRequest::Threshold(options))
    }

    /// Adaptive threshold. Use after grayscale and blur.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub fn adaptive_threshold(
        &mut self,
        options: AdaptiveThresholdOptions,
    ) -> Result<&mut Self, PipelineError> {
        self.run(OperationRequest::AdaptiveThreshold(options))
    }

    /// Canny edge detection. Use after blur.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub fn canny(&mut self, options: CannyOptions) -> Result<&mut Self, PipelineError> {
        self.run(OperationRequest::Canny(options))
    }

    /// Morphological gradient. Use on a thresholded image to outline
    /// regions.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub fn morphological_gradient(
        &mut self,
        options: MorphologicalGradientOptions,
    ) -> Result<&mut Self, PipelineError> {
        self.run(OperationRequest::MorphologicalGradient(options))
    }

    /// Erosion. Use on a binary image to remove specks.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub fn erode(&mut self, options: MorphologyOptions) -> Result<&mut Self, PipelineError> {
        self.run(OperationRequest::Erode(options))
    }

    /// Dilation. Use on a binary image to close gaps in an outline.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub fn dilate(&mut self, options: MorphologyOptions) -> Result<&mut Self, PipelineError> {
        self.run(OperationRequest::Dilate(options))
    }

    /// Resample to a fixed size.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub fn resize(&mut self, options: ResizeOptions) -> Result<&mut Self, PipelineError> {
        self.run(OperationRequest::Resize(options))
    }

    /// Perspective warp. Use on the original color image with corners
    /// from [`ContourSet::corner_points`].
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub fn warp(&mut self, options: WarpOptions) -> Result<&mut Self, PipelineError> {
        self.run(OperationRequest::Warp(options))
    }

    /// Rotate about a point, keeping the image size.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub fn rotate(&mut self, options: RotateOptions) -> Result<&mut Self, PipelineError> {
        self.run(OperationRequest::Rotate(options))
    }

    /// Switch pixel layout.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub fn convert(&mut self, options: ConvertOptions) -> Result<&mut Self, PipelineError> {
        self.run(OperationRequest::Convert(options))
    }

    /// Pad every side.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub fn border(&mut self, options: BorderOptions) -> Result<&mut Self, PipelineError> {
        self.run(OperationRequest::Border(options))
    }

    /// Invert the color channels.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub fn invert(&mut self) -> Result<&mut Self, PipelineError> {
        self.run(OperationRequest::Invert(crate::operations::InvertOptions {}))
    }

    /// Detect contours in the current (single-channel) image.
    ///
    /// # Errors
    ///
    /// [`PipelineError::Released`] without an image, or
    /// [`PipelineError::InvalidInput`] for a color image.
    pub fn contours(&self, options: ContourOptions) -> Result<ContourSet, PipelineError> {
        ContourSet::find(self.handle()?, options)
    }

    /// Width of the current image (the last one, once released).
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.dimensions.width
    }

    /// Height of the current image (the last one, once released).
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.dimensions.height
    }

    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Channel count of the current image: 1 or 4.
    #[must_use]
    pub const fn channels(&self) -> u8 {
        self.layout.channels()
    }

    /// Whether the image has been released.
    #[must_use]
    pub const fn is_released(&self) -> bool {
        self.image.is_none()
    }

    /// Borrow the current image.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Released`] after [`destroy`](Self::destroy)
    /// or a failed operation.
    pub fn handle(&self) -> Result<&ImageHandle, PipelineError> {
        self.image.as_ref().ok_or(PipelineError::Released)
    }

    /// Copy the current image out as RGBA; gray is replicated with
    /// opaque alpha.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Released`] without an image.
    pub fn to_image(&self) -> Result<RgbaImage, PipelineError> {
        Ok(self.handle()?.to_rgba())
    }

    /// Copy the current image out in its own layout.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Released`] without an image.
    pub fn to_dynamic(&self) -> Result<DynamicImage, PipelineError> {
        Ok(self.handle()?.clone().into_dynamic())
    }

    /// Finish the chain and take the image.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Released`] without an image.
    pub fn into_handle(self) -> Result<ImageHandle, PipelineError> {
        self.image.ok_or(PipelineError::Released)
    }

    /// Release the image. Safe to call more than once.
    pub fn destroy(&mut self) {
        if self.image.take().is_some() {
            debug!("processor released");
        }
    }
}
