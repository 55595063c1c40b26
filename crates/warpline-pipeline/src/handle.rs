//! Owned raster buffers passed between operations.
//!
//! An [`ImageHandle`] is a single-channel grayscale or four-channel RGBA
//! image with 8 bits per channel. Operations take a handle by value and
//! return a new one, so exactly one owner exists at any time: the old
//! buffer is dropped inside the operation that consumed it.
//!
//! Decoding follows the same contract as the rest of the crate: raw
//! bytes in, owned pixels out, no file-system access.

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::types::{Dimensions, GrayImage, PipelineError, RgbaImage};

/// Channel layout of an [`ImageHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelLayout {
    /// One 8-bit luminance channel.
    Gray,
    /// Four 8-bit channels: red, green, blue, alpha.
    Rgba,
}

impl PixelLayout {
    /// Number of channels per pixel.
    #[must_use]
    pub const fn channels(self) -> u8 {
        match self {
            Self::Gray => 1,
            Self::Rgba => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Raster {
    Gray(GrayImage),
    Rgba(RgbaImage),
}

/// An owned raster image, the unit of data flowing through the
/// operation registry.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageHandle {
    raster: Raster,
}

impl ImageHandle {
    /// Wrap a grayscale image.
    #[must_use]
    pub const fn from_gray(image: GrayImage) -> Self {
        Self {
            raster: Raster::Gray(image),
        }
    }

    /// Wrap an RGBA image.
    #[must_use]
    pub const fn from_rgba(image: RgbaImage) -> Self {
        Self {
            raster: Raster::Rgba(image),
        }
    }

    /// Wrap a decoded image of any layout.
    ///
    /// Images with a single luminance channel (with or without alpha,
    /// any bit depth) become [`PixelLayout::Gray`]; everything else is
    /// converted to 8-bit RGBA.
    #[must_use]
    pub fn from_dynamic(image: DynamicImage) -> Self {
        match image {
            DynamicImage::ImageLuma8(gray) => Self::from_gray(gray),
            DynamicImage::ImageRgba8(rgba) => Self::from_rgba(rgba),
            other if other.color().channel_count() <= 2 => Self::from_gray(other.into_luma8()),
            other => Self::from_rgba(other.into_rgba8()),
        }
    }

    /// Decode raw image bytes (PNG, JPEG, BMP, WebP).
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
    /// Returns [`PipelineError::ImageDecode`] if the image format is
    /// unrecognized or the data is corrupt.
    pub fn decode(bytes: &[u8]) -> Result<Self, PipelineError> {
        if bytes.is_empty() {
            return Err(PipelineError::EmptyInput);
        }

        let image = image::load_from_memory(bytes)?;
        Ok(Self::from_dynamic(image))
    }

    /// Build a handle from a raw row-major pixel buffer.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidSource`] if `channels` is not 1
    /// or 4, or if `data` does not hold exactly
    /// `width * height * channels` bytes.
    pub fn from_raw(
        width: u32,
        height: u32,
        channels: u8,
        data: Vec<u8>,
    ) -> Result<Self, PipelineError> {
        let len = data.len();
        let mismatch = || {
            PipelineError::InvalidSource(format!(
                "buffer of {len} bytes does not match {width}x{height} with {channels} channel(s)"
            ))
        };
        let expected = u64::from(width) * u64::from(height) * u64::from(channels);
        if u64::try_from(len).ok() != Some(expected) {
            return Err(mismatch());
        }
        match channels {
            1 => GrayImage::from_raw(width, height, data)
                .map(Self::from_gray)
                .ok_or_else(mismatch),
            4 => RgbaImage::from_raw(width, height, data)
                .map(Self::from_rgba)
                .ok_or_else(mismatch),
            _ => Err(PipelineError::InvalidSource(format!(
                "unsupported channel count {channels}, expected 1 or 4"
            ))),
        }
    }

    /// Image width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        match &self.raster {
            Raster::Gray(img) => img.width(),
            Raster::Rgba(img) => img.width(),
        }
    }

    /// Image height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        match &self.raster {
            Raster::Gray(img) => img.height(),
            Raster::Rgba(img) => img.height(),
        }
    }

    /// Width and height together.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width(), self.height())
    }

    /// Channel layout.
    #[must_use]
    pub const fn layout(&self) -> PixelLayout {
        match self.raster {
            Raster::Gray(_) => PixelLayout::Gray,
            Raster::Rgba(_) => PixelLayout::Rgba,
        }
    }

    /// Number of channels per pixel (1 or 4).
    #[must_use]
    pub const fn channels(&self) -> u8 {
        self.layout().channels()
    }

    /// Raw row-major pixel bytes.
    #[must_use]
    pub fn as_raw(&self) -> &[u8] {
        match &self.raster {
            Raster::Gray(img) => img.as_raw(),
            Raster::Rgba(img) => img.as_raw(),
        }
    }

    /// Borrow the grayscale buffer, if this handle is single-channel.
    #[must_use]
    pub const fn as_gray(&self) -> Option<&GrayImage> {
        match &self.raster {
            Raster::Gray(img) => Some(img),
            Raster::Rgba(_) => None,
        }
    }

    /// Borrow the RGBA buffer, if this handle is four-channel.
    #[must_use]
    pub const fn as_rgba(&self) -> Option<&RgbaImage> {
        match &self.raster {
            Raster::Gray(_) => None,
            Raster::Rgba(img) => Some(img),
        }
    }

    /// Consume the handle and return a grayscale image, converting RGBA
    /// pixels with the luminance formula used by the `image` crate.
    #[must_use]
    pub fn into_gray(self) -> GrayImage {
        match self.raster {
            Raster::Gray(img) => img,
            Raster::Rgba(img) => DynamicImage::ImageRgba8(img).into_luma8(),
        }
    }

    /// Consume the handle and return an RGBA image.
    ///
    /// Gray values are replicated into the color channels and alpha is
    /// set to fully opaque.
    #[must_use]
    pub fn into_rgba(self) -> RgbaImage {
        match self.raster {
            Raster::Gray(img) => DynamicImage::ImageLuma8(img).into_rgba8(),
            Raster::Rgba(img) => img,
        }
    }

    /// Copy the pixels into an RGBA image without consuming the handle.
    #[must_use]
    pub fn to_rgba(&self) -> RgbaImage {
        match &self.raster {
            Raster::Gray(img) => DynamicImage::ImageLuma8(img.clone()).into_rgba8(),
            Raster::Rgba(img) => img.clone(),
        }
    }

    /// Consume the handle and return it as a [`DynamicImage`].
    #[must_use]
    pub fn into_dynamic(self) -> DynamicImage {
        match self.raster {
            Raster::Gray(img) => DynamicImage::ImageLuma8(img),
            Raster::Rgba(img) => DynamicImage::ImageRgba8(img),
        }
    }

    /// Color channels of the pixel at `(x, y)`, alpha excluded: one value
    /// for gray, three for RGBA. Out-of-bounds coordinates panic like
    /// [`image::ImageBuffer::get_pixel`].
    pub(crate) fn color_at(&self, x: u32, y: u32) -> &[u8] {
        match &self.raster {
            Raster::Gray(img) => &img.get_pixel(x, y).0,
            Raster::Rgba(img) => &img.get_pixel(x, y).0[..3],
        }
    }

    /// Apply a per-layout transformation, keeping the layout.
    pub(crate) fn map(
        self,
        gray: impl FnOnce(GrayImage) -> GrayImage,
        rgba: impl FnOnce(RgbaImage) -> RgbaImage,
    ) -> Self {
        match self.raster {
            Raster::Gray(img) => Self::from_gray(gray(img)),
            Raster::Rgba(img) => Self::from_rgba(rgba(img)),
        }
    }
}

impl From<GrayImage> for ImageHandle {
    fn from(image: GrayImage) -> Self {
        Self::from_gray(image)
    }
}

impl From<RgbaImage> for ImageHandle {
    fn from(image: RgbaImage) -> Self {
        Self::from_rgba(image)
    }
}

impl From<DynamicImage> for ImageHandle {
    fn from(image: DynamicImage) -> Self {
        Self::from_dynamic(image)
    }
}
