//! Color-space conversion between the two supported pixel layouts.
//!
//! [`grayscale`] collapses RGBA to a single luminance channel using the
//! `image` crate's weighted formula. A handle that is already grayscale
//! passes through untouched, so the conversion is idempotent.
//!
//! [`convert`] switches a handle to an explicit [`PixelLayout`] in either
//! direction; gray-to-RGBA replicates the gray value into the color
//! channels and sets alpha to fully opaque.

use crate::handle::{ImageHandle, PixelLayout};

/// Convert an image to single-channel grayscale.
#[must_use = "returns the grayscale image"]
pub fn grayscale(image: ImageHandle) -> ImageHandle {
    match image.layout() {
        PixelLayout::Gray => image,
        PixelLayout::Rgba => ImageHandle::from_gray(image.into_gray()),
    }
}

/// Convert an image to the requested pixel layout.
#[must_use = "returns the converted image"]
pub fn convert(image: ImageHandle, layout: PixelLayout) -> ImageHandle {
    if image.layout() == layout {
        return image;
    }
    match layout {
        PixelLayout::Gray => ImageHandle::from_gray(image.into_gray()),
        PixelLayout::Rgba => ImageHandle::from_rgba(image.into_rgba()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{GrayImage, RgbaImage};

    fn rgba(pixel: [u8; 4]) -> ImageHandle {
        ImageHandle::from_rgba(RgbaImage::from_fn(4, 3, |_, _| image::Rgba(pixel)))
    }

    #[test]
    fn white_rgba_becomes_white_gray() {
        let gray = grayscale(rgba([255, 255, 255, 255]));
        assert_eq!(gray.layout(), PixelLayout::Gray);
        assert!(gray.as_raw().iter().all(|&v| v == 255));
    }

    #[test]
    fn output_dimensions_match_input() {
        let gray = grayscale(rgba([128, 64, 32, 255]));
        assert_eq!(gray.width(), 4);
        assert_eq!(gray.height(), 3);
    }

    #[test]
    fn grayscale_is_idempotent() {
        let once = grayscale(rgba([200, 100, 50, 255]));
        let twice = grayscale(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn convert_gray_to_rgba_replicates() {
        let gray = ImageHandle::from_gray(GrayImage::from_pixel(2, 2, image::Luma([90])));
        let converted = convert(gray, PixelLayout::Rgba);
        assert_eq!(converted.channels(), 4);
        assert_eq!(
            converted.as_rgba().unwrap().get_pixel(1, 0).0,
            [90, 90, 90, 255]
        );
    }

    #[test]
    fn convert_to_same_layout_is_noop() {
        let original = rgba([1, 2, 3, 4]);
        assert_eq!(convert(original.clone(), PixelLayout::Rgba), original);
    }

    #[test]
    fn convert_rgba_to_gray_matches_grayscale() {
        let a = convert(rgba([10, 200, 30, 255]), PixelLayout::Gray);
        let b = grayscale(rgba([10, 200, 30, 255]));
        assert_eq!(a, b);
    }
}
