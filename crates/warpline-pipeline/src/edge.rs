//! Canny edge detection and image inversion.
//!
//! [`canny`] wraps [`imageproc::edges::canny`] and returns a binary
//! grayscale image where white pixels (255) are edges and black pixels
//! (0) are background. Color input is converted to grayscale first.
//!
//! [`invert`] flips every color channel. Alpha is left alone so an
//! inverted RGBA image stays visible.

use image::GrayImage;

use crate::handle::ImageHandle;

/// Minimum allowed Canny threshold.
///
/// A low threshold of zero causes every pixel with any gradient to be
/// treated as a potential edge, producing an extremely dense edge map
/// that drowns the document outline in noise contours.
pub const MIN_THRESHOLD: f32 = 1.0;
const _: () = assert!(MIN_THRESHOLD > 0.0);

/// Detect edges using the Canny algorithm.
///
/// Pixels with gradient magnitude above `high_threshold` are definite
/// edges; those between `low_threshold` and `high_threshold` are edges
/// only if connected to a definite edge.
///
/// Both thresholds are clamped to a minimum of [`MIN_THRESHOLD`] and
/// `low_threshold` is clamped to be at most `high_threshold`.
#[must_use = "returns the binary edge map"]
pub fn canny(image: ImageHandle, low_threshold: f32, high_threshold: f32) -> ImageHandle {
    let gray = image.into_gray();
    ImageHandle::from_gray(canny_gray(&gray, low_threshold, high_threshold))
}

/// Canny on an already-grayscale buffer.
#[must_use = "returns the binary edge map"]
pub fn canny_gray(image: &GrayImage, low_threshold: f32, high_threshold: f32) -> GrayImage {
    let high = high_threshold.max(MIN_THRESHOLD);
    let low = low_threshold.max(MIN_THRESHOLD).min(high);
    // Suppression scans interior rows, which an empty image does not have.
    if image.width() == 0 || image.height() == 0 {
        return image.clone();
    }
    imageproc::edges::canny(image, low, high)
}

/// Invert an image (bitwise NOT of every color channel).
#[must_use = "returns the inverted image"]
pub fn invert(image: ImageHandle) -> ImageHandle {
    image.map(
        |mut gray| {
            image::imageops::invert(&mut gray);
            gray
        },
        |mut rgba| {
            image::imageops::invert(&mut rgba);
            rgba
        },
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::handle::PixelLayout;
    use crate::types::RgbaImage;

    /// 20x20 image with a sharp vertical boundary at x = 10.
    fn sharp_edge_image() -> GrayImage {
        GrayImage::from_fn(20, 20, |x, _y| {
            if x < 10 {
                image::Luma([0])
            } else {
                image::Luma([255])
            }
        })
    }

    fn edge_count(image: &GrayImage) -> u32 {
        image.pixels().map(|p| u32::from(p.0[0] > 0)).sum()
    }

    #[test]
    fn blank_image_produces_no_edges() {
        let img = GrayImage::from_fn(20, 20, |_, _| image::Luma([128]));
        let edges = canny_gray(&img, 50.0, 150.0);
        assert_eq!(edges.width(), 20);
        assert_eq!(edges.height(), 20);
        assert_eq!(edge_count(&edges), 0, "expected no edges in uniform image");
    }

    #[test]
    fn empty_image_has_no_edges() {
        let edges = canny_gray(&GrayImage::new(0, 0), 50.0, 150.0);
        assert_eq!(edges.dimensions(), (0, 0));
        let edges = canny(ImageHandle::from_gray(GrayImage::new(7, 0)), 50.0, 150.0);
        assert_eq!((edges.width(), edges.height()), (7, 0));
    }

    #[test]
    fn sharp_edge_detected() {
        let edges = canny_gray(&sharp_edge_image(), 50.0, 150.0);
        assert!(
            edge_count(&edges) > 0,
            "expected edges at sharp boundary, found none"
        );
    }

    #[test]
    fn canny_output_is_binary() {
        let edges = canny_gray(&sharp_edge_image(), 50.0, 150.0);
        assert!(edges.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
    }

    #[test]
    fn canny_on_rgba_converts_to_gray() {
        let rgba = ImageHandle::from_gray(sharp_edge_image()).into_rgba();
        let edges = canny(ImageHandle::from_rgba(rgba), 50.0, 150.0);
        assert_eq!(edges.layout(), PixelLayout::Gray);
        assert_eq!(edges.width(), 20);
        assert!(edge_count(edges.as_gray().unwrap()) > 0);
    }

    #[test]
    fn zero_low_threshold_is_clamped_to_min() {
        let img = sharp_edge_image();
        assert_eq!(
            canny_gray(&img, 0.0, 150.0),
            canny_gray(&img, MIN_THRESHOLD, 150.0)
        );
    }

    #[test]
    fn low_above_high_is_clamped() {
        let img = sharp_edge_image();
        assert_eq!(
            canny_gray(&img, 200.0, 100.0),
            canny_gray(&img, 100.0, 100.0)
        );
    }

    #[test]
    fn invert_flips_gray_values() {
        let mut img = GrayImage::new(5, 5);
        img.put_pixel(1, 1, image::Luma([255]));
        img.put_pixel(3, 3, image::Luma([10]));

        let inverted = invert(ImageHandle::from_gray(img));
        let gray = inverted.as_gray().unwrap();

        assert_eq!(gray.get_pixel(1, 1).0[0], 0);
        assert_eq!(gray.get_pixel(3, 3).0[0], 245);
        assert_eq!(gray.get_pixel(0, 0).0[0], 255);
    }

    #[test]
    fn invert_rgba_keeps_alpha() {
        let img = RgbaImage::from_pixel(2, 2, image::Rgba([0, 100, 255, 200]));
        let inverted = invert(ImageHandle::from_rgba(img));
        assert_eq!(
            inverted.as_rgba().unwrap().get_pixel(0, 0).0,
            [255, 155, 0, 200]
        );
    }

    #[test]
    fn double_invert_is_identity() {
        let mut img = GrayImage::new(5, 5);
        img.put_pixel(2, 2, image::Luma([255]));
        let handle = ImageHandle::from_gray(img);
        assert_eq!(invert(invert(handle.clone())), handle);
    }
}
