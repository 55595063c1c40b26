//! Gaussian blur for noise reduction before thresholding.
//!
//! Wraps [`imageproc::filter::gaussian_blur_f32`] to smooth images,
//! reducing high-frequency noise that would otherwise fragment the
//! thresholded document outline into many small contours.
//!
//! [`blur`] takes a kernel size and a sigma. When sigma is zero it is
//! derived from the larger kernel dimension with the usual
//! `0.3 * ((k - 1) * 0.5 - 1) + 0.8` rule, so `size` alone controls the
//! strength. The underlying filter is isotropic; an asymmetric kernel is
//! approximated by the sigma of its larger side.

use image::GrayImage;

use crate::handle::ImageHandle;
use crate::types::{OperationError, RgbaImage};

/// Sigma for a Gaussian kernel of `size` taps when none is supplied.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn sigma_for_kernel(size: u32) -> f32 {
    0.3f32.mul_add((size as f32 - 1.0).mul_add(0.5, -1.0), 0.8)
}

/// Blur an image with a Gaussian kernel of `size` (width, height) taps.
///
/// Both kernel dimensions must be odd. A `[1, 1]` kernel with no explicit
/// sigma leaves the image unchanged.
///
/// # Errors
///
/// Returns [`OperationError::InvalidParameter`] for an even or zero kernel
/// dimension, or for a negative or non-finite sigma.
pub fn blur(image: ImageHandle, size: [u32; 2], sigma: f64) -> Result<ImageHandle, OperationError> {
    let [kw, kh] = size;
    if kw == 0 || kh == 0 || kw % 2 == 0 || kh % 2 == 0 {
        return Err(OperationError::InvalidParameter(format!(
            "blur kernel size must be odd and positive, got [{kw}, {kh}]"
        )));
    }
    if !sigma.is_finite() || sigma < 0.0 {
        return Err(OperationError::InvalidParameter(format!(
            "blur sigma must be non-negative, got {sigma}"
        )));
    }

    #[allow(clippy::cast_possible_truncation)]
    let sigma = if sigma > 0.0 {
        sigma as f32
    } else if kw.max(kh) == 1 {
        return Ok(image);
    } else {
        sigma_for_kernel(kw.max(kh))
    };

    tracing::trace!(kw, kh, sigma, "gaussian blur");
    Ok(image.map(
        |gray| gaussian_blur(&gray, sigma),
        |rgba| gaussian_blur_rgba(&rgba, sigma),
    ))
}

/// Apply Gaussian blur to a grayscale image.
///
/// Higher `sigma` values produce more smoothing. Non-positive sigma values
/// (zero or negative) return the image unchanged, since `imageproc`'s
/// underlying function panics on `sigma <= 0.0`.
#[must_use = "returns the blurred image"]
pub fn gaussian_blur(image: &GrayImage, sigma: f32) -> GrayImage {
    if sigma <= 0.0 {
        return image.clone();
    }

    imageproc::filter::gaussian_blur_f32(image, sigma)
}

/// Apply Gaussian blur to an RGBA image by blurring each channel
/// independently.
///
/// `imageproc::filter::gaussian_blur_f32` only accepts `GrayImage`, so
/// this function splits the RGBA image into four single-channel images,
/// blurs each, and reassembles.
///
/// Non-positive sigma values return the image unchanged.
#[must_use = "returns the blurred RGBA image"]
pub fn gaussian_blur_rgba(image: &RgbaImage, sigma: f32) -> RgbaImage {
    if sigma <= 0.0 {
        return image.clone();
    }

    let (w, h) = (image.width(), image.height());

    let channels: [GrayImage; 4] = std::array::from_fn(|c| {
        GrayImage::from_fn(w, h, |x, y| image::Luma([image.get_pixel(x, y).0[c]]))
    });

    let blurred: [GrayImage; 4] =
        std::array::from_fn(|c| imageproc::filter::gaussian_blur_f32(&channels[c], sigma));

    RgbaImage::from_fn(w, h, |x, y| {
        image::Rgba([
            blurred[0].get_pixel(x, y).0[0],
            blurred[1].get_pixel(x, y).0[0],
            blurred[2].get_pixel(x, y).0[0],
            blurred[3].get_pixel(x, y).0[0],
        ])
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Create a test image with a sharp black-to-white boundary at x=5.
    fn sharp_edge_image() -> GrayImage {
        GrayImage::from_fn(10, 10, |x, _y| {
            if x < 5 {
                image::Luma([0])
            } else {
                image::Luma([255])
            }
        })
    }

    #[test]
    fn derived_sigma_for_common_kernels() {
        assert!((sigma_for_kernel(3) - 0.8).abs() < 1e-6);
        assert!((sigma_for_kernel(5) - 1.1).abs() < 1e-6);
        assert!((sigma_for_kernel(7) - 1.4).abs() < 1e-6);
    }

    #[test]
    fn even_kernel_is_rejected() {
        let handle = ImageHandle::from_gray(sharp_edge_image());
        let err = blur(handle, [4, 5], 0.0).unwrap_err();
        assert!(matches!(err, OperationError::InvalidParameter(_)));
    }

    #[test]
    fn negative_sigma_is_rejected() {
        let handle = ImageHandle::from_gray(sharp_edge_image());
        assert!(blur(handle, [5, 5], -1.0).is_err());
    }

    #[test]
    fn unit_kernel_is_identity() {
        let handle = ImageHandle::from_gray(sharp_edge_image());
        let blurred = blur(handle.clone(), [1, 1], 0.0).unwrap();
        assert_eq!(blurred, handle);
    }

    #[test]
    fn blur_keeps_layout_and_dimensions() {
        let handle = ImageHandle::from_rgba(RgbaImage::new(17, 31));
        let blurred = blur(handle, [5, 5], 0.0).unwrap();
        assert_eq!(blurred.channels(), 4);
        assert_eq!(blurred.width(), 17);
        assert_eq!(blurred.height(), 31);
    }

    #[test]
    fn zero_sigma_returns_identical_image() {
        let img = sharp_edge_image();
        assert_eq!(gaussian_blur(&img, 0.0), img);
    }

    #[test]
    fn blur_smooths_sharp_edge() {
        let handle = ImageHandle::from_gray(sharp_edge_image());
        let blurred = blur(handle, [5, 5], 0.0).unwrap();
        let gray = blurred.as_gray().unwrap();

        let left_of_edge = gray.get_pixel(4, 5).0[0];
        let right_of_edge = gray.get_pixel(5, 5).0[0];
        assert!(
            left_of_edge > 0,
            "expected blur to raise left-of-edge above 0, got {left_of_edge}",
        );
        assert!(
            right_of_edge < 255,
            "expected blur to lower right-of-edge below 255, got {right_of_edge}",
        );
    }

    #[test]
    fn uniform_image_unchanged_by_blur() {
        let img = GrayImage::from_fn(10, 10, |_, _| image::Luma([128]));
        let blurred = gaussian_blur(&img, 1.4);
        for pixel in blurred.pixels() {
            let diff = i16::from(pixel.0[0]) - 128;
            assert!(
                diff.abs() <= 1,
                "expected uniform image to stay near 128 after blur, got {}",
                pixel.0[0],
            );
        }
    }

    #[test]
    #[allow(clippy::cast_possible_truncation)]
    fn rgba_blur_matches_per_channel_gray_blur() {
        let img = RgbaImage::from_fn(10, 10, |x, y| {
            image::Rgba([
                ((x * 25) % 256) as u8,
                ((y * 30) % 256) as u8,
                (((x + y) * 20) % 256) as u8,
                255,
            ])
        });
        let sigma = 1.4;
        let rgba_blurred = gaussian_blur_rgba(&img, sigma);

        let (w, h) = (img.width(), img.height());
        for c in 0..4 {
            let chan = GrayImage::from_fn(w, h, |x, y| image::Luma([img.get_pixel(x, y).0[c]]));
            let chan_blurred = gaussian_blur(&chan, sigma);
            for y in 0..h {
                for x in 0..w {
                    assert_eq!(
                        rgba_blurred.get_pixel(x, y).0[c],
                        chan_blurred.get_pixel(x, y).0[0],
                        "mismatch at ({x},{y}) channel {c}",
                    );
                }
            }
        }
    }
}
