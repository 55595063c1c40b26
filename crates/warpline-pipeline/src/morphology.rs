//! Rectangular morphology: erosion, dilation, and the morphological
//! gradient.
//!
//! The structuring element is a `width × height` rectangle anchored at
//! `(width / 2, height / 2)`. Pixels outside the image are ignored rather than padded, which means erosion never darkens the
//! border and dilation never brightens it beyond the image's own values.
//!
//! Grayscale images go through `imageproc::morphology` with a
//! rectangular [`Mask`]. A rectangle is separable, so RGBA images (and
//! kernels too large for a `Mask`) take a horizontal min/max pass followed
//! by a vertical one, every channel (alpha included) independently.

use image::{ImageBuffer, Luma, Pixel};
use imageproc::morphology::{Mask, grayscale_dilate, grayscale_erode};

use crate::handle::ImageHandle;
use crate::types::{GrayImage, OperationError};

type Raster<P> = ImageBuffer<P, Vec<u8>>;

/// Largest kernel side `Mask` accepts.
const MAX_MASK_SIDE: u32 = 511;

#[derive(Debug, Clone, Copy)]
enum Reduce {
    Min,
    Max,
}

impl Reduce {
    fn pick(self) -> fn(u8, u8) -> u8 {
        match self {
            Self::Min => u8::min,
            Self::Max => u8::max,
        }
    }
}

fn check_kernel(size: [u32; 2]) -> Result<(), OperationError> {
    if size[0] == 0 || size[1] == 0 {
        return Err(OperationError::InvalidParameter(format!(
            "morphology kernel must be non-empty, got [{}, {}]",
            size[0], size[1]
        )));
    }
    Ok(())
}

/// Shrink bright regions by taking the minimum over the kernel window,
/// `iterations` times.
///
/// # Errors
///
/// Returns [`OperationError::InvalidParameter`] for a zero-sized kernel.
pub fn erode(
    image: ImageHandle,
    size: [u32; 2],
    iterations: u32,
) -> Result<ImageHandle, OperationError> {
    check_kernel(size)?;
    Ok(image.map(
        |gray| repeat_gray(gray, size, iterations, Reduce::Min),
        |rgba| repeat(rgba, size, iterations, u8::min),
    ))
}

/// Grow bright regions by taking the maximum over the kernel window,
/// `iterations` times.
///
/// # Errors
///
/// Returns [`OperationError::InvalidParameter`] for a zero-sized kernel.
pub fn dilate(
    image: ImageHandle,
    size: [u32; 2],
    iterations: u32,
) -> Result<ImageHandle, OperationError> {
    check_kernel(size)?;
    Ok(image.map(
        |gray| repeat_gray(gray, size, iterations, Reduce::Max),
        |rgba| repeat(rgba, size, iterations, u8::max),
    ))
}

/// Dilation minus erosion: highlights the outline of every region.
///
/// # Errors
///
/// Returns [`OperationError::InvalidParameter`] for a zero-sized kernel.
pub fn morphological_gradient(
    image: ImageHandle,
    size: [u32; 2],
) -> Result<ImageHandle, OperationError> {
    check_kernel(size)?;
    Ok(image.map(
        |gray| {
            let mask = rect_mask(size);
            let dilated = gray_pass(&gray, size, mask.as_ref(), Reduce::Max);
            let eroded = gray_pass(&gray, size, mask.as_ref(), Reduce::Min);
            subtract(dilated, &eroded)
        },
        |rgba| {
            let dilated = rect_filter(&rgba, size, u8::max);
            let eroded = rect_filter(&rgba, size, u8::min);
            subtract(dilated, &eroded)
        },
    ))
}

fn subtract<P: Pixel<Subpixel = u8>>(mut grown: Raster<P>, eroded: &Raster<P>) -> Raster<P> {
    for (g, e) in grown.iter_mut().zip(eroded.iter()) {
        *g = g.saturating_sub(*e);
    }
    grown
}

/// A `size` rectangle anchored at its center, or `None` when either side
/// is too large for [`Mask`].
fn rect_mask(size: [u32; 2]) -> Option<Mask> {
    let [kw, kh] = size;
    if kw > MAX_MASK_SIDE || kh > MAX_MASK_SIDE {
        return None;
    }
    let anchor_x = u8::try_from(kw / 2).ok()?;
    let anchor_y = u8::try_from(kh / 2).ok()?;
    let element = GrayImage::from_pixel(kw, kh, Luma([u8::MAX]));
    Some(Mask::from_image(&element, anchor_x, anchor_y))
}

fn gray_pass(image: &GrayImage, size: [u32; 2], mask: Option<&Mask>, reduce: Reduce) -> GrayImage {
    // imageproc walks rows by width, which an empty image does not have.
    if image.width() == 0 || image.height() == 0 {
        return image.clone();
    }
    match (mask, reduce) {
        (Some(mask), Reduce::Min) => grayscale_erode(image, mask),
        (Some(mask), Reduce::Max) => grayscale_dilate(image, mask),
        (None, _) => rect_filter(image, size, reduce.pick()),
    }
}

fn repeat_gray(image: GrayImage, size: [u32; 2], iterations: u32, reduce: Reduce) -> GrayImage {
    let mask = rect_mask(size);
    (0..iterations).fold(image, |acc, _| gray_pass(&acc, size, mask.as_ref(), reduce))
}

fn repeat<P: Pixel<Subpixel = u8>>(
    image: Raster<P>,
    size: [u32; 2],
    iterations: u32,
    pick: fn(u8, u8) -> u8,
) -> Raster<P> {
    (0..iterations).fold(image, |acc, _| rect_filter(&acc, size, pick))
}

/// One separable pass of `pick` over a `size` rectangle.
fn rect_filter<P: Pixel<Subpixel = u8>>(
    image: &Raster<P>,
    size: [u32; 2],
    pick: fn(u8, u8) -> u8,
) -> Raster<P> {
    let (w, h) = image.dimensions();
    let (w, h) = (w as usize, h as usize);
    let channels = usize::from(P::CHANNEL_COUNT);
    let [kw, kh] = size.map(|k| k as usize);

    let src: &[u8] = image.as_raw();
    let mut horizontal = image.clone();
    {
        let dst: &mut [u8] = &mut horizontal;
        for y in 0..h {
            for x in 0..w {
                let (lo, hi) = window(x, kw, w);
                for c in 0..channels {
                    let at = |xx: usize| src[(y * w + xx) * channels + c];
                    dst[(y * w + x) * channels + c] =
                        (lo + 1..hi).fold(at(lo), |acc, xx| pick(acc, at(xx)));
                }
            }
        }
    }

    let mut out = horizontal.clone();
    {
        let src: &[u8] = horizontal.as_raw();
        let dst: &mut [u8] = &mut out;
        for y in 0..h {
            let (lo, hi) = window(y, kh, h);
            for x in 0..w {
                for c in 0..channels {
                    let at = |yy: usize| src[(yy * w + x) * channels + c];
                    dst[(y * w + x) * channels + c] =
                        (lo + 1..hi).fold(at(lo), |acc, yy| pick(acc, at(yy)));
                }
            }
        }
    }
    out
}

/// Half-open index range covered by a centered window of `k` taps at `i`,
/// clipped to `[0, n)`.
const fn window(i: usize, k: usize, n: usize) -> (usize, usize) {
    let anchor = k / 2;
    let lo = i.saturating_sub(anchor);
    let hi = i + (k - anchor);
    (lo, if hi < n { hi } else { n })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{GrayImage, RgbaImage};

    /// 9x9 black image with a white 3x3 square at (3..6, 3..6).
    fn square() -> GrayImage {
        GrayImage::from_fn(9, 9, |x, y| {
            if (3..6).contains(&x) && (3..6).contains(&y) {
                image::Luma([255])
            } else {
                image::Luma([0])
            }
        })
    }

    fn white_count(handle: &ImageHandle) -> usize {
        handle.as_raw().iter().filter(|&&v| v == 255).count()
    }

    #[test]
    fn window_is_centered_and_clipped() {
        assert_eq!(window(4, 3, 9), (3, 6));
        assert_eq!(window(0, 3, 9), (0, 2));
        assert_eq!(window(8, 3, 9), (7, 9));
        // Even kernels extend one further before the anchor.
        assert_eq!(window(4, 4, 9), (2, 6));
    }

    #[test]
    fn erode_removes_small_square() {
        let out = erode(ImageHandle::from_gray(square()), [5, 5], 1).unwrap();
        assert_eq!(white_count(&out), 0);
    }

    #[test]
    fn erode_shrinks_square_to_center() {
        let out = erode(ImageHandle::from_gray(square()), [3, 3], 1).unwrap();
        assert_eq!(white_count(&out), 1);
        assert_eq!(out.as_gray().unwrap().get_pixel(4, 4).0[0], 255);
    }

    #[test]
    fn dilate_grows_square() {
        let out = dilate(ImageHandle::from_gray(square()), [3, 3], 1).unwrap();
        assert_eq!(white_count(&out), 25);
    }

    #[test]
    fn iterations_compound() {
        let once = dilate(ImageHandle::from_gray(square()), [3, 3], 2).unwrap();
        assert_eq!(white_count(&once), 49);
    }

    #[test]
    fn zero_iterations_is_identity() {
        let handle = ImageHandle::from_gray(square());
        assert_eq!(erode(handle.clone(), [3, 3], 0).unwrap(), handle);
    }

    #[test]
    fn zero_kernel_is_rejected() {
        let err = dilate(ImageHandle::from_gray(square()), [0, 3], 1).unwrap_err();
        assert!(matches!(err, OperationError::InvalidParameter(_)));
    }

    #[test]
    fn erode_ignores_out_of_image_pixels() {
        let white = GrayImage::from_pixel(4, 4, image::Luma([255]));
        let out = erode(ImageHandle::from_gray(white), [3, 3], 1).unwrap();
        assert!(out.as_raw().iter().all(|&v| v == 255));
    }

    #[test]
    fn gradient_outlines_square() {
        let out = morphological_gradient(ImageHandle::from_gray(square()), [3, 3]).unwrap();
        let gray = out.as_gray().unwrap();
        assert_eq!(gray.get_pixel(4, 4).0[0], 0, "interior is flat");
        assert_eq!(gray.get_pixel(3, 3).0[0], 255, "inner edge");
        assert_eq!(gray.get_pixel(2, 2).0[0], 255, "outer edge");
        assert_eq!(gray.get_pixel(0, 0).0[0], 0, "far background");
    }

    #[test]
    fn gray_and_rgba_paths_agree() {
        let gray = ImageHandle::from_gray(square());
        let rgba = ImageHandle::from_rgba(gray.to_rgba());
        for size in [[3, 3], [4, 2], [1, 5]] {
            let from_gray = dilate(gray.clone(), size, 1).unwrap().into_gray();
            let from_rgba = dilate(rgba.clone(), size, 1).unwrap().into_gray();
            assert_eq!(from_gray, from_rgba, "dilate {size:?}");
            let from_gray = erode(gray.clone(), size, 1).unwrap().into_gray();
            let from_rgba = erode(rgba.clone(), size, 1).unwrap().into_gray();
            assert_eq!(from_gray, from_rgba, "erode {size:?}");
        }
    }

    #[test]
    fn oversized_kernel_falls_back_to_separable_pass() {
        assert!(rect_mask([512, 3]).is_none());
        let out = dilate(ImageHandle::from_gray(square()), [600, 1], 1).unwrap();
        // Every row that held the square is now white end to end.
        assert_eq!(white_count(&out), 27);
    }

    #[test]
    fn empty_gray_image_passes_through() {
        let empty = ImageHandle::from_gray(GrayImage::new(0, 0));
        assert_eq!(erode(empty.clone(), [3, 3], 1).unwrap(), empty);
        assert_eq!(morphological_gradient(empty.clone(), [3, 3]).unwrap(), empty);
    }

    #[test]
    fn rgba_channels_are_independent() {
        let img = RgbaImage::from_fn(3, 1, |x, _| {
            if x == 1 {
                image::Rgba([255, 0, 0, 255])
            } else {
                image::Rgba([0, 255, 0, 255])
            }
        });
        let out = dilate(ImageHandle::from_rgba(img), [3, 1], 1).unwrap();
        let rgba = out.as_rgba().unwrap();
        assert_eq!(rgba.get_pixel(0, 0).0, [255, 255, 0, 255]);
        assert_eq!(rgba.get_pixel(1, 0).0, [255, 255, 0, 255]);
    }
}
