//! Uniform border padding.
//!
//! Adds `size` pixels on every side. The padding is either a constant
//! color or an extrapolation of the image itself:
//!
//! ```text
//! replicate:   aaaaaa|abcdefgh|hhhhhhh
//! reflect:     fedcba|abcdefgh|hgfedcb
//! reflect101:  gfedcb|abcdefgh|gfedcba
//! wrap:        cdefgh|abcdefgh|abcdefg
//! ```

use image::{ImageBuffer, Pixel};
use serde::{Deserialize, Serialize};

use crate::handle::ImageHandle;
use crate::types::OperationError;

/// How border pixels are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BorderKind {
    /// Fill with a fixed color.
    #[default]
    Constant,
    /// Repeat the outermost row or column.
    Replicate,
    /// Mirror including the edge pixel.
    Reflect,
    /// Mirror excluding the edge pixel.
    #[serde(rename = "reflect101")]
    Reflect101,
    /// Tile the image.
    Wrap,
}

impl BorderKind {
    /// Map an out-of-range index back into `[0, n)`, or `None` for a
    /// constant border.
    fn source_index(self, i: i64, n: i64) -> Option<i64> {
        if (0..n).contains(&i) {
            return Some(i);
        }
        match self {
            Self::Constant => None,
            Self::Replicate => Some(i.clamp(0, n - 1)),
            Self::Wrap => Some(i.rem_euclid(n)),
            Self::Reflect => {
                let period = 2 * n;
                let j = i.rem_euclid(period);
                Some(if j < n { j } else { period - 1 - j })
            }
            Self::Reflect101 => {
                if n == 1 {
                    return Some(0);
                }
                let period = 2 * (n - 1);
                let j = i.rem_euclid(period);
                Some(if j < n { j } else { period - j })
            }
        }
    }
}

/// Pad `image` by `size` pixels on every side.
///
/// `color` is RGBA; a grayscale image uses its first component.
///
/// # Errors
///
/// Returns [`OperationError::InvalidParameter`] when an extrapolating
/// kind is asked to pad an empty image.
pub fn border(
    image: ImageHandle,
    size: u32,
    kind: BorderKind,
    color: [u8; 4],
) -> Result<ImageHandle, OperationError> {
    if size == 0 {
        return Ok(image);
    }
    if kind != BorderKind::Constant && (image.width() == 0 || image.height() == 0) {
        return Err(OperationError::InvalidParameter(format!(
            "{kind:?} border needs a non-empty image"
        )));
    }
    let grown = |side: u32| size.checked_mul(2).and_then(|both| both.checked_add(side));
    let (Some(out_w), Some(out_h)) = (grown(image.width()), grown(image.height())) else {
        return Err(OperationError::InvalidParameter(format!(
            "border of {size} does not fit a {}x{} image",
            image.width(),
            image.height()
        )));
    };
    Ok(image.map(
        |gray| pad(&gray, (out_w, out_h), size, kind, &color[..1]),
        |rgba| pad(&rgba, (out_w, out_h), size, kind, &color),
    ))
}

fn pad<P: Pixel<Subpixel = u8>>(
    image: &ImageBuffer<P, Vec<u8>>,
    (out_w, out_h): (u32, u32),
    size: u32,
    kind: BorderKind,
    color: &[u8],
) -> ImageBuffer<P, Vec<u8>> {
    let (w, h) = image.dimensions();
    let fill = *P::from_slice(color);
    let offset = i64::from(size);
    ImageBuffer::from_fn(out_w, out_h, |x, y| {
        let sx = kind.source_index(i64::from(x) - offset, i64::from(w));
        let sy = kind.source_index(i64::from(y) - offset, i64::from(h));
        match (sx, sy) {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            (Some(sx), Some(sy)) => *image.get_pixel(sx as u32, sy as u32),
            _ => fill,
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{GrayImage, RgbaImage};

    /// 1-row gray image `[10, 20, 30, 40]`.
    fn row() -> ImageHandle {
        let mut img = GrayImage::new(4, 1);
        for x in 0..4 {
            #[allow(clippy::cast_possible_truncation)]
            img.put_pixel(x, 0, image::Luma([(x as u8 + 1) * 10]));
        }
        ImageHandle::from_gray(img)
    }

    fn middle_row(handle: &ImageHandle) -> Vec<u8> {
        let w = handle.width() as usize;
        let y = (handle.height() / 2) as usize;
        handle.as_raw()[y * w..(y + 1) * w].to_vec()
    }

    #[test]
    fn border_grows_every_side() {
        let out = border(
            ImageHandle::from_rgba(RgbaImage::new(5, 3)),
            10,
            BorderKind::Constant,
            [255; 4],
        )
        .unwrap();
        assert_eq!((out.width(), out.height()), (25, 23));
    }

    #[test]
    fn border_past_u32_range_is_rejected() {
        for kind in [BorderKind::Constant, BorderKind::Replicate] {
            let err = border(row(), u32::MAX / 2 + 1, kind, [0; 4]).unwrap_err();
            assert!(matches!(err, OperationError::InvalidParameter(_)), "{kind:?}");
        }
        // The one-pixel height still fits; the four-pixel width does not.
        let err = border(row(), u32::MAX / 2, BorderKind::Constant, [0; 4]).unwrap_err();
        assert!(matches!(err, OperationError::InvalidParameter(_)));
    }

    #[test]
    fn constant_border_uses_color() {
        let out = border(
            ImageHandle::from_rgba(RgbaImage::new(2, 2)),
            1,
            BorderKind::Constant,
            [1, 2, 3, 4],
        )
        .unwrap();
        let rgba = out.as_rgba().unwrap();
        assert_eq!(rgba.get_pixel(0, 0).0, [1, 2, 3, 4]);
        assert_eq!(rgba.get_pixel(1, 1).0, [0, 0, 0, 0]);
    }

    #[test]
    fn replicate_border() {
        let out = border(row(), 2, BorderKind::Replicate, [0; 4]).unwrap();
        assert_eq!(middle_row(&out), [10, 10, 10, 20, 30, 40, 40, 40]);
    }

    #[test]
    fn reflect_border() {
        let out = border(row(), 2, BorderKind::Reflect, [0; 4]).unwrap();
        assert_eq!(middle_row(&out), [20, 10, 10, 20, 30, 40, 40, 30]);
    }

    #[test]
    fn reflect101_border() {
        let out = border(row(), 2, BorderKind::Reflect101, [0; 4]).unwrap();
        assert_eq!(middle_row(&out), [30, 20, 10, 20, 30, 40, 30, 20]);
    }

    #[test]
    fn wrap_border() {
        let out = border(row(), 2, BorderKind::Wrap, [0; 4]).unwrap();
        assert_eq!(middle_row(&out), [30, 40, 10, 20, 30, 40, 10, 20]);
    }

    #[test]
    fn reflect_wider_than_image() {
        // Period of 2n: 10 20 30 40 40 30 20 10 | 10 ...
        assert_eq!(BorderKind::Reflect.source_index(-5, 4), Some(3));
        assert_eq!(BorderKind::Reflect.source_index(9, 4), Some(1));
        assert_eq!(BorderKind::Reflect101.source_index(1, 1), Some(0));
    }

    #[test]
    fn zero_size_is_identity() {
        let handle = row();
        assert_eq!(
            border(handle.clone(), 0, BorderKind::Reflect, [0; 4]).unwrap(),
            handle
        );
    }

    #[test]
    fn extrapolating_empty_image_is_rejected() {
        let empty = ImageHandle::from_gray(GrayImage::new(0, 0));
        assert!(border(empty, 2, BorderKind::Wrap, [0; 4]).is_err());
    }

    #[test]
    fn kind_names() {
        let kind: BorderKind = serde_json::from_str("\"reflect101\"").unwrap();
        assert_eq!(kind, BorderKind::Reflect101);
    }
}
