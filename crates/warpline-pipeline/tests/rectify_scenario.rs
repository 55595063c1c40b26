//! Integration test: rectify a synthetic document photo end to end, once
//! step by step through the processor and once through `rectify`.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use warpline_pipeline::operations::{BlurOptions, ThresholdOptions, WarpOptions};
use warpline_pipeline::threshold::ThresholdKind;
use warpline_pipeline::{
    ContourOptions, CornerOptions, Dimensions, ImageProcessor, PipelineError, RectifyConfig,
    Runtime, rectify,
};

/// Encode a black canvas with one filled white rectangle as PNG.
fn white_rectangle_png(width: u32, height: u32, x: (u32, u32), y: (u32, u32)) -> Vec<u8> {
    let img = image::RgbaImage::from_fn(width, height, |px, py| {
        if (x.0..x.1).contains(&px) && (y.0..y.1).contains(&py) {
            image::Rgba([255, 255, 255, 255])
        } else {
            image::Rgba([0, 0, 0, 255])
        }
    });
    let mut buf = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut buf);
    image::ImageEncoder::write_image(
        encoder,
        img.as_raw(),
        img.width(),
        img.height(),
        image::ExtendedColorType::Rgba8,
    )
    .unwrap();
    buf
}

#[test]
fn step_by_step_rectification_matches_bbox() {
    let runtime = Runtime::init();
    let png = white_rectangle_png(64, 48, (16, 48), (12, 36));
    let mut processor = ImageProcessor::from_bytes(&runtime, &png).unwrap();
    let canvas = processor.dimensions();

    processor
        .blur(BlurOptions {
            size: [5, 5],
            sigma: 0.0,
        })
        .unwrap()
        .threshold(ThresholdOptions {
            kind: ThresholdKind::BinaryInv,
            otsu: true,
            ..ThresholdOptions::default()
        })
        .unwrap();

    let contours = processor.contours(ContourOptions::default()).unwrap();
    let largest = contours
        .largest_contour_area()
        .expect("thresholded image has a contour");
    assert!(largest.area() > 0.0);

    let corners = contours.corner_points(CornerOptions {
        canvas,
        contour: Some(largest),
    });
    for corner in corners.points.clockwise() {
        assert!((0.0..=f64::from(canvas.width)).contains(&corner.x));
        assert!((0.0..=f64::from(canvas.height)).contains(&corner.y));
    }

    let mut warped = ImageProcessor::from_bytes(&runtime, &png).unwrap();
    warped
        .warp(WarpOptions {
            points: corners.points,
            bbox: corners.bbox,
        })
        .unwrap();
    assert_eq!(
        warped.dimensions(),
        Dimensions::new(corners.bbox.width(), corners.bbox.height())
    );
}

#[test]
fn one_shot_rectification_fills_output_with_page() {
    let png = white_rectangle_png(64, 48, (16, 48), (12, 36));
    let result = rectify(&Runtime::init(), &png, &RectifyConfig::default()).unwrap();

    assert!(!result.fallback);
    assert_eq!(
        (result.image.width(), result.image.height()),
        (result.corners.bbox.width(), result.corners.bbox.height())
    );

    let tl = result.corners.points.top_left;
    let br = result.corners.points.bottom_right;
    assert!((tl.x - 16.0).abs() <= 1.0 && (tl.y - 12.0).abs() <= 1.0, "{tl:?}");
    assert!((br.x - 47.0).abs() <= 1.0 && (br.y - 35.0).abs() <= 1.0, "{br:?}");

    // The page now covers the whole output; sample away from the edges.
    let rgba = result.image.to_rgba();
    for (x, y) in [(8, 8), (32, 24), (56, 40)] {
        assert!(rgba.get_pixel(x, y).0[0] > 200, "pixel ({x}, {y}) not bright");
    }
}

#[test]
fn blank_photo_falls_back_or_fails() {
    let png = white_rectangle_png(20, 20, (0, 0), (0, 0));
    let runtime = Runtime::init();

    let result = rectify(&runtime, &png, &RectifyConfig::default()).unwrap();
    assert!(result.fallback);
    assert_eq!((result.image.width(), result.image.height()), (20, 20));

    let strict = RectifyConfig {
        fallback_to_canvas: false,
        ..RectifyConfig::default()
    };
    assert!(matches!(
        rectify(&runtime, &png, &strict),
        Err(PipelineError::NoContours)
    ));
}
