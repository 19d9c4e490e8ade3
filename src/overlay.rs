//! Annotated frames for visual inspection of accepted candidates.

use std::path::Path;

use image::{DynamicImage, GrayImage, Rgb, RgbImage};
use imageproc::drawing::draw_line_segment_mut;

use crate::engine::EngineError;
use crate::postprocess::Candidate;

const OUTLINE_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// RGB copy of `gray` with every candidate's segment drawn as an open red
/// polyline.
pub fn draw_candidates(gray: &GrayImage, candidates: &[Candidate]) -> RgbImage {
    let mut canvas = DynamicImage::ImageLuma8(gray.clone()).to_rgb8();
    let (width, height) = canvas.dimensions();

    for candidate in candidates {
        let points = &candidate.segment.points;
        if let [(x, y)] = points.as_slice() {
            if *x >= 0 && *y >= 0 && (*x as u32) < width && (*y as u32) < height {
                canvas.put_pixel(*x as u32, *y as u32, OUTLINE_COLOR);
            }
            continue;
        }
        for pair in points.windows(2) {
            let (x0, y0) = pair[0];
            let (x1, y1) = pair[1];
            draw_line_segment_mut(
                &mut canvas,
                (x0 as f32, y0 as f32),
                (x1 as f32, y1 as f32),
                OUTLINE_COLOR,
            );
        }
    }

    canvas
}

pub fn save_png<P: AsRef<Path>>(image: &RgbImage, path: P) -> Result<(), EngineError> {
    image.save_with_format(path, image::ImageFormat::Png)?;
    Ok(())
}
