use image::{DynamicImage, GrayImage, Luma};

use crate::engine::EngineError;

/// Grayscale conversion plus contrast normalization.
pub trait IntensityNormalizer {
    fn normalize(&self, frame: &DynamicImage) -> GrayImage;
}

/// Edge detection plus binarization.
pub trait EdgeMapBuilder {
    fn build(&self, gray: &GrayImage) -> GrayImage;
}

/// Morphological refinement of a binary edge map. Implementations must
/// return an image with the input's dimensions.
pub trait EdgeTopologyRefiner {
    fn refine(&self, edges: &GrayImage) -> GrayImage;
}

/// Luma conversion followed by a min/max stretch to `0..=255`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MinMaxNormalizer;

impl IntensityNormalizer for MinMaxNormalizer {
    fn normalize(&self, frame: &DynamicImage) -> GrayImage {
        let mut gray = frame.to_luma8();
        let (min, max) = gray
            .pixels()
            .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));

        if max <= min {
            // Flat frame: no contrast, maps to zero.
            for p in gray.pixels_mut() {
                *p = Luma([0]);
            }
            return gray;
        }

        let scale = 255.0 / (max - min) as f32;
        for p in gray.pixels_mut() {
            let v = (p[0] - min) as f32 * scale;
            *p = Luma([v.round().clamp(0.0, 255.0) as u8]);
        }
        gray
    }
}

/// Canny edge detector followed by a threshold at 127.
#[derive(Debug, Clone, Copy)]
pub struct CannyEdgeMap {
    pub low_threshold: f32,
    pub high_threshold: f32,
}

impl Default for CannyEdgeMap {
    fn default() -> Self {
        Self {
            low_threshold: 160.0,
            high_threshold: 320.0,
        }
    }
}

impl EdgeMapBuilder for CannyEdgeMap {
    fn build(&self, gray: &GrayImage) -> GrayImage {
        let mut edges = imageproc::edges::canny(gray, self.low_threshold, self.high_threshold);
        binarize(&mut edges, 127);
        edges
    }
}

/// Identity refinement: hands the edge map through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughRefiner;

impl EdgeTopologyRefiner for PassthroughRefiner {
    fn refine(&self, edges: &GrayImage) -> GrayImage {
        edges.clone()
    }
}

/// Maps pixels `> threshold` to 255 and everything else to 0.
pub fn binarize(img: &mut GrayImage, threshold: u8) {
    for p in img.pixels_mut() {
        *p = Luma([if p[0] > threshold { 255 } else { 0 }]);
    }
}

/// Runs a refiner and enforces its dimension contract.
pub fn refine_checked(
    refiner: &dyn EdgeTopologyRefiner,
    edges: &GrayImage,
) -> Result<GrayImage, EngineError> {
    let refined = refiner.refine(edges);
    let (width, height) = edges.dimensions();
    crate::engine::ensure_dimensions(&refined, width, height)?;
    Ok(refined)
}
