use serde::{Deserialize, Serialize};

use crate::engine::EngineError;

/// Minimum pupil diameter as a fraction of the frame diagonal.
pub const MIN_DIAMETER_RATIO: f64 = 0.0467;
/// Maximum pupil diameter as a fraction of the frame diagonal.
pub const MAX_DIAMETER_RATIO: f64 = 0.1933;
/// Cutoff for axis ratios (PuRe 3.3.3).
pub const RATIO_THRESHOLD: f64 = 0.2;

/// Immutable per-run geometry configuration of the candidate evaluator.
///
/// Built once from the working resolution and passed explicitly to every
/// stage that needs it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct FrameParameters {
    width: u32,
    height: u32,
    min_pupil_diameter: f64,
    max_pupil_diameter: f64,
    ratio_threshold: f64,
    ratio_threshold_inv: f64,
}

impl FrameParameters {
    /// Derives the default PuRe thresholds for a `width x height` frame.
    pub fn new(width: u32, height: u32) -> Result<Self, EngineError> {
        let diagonal = ((width as f64).powi(2) + (height as f64).powi(2)).sqrt();
        Self::with_thresholds(
            width,
            height,
            MIN_DIAMETER_RATIO * diagonal,
            MAX_DIAMETER_RATIO * diagonal,
            RATIO_THRESHOLD,
        )
    }

    pub fn with_thresholds(
        width: u32,
        height: u32,
        min_pupil_diameter: f64,
        max_pupil_diameter: f64,
        ratio_threshold: f64,
    ) -> Result<Self, EngineError> {
        if width == 0 || height == 0 {
            return Err(EngineError::InvalidParameters(format!(
                "frame size must be non-zero, got {}x{}",
                width, height
            )));
        }
        if !min_pupil_diameter.is_finite()
            || !max_pupil_diameter.is_finite()
            || min_pupil_diameter <= 0.0
            || min_pupil_diameter > max_pupil_diameter
        {
            return Err(EngineError::InvalidParameters(format!(
                "pupil diameter bounds must satisfy 0 < min <= max, got [{}, {}]",
                min_pupil_diameter, max_pupil_diameter
            )));
        }
        if !(ratio_threshold > 0.0 && ratio_threshold <= 1.0) {
            return Err(EngineError::InvalidParameters(format!(
                "ratio threshold must be in (0, 1], got {}",
                ratio_threshold
            )));
        }

        Ok(Self {
            width,
            height,
            min_pupil_diameter,
            max_pupil_diameter,
            ratio_threshold,
            ratio_threshold_inv: 1.0 / ratio_threshold,
        })
    }

    /// Same frame, explicit pupil diameter bounds.
    pub fn with_pupil_diameter_bounds(self, min: f64, max: f64) -> Result<Self, EngineError> {
        Self::with_thresholds(self.width, self.height, min, max, self.ratio_threshold)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn min_pupil_diameter(&self) -> f64 {
        self.min_pupil_diameter
    }

    pub fn max_pupil_diameter(&self) -> f64 {
        self.max_pupil_diameter
    }

    pub fn ratio_threshold(&self) -> f64 {
        self.ratio_threshold
    }

    pub fn ratio_threshold_inv(&self) -> f64 {
        self.ratio_threshold_inv
    }

    /// Accepts `ratio` iff it lies in `[R_th, 1/R_th]`.
    ///
    /// Symmetric under `ratio -> 1/ratio`, so width/height labelling does
    /// not matter.
    pub fn ratio_in_range(&self, ratio: f64) -> bool {
        ratio.is_finite() && ratio >= self.ratio_threshold && ratio <= self.ratio_threshold_inv
    }

    /// True when `(x, y)` lies within `[0, W] x [0, H]`.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= 0.0 && y >= 0.0 && x <= self.width as f64 && y <= self.height as f64
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub width: u32,
    pub height: u32,
    pub min_diameter_ratio: f64,
    pub max_diameter_ratio: f64,
    pub ratio_threshold: f64,
    pub canny_low: f32,
    pub canny_high: f32,
    /// Drop collinear interior points of traced segments.
    pub approximate_chains: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            min_diameter_ratio: MIN_DIAMETER_RATIO,
            max_diameter_ratio: MAX_DIAMETER_RATIO,
            ratio_threshold: RATIO_THRESHOLD,
            canny_low: 160.0,
            canny_high: 320.0,
            approximate_chains: true,
        }
    }
}

impl DetectorConfig {
    pub fn from_json(text: &str) -> Result<Self, EngineError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn frame_parameters(&self) -> Result<FrameParameters, EngineError> {
        let diagonal = ((self.width as f64).powi(2) + (self.height as f64).powi(2)).sqrt();
        FrameParameters::with_thresholds(
            self.width,
            self.height,
            self.min_diameter_ratio * diagonal,
            self.max_diameter_ratio * diagonal,
            self.ratio_threshold,
        )
    }
}
