use std::collections::BTreeMap;

use image::GrayImage;
use serde::Serialize;
use tracing::{debug, trace};

use crate::confidence;
use crate::contours::Segment;
use crate::ellipse::{fit_ellipse, FittedEllipse, MIN_FIT_POINTS};
use crate::engine::{ensure_dimensions, EngineError};
use crate::geometry::{approx_diameter, centroid, rhombus_contains, to_local_frame};
use crate::image_impl::{min_area_rect, Point2d};
use crate::types::FrameParameters;

/// Segments shorter than this cannot support an ellipse fit (PuRe 3.3.1).
pub const MIN_SEGMENT_POINTS: usize = MIN_FIT_POINTS;

/// An accepted pupil candidate with its confidence measures.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub segment: Segment,
    pub ellipse: FittedEllipse,
    pub aspect_ratio: f64,
    pub angular_spread: f64,
    pub outline_contrast: f64,
}

/// Cascade stage that turned a segment down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    TooFewPoints,
    DiameterTooLarge,
    DiameterTooSmall,
    DegenerateBoundingRect,
    BoundingRectRatio,
    EllipseFitFailed,
    CenterOutsideFrame,
    EllipseRatio,
    CentroidOutsideRhombus,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SegmentOutcome {
    Accepted(Candidate),
    Rejected(Rejection),
}

/// Candidates of one frame, in segment order, plus rejection counts.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FrameReport {
    pub candidates: Vec<Candidate>,
    pub rejections: BTreeMap<Rejection, usize>,
}

impl FrameReport {
    pub fn rejected(&self) -> usize {
        self.rejections.values().sum()
    }
}

/// The PuRe segment filter cascade, ellipse validation and scoring.
///
/// Stateless apart from its parameters: every call only reads its inputs.
#[derive(Debug, Clone, Copy)]
pub struct CandidateEvaluator {
    params: FrameParameters,
}

impl CandidateEvaluator {
    pub fn new(params: FrameParameters) -> Self {
        Self { params }
    }

    /// Evaluates every segment of a frame.
    ///
    /// Fails fast on an empty segment list or a grayscale image whose size
    /// differs from the configured frame.
    pub fn evaluate_frame(&self, segments: &[Segment], gray: &GrayImage) -> Result<FrameReport, EngineError> {
        if segments.is_empty() {
            return Err(EngineError::EmptySegments);
        }
        ensure_dimensions(gray, self.params.width(), self.params.height())?;

        let outcomes = self.evaluate_all(segments, gray);

        let mut report = FrameReport::default();
        for outcome in outcomes {
            match outcome {
                SegmentOutcome::Accepted(candidate) => report.candidates.push(candidate),
                SegmentOutcome::Rejected(reason) => *report.rejections.entry(reason).or_insert(0) += 1,
            }
        }

        debug!(
            "{} segments: {} candidates, {} rejected {:?}",
            segments.len(),
            report.candidates.len(),
            report.rejected(),
            report.rejections
        );
        Ok(report)
    }

    #[cfg(not(feature = "parallel"))]
    fn evaluate_all(&self, segments: &[Segment], gray: &GrayImage) -> Vec<SegmentOutcome> {
        segments.iter().map(|s| self.evaluate_segment(s, gray)).collect()
    }

    #[cfg(feature = "parallel")]
    fn evaluate_all(&self, segments: &[Segment], gray: &GrayImage) -> Vec<SegmentOutcome> {
        use rayon::prelude::*;
        // Indexed collect keeps discovery order.
        segments.par_iter().map(|s| self.evaluate_segment(s, gray)).collect()
    }

    /// Runs the full cascade on one segment; the first failing stage wins.
    pub fn evaluate_segment(&self, segment: &Segment, gray: &GrayImage) -> SegmentOutcome {
        let ellipse = match self.validate(segment) {
            Ok(ellipse) => ellipse,
            Err(reason) => {
                trace!("segment of {} points rejected: {:?}", segment.len(), reason);
                return SegmentOutcome::Rejected(reason);
            }
        };

        SegmentOutcome::Accepted(Candidate {
            segment: segment.clone(),
            ellipse,
            aspect_ratio: confidence::aspect_ratio(&ellipse),
            angular_spread: confidence::angular_spread(&segment.points, ellipse.center),
            outline_contrast: confidence::outline_contrast(gray, &ellipse),
        })
    }

    /// Geometric part of the cascade (PuRe 3.3.1 - 3.3.5).
    pub fn validate(&self, segment: &Segment) -> Result<FittedEllipse, Rejection> {
        let points = &segment.points;
        let params = &self.params;

        let mean = match centroid(points) {
            Some(mean) if points.len() >= MIN_SEGMENT_POINTS => mean,
            _ => return Err(Rejection::TooFewPoints),
        };

        let diameter = approx_diameter(points, params.max_pupil_diameter());
        if diameter > params.max_pupil_diameter() {
            return Err(Rejection::DiameterTooLarge);
        }
        if diameter < params.min_pupil_diameter() {
            return Err(Rejection::DiameterTooSmall);
        }

        // Coarse curvature check before paying for the fit.
        let pts: Vec<Point2d> = points.iter().map(|&p| Point2d::from_pixel(p)).collect();
        let rect = min_area_rect(&pts).ok_or(Rejection::DegenerateBoundingRect)?;
        if !(rect.size.width > 0.0 && rect.size.height > 0.0) {
            return Err(Rejection::DegenerateBoundingRect);
        }
        if !params.ratio_in_range(rect.size.width / rect.size.height) {
            return Err(Rejection::BoundingRectRatio);
        }

        let ellipse = fit_ellipse(points).ok_or(Rejection::EllipseFitFailed)?;

        if !params.contains(ellipse.center.x, ellipse.center.y) {
            return Err(Rejection::CenterOutsideFrame);
        }

        match ellipse.axis_ratio() {
            Some(ratio) if params.ratio_in_range(ratio) => {}
            _ => return Err(Rejection::EllipseRatio),
        }

        let local = to_local_frame(mean, ellipse.center, ellipse.angle);
        if !rhombus_contains(local, ellipse.first_ax, ellipse.second_ax) {
            return Err(Rejection::CentroidOutsideRhombus);
        }

        Ok(ellipse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn params_320x240() -> FrameParameters {
        FrameParameters::new(320, 240)
            .unwrap()
            .with_pupil_diameter_bounds(15.0, 60.0)
            .unwrap()
    }

    fn circle_segment(cx: f64, cy: f64, r: f64, n: usize) -> Segment {
        let points = (0..n)
            .map(|i| {
                let t = 2.0 * std::f64::consts::PI * i as f64 / n as f64;
                ((cx + r * t.cos()).round() as i32, (cy + r * t.sin()).round() as i32)
            })
            .collect();
        Segment::new(points)
    }

    #[test]
    fn test_small_circle_is_single_candidate() {
        let evaluator = CandidateEvaluator::new(params_320x240());
        let gray = GrayImage::from_pixel(320, 240, Luma([128]));
        let segments = vec![circle_segment(50.0, 50.0, 10.0, 6)];

        let report = evaluator.evaluate_frame(&segments, &gray).unwrap();
        assert_eq!(report.candidates.len(), 1);
        let c = &report.candidates[0];
        assert!(c.aspect_ratio > 0.9, "aspect ratio {}", c.aspect_ratio);
        assert_eq!(c.angular_spread, 1.0);
        for score in [c.aspect_ratio, c.angular_spread, c.outline_contrast] {
            assert!((0.0..=1.0).contains(&score));
        }
    }

    #[test]
    fn test_large_segment_rejected_by_diameter() {
        let evaluator = CandidateEvaluator::new(FrameParameters::new(320, 240).unwrap());
        let segment = circle_segment(160.0, 120.0, 100.0, 6);
        assert_eq!(
            evaluator.validate(&segment),
            Err(Rejection::DiameterTooLarge)
        );
    }

    #[test]
    fn test_collinear_segment_rejected_without_nan() {
        let evaluator = CandidateEvaluator::new(params_320x240());
        let segment = Segment::new(vec![(10, 10), (15, 10), (20, 10), (25, 10), (30, 10)]);
        assert_eq!(
            evaluator.validate(&segment),
            Err(Rejection::DegenerateBoundingRect)
        );

        let diagonal = Segment::new(vec![(10, 10), (14, 13), (18, 16), (22, 19), (26, 22)]);
        assert_eq!(
            evaluator.validate(&diagonal),
            Err(Rejection::DegenerateBoundingRect)
        );
    }

    #[test]
    fn test_short_and_tiny_segments() {
        let evaluator = CandidateEvaluator::new(params_320x240());
        let short = Segment::new(vec![(0, 0), (30, 0), (30, 30), (0, 30)]);
        assert_eq!(evaluator.validate(&short), Err(Rejection::TooFewPoints));

        let tiny = circle_segment(50.0, 50.0, 3.0, 8);
        assert_eq!(evaluator.validate(&tiny), Err(Rejection::DiameterTooSmall));
    }

    #[test]
    fn test_elongated_segment_rejected_by_rect_ratio() {
        let evaluator = CandidateEvaluator::new(params_320x240());
        // 40 x 4 box outline, ratio 10.
        let segment = Segment::new(vec![(10, 10), (30, 10), (50, 10), (50, 14), (30, 14), (10, 14)]);
        assert_eq!(
            evaluator.validate(&segment),
            Err(Rejection::BoundingRectRatio)
        );
    }

    #[test]
    fn test_skewed_ellipse_rejected_by_ratio() {
        let evaluator = CandidateEvaluator::new(params_320x240());
        // Arc of a 20 x 2 ellipse: passes the bounding box check, fails the fit ratio.
        let segment = Segment::new(vec![
            (153, 118),
            (162, 118),
            (168, 119),
            (170, 120),
            (168, 121),
            (162, 122),
            (153, 122),
        ]);
        assert_eq!(evaluator.validate(&segment), Err(Rejection::EllipseRatio));
    }

    #[test]
    fn test_underdetermined_fit_rejected() {
        let evaluator = CandidateEvaluator::new(params_320x240());
        let gray = GrayImage::new(320, 240);
        // Closed square chain: five points, only four distinct.
        let segment = Segment::new(vec![(40, 40), (60, 40), (60, 60), (40, 60), (40, 40)]);
        assert_eq!(
            evaluator.evaluate_segment(&segment, &gray),
            SegmentOutcome::Rejected(Rejection::EllipseFitFailed)
        );
    }

    #[test]
    fn test_empty_segment_has_too_few_points() {
        let evaluator = CandidateEvaluator::new(params_320x240());
        assert_eq!(evaluator.validate(&Segment::new(Vec::new())), Err(Rejection::TooFewPoints));
    }

    #[test]
    fn test_center_outside_frame() {
        let evaluator = CandidateEvaluator::new(params_320x240());
        // Arc of a circle centred left of the frame.
        let points: Vec<(i32, i32)> = (-60..=60)
            .step_by(10)
            .map(|deg: i32| {
                let t = (deg as f64).to_radians();
                ((-15.0 + 30.0 * t.cos()).round() as i32, (100.0 + 30.0 * t.sin()).round() as i32)
            })
            .collect();
        assert_eq!(
            evaluator.validate(&Segment::new(points)),
            Err(Rejection::CenterOutsideFrame)
        );
    }

    #[test]
    fn test_off_center_arc_fails_rhombus() {
        let evaluator = CandidateEvaluator::new(params_320x240());
        // A 24 x 12 ellipse whose points pile up near 45 degrees, dragging
        // the centroid out of the inscribed rhombus.
        let on_ellipse = |deg: f64| {
            let t = deg.to_radians();
            ((100.0 + 24.0 * t.cos()).round() as i32, (100.0 + 12.0 * t.sin()).round() as i32)
        };
        let mut points: Vec<(i32, i32)> = (0..12).map(|i| on_ellipse(30.0 * i as f64)).collect();
        points.extend(std::iter::repeat(on_ellipse(45.0)).take(100));

        assert_eq!(
            evaluator.validate(&Segment::new(points)),
            Err(Rejection::CentroidOutsideRhombus)
        );
    }

    #[test]
    fn test_frame_preconditions() {
        let evaluator = CandidateEvaluator::new(params_320x240());
        let gray = GrayImage::new(320, 240);
        assert!(matches!(
            evaluator.evaluate_frame(&[], &gray),
            Err(EngineError::EmptySegments)
        ));

        let wrong = GrayImage::new(160, 120);
        assert!(matches!(
            evaluator.evaluate_frame(&[circle_segment(50.0, 50.0, 10.0, 6)], &wrong),
            Err(EngineError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_report_keeps_discovery_order_and_counts() {
        let evaluator = CandidateEvaluator::new(params_320x240());
        let gray = GrayImage::from_pixel(320, 240, Luma([90]));
        let segments = vec![
            circle_segment(200.0, 100.0, 12.0, 10),
            Segment::new(vec![(1, 1), (2, 2)]),
            circle_segment(60.0, 60.0, 9.0, 8),
            circle_segment(160.0, 120.0, 100.0, 12),
        ];

        let report = evaluator.evaluate_frame(&segments, &gray).unwrap();
        assert_eq!(report.candidates.len(), 2);
        assert!(report.candidates[0].ellipse.center.x > report.candidates[1].ellipse.center.x);
        assert_eq!(report.rejections.get(&Rejection::TooFewPoints), Some(&1));
        assert_eq!(report.rejections.get(&Rejection::DiameterTooLarge), Some(&1));
        assert_eq!(report.rejected(), 2);
    }
}
