use approx::assert_relative_eq;
use image::{DynamicImage, GrayImage, Luma};
use pupil::{
    CandidateEvaluator, DetectorConfig, EngineError, FrameParameters, PupilDetector, Rejection, Segment,
    SegmentOutcome,
};

fn circle_points(cx: f64, cy: f64, r: f64, n: usize) -> Vec<(i32, i32)> {
    (0..n)
        .map(|i| {
            let t = 2.0 * std::f64::consts::PI * i as f64 / n as f64;
            ((cx + r * t.cos()).round() as i32, (cy + r * t.sin()).round() as i32)
        })
        .collect()
}

fn eye_frame(width: u32, height: u32, cx: f64, cy: f64, r: f64) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| {
        if (x as f64 - cx).hypot(y as f64 - cy) <= r {
            Luma([20])
        } else {
            Luma([190])
        }
    })
}

fn evaluator() -> CandidateEvaluator {
    let params = FrameParameters::new(320, 240)
        .and_then(|p| p.with_pupil_diameter_bounds(15.0, 60.0))
        .unwrap();
    CandidateEvaluator::new(params)
}

#[test]
fn small_circle_yields_one_round_candidate() {
    let gray = GrayImage::from_pixel(320, 240, Luma([100]));
    let segments = vec![Segment::new(circle_points(50.0, 50.0, 10.0, 6))];

    let report = evaluator().evaluate_frame(&segments, &gray).unwrap();
    assert_eq!(report.candidates.len(), 1);
    let candidate = &report.candidates[0];
    assert!(candidate.aspect_ratio > 0.9);
    assert_relative_eq!(candidate.ellipse.center.x, 50.0, epsilon = 1.0);
    assert_relative_eq!(candidate.ellipse.center.y, 50.0, epsilon = 1.0);
}

#[test]
fn oversized_and_collinear_segments_are_rejected() {
    let gray = GrayImage::new(320, 240);
    let evaluator = evaluator();

    let wide = Segment::new(vec![(0, 0), (50, 10), (100, 0), (150, 10), (200, 0), (100, 20)]);
    assert_eq!(
        evaluator.evaluate_segment(&wide, &gray),
        SegmentOutcome::Rejected(Rejection::DiameterTooLarge)
    );

    let line = Segment::new(vec![(10, 10), (15, 10), (20, 10), (25, 10), (30, 10)]);
    assert_eq!(
        evaluator.evaluate_segment(&line, &gray),
        SegmentOutcome::Rejected(Rejection::DegenerateBoundingRect)
    );
}

#[test]
fn scores_stay_in_unit_interval() {
    let gray = eye_frame(320, 240, 120.0, 100.0, 18.0);
    let evaluator = evaluator();
    for (r, n) in [(9.0, 8), (14.0, 12), (18.0, 20), (25.0, 30)] {
        let segment = Segment::new(circle_points(120.0, 100.0, r, n));
        if let SegmentOutcome::Accepted(c) = evaluator.evaluate_segment(&segment, &gray) {
            for score in [c.aspect_ratio, c.angular_spread, c.outline_contrast] {
                assert!((0.0..=1.0).contains(&score), "score {} out of range", score);
            }
        }
    }
}

#[test]
fn detector_finds_dark_pupil_from_file() {
    let path = std::env::temp_dir().join(format!("pupil_pipeline_{}.png", std::process::id()));
    eye_frame(320, 240, 170.0, 110.0, 24.0).save(&path).unwrap();

    let frame = pupil::imread(&path).unwrap();
    let _ = std::fs::remove_file(&path);

    let detector = PupilDetector::new(DetectorConfig::default()).unwrap();
    let output = detector.run(&frame).unwrap();
    let best = output
        .report
        .candidates
        .iter()
        .min_by(|a, b| {
            let da = (a.ellipse.center.x - 170.0).hypot(a.ellipse.center.y - 110.0);
            let db = (b.ellipse.center.x - 170.0).hypot(b.ellipse.center.y - 110.0);
            da.total_cmp(&db)
        })
        .expect("at least one candidate");

    assert_relative_eq!(best.ellipse.center.x, 170.0, epsilon = 3.0);
    assert_relative_eq!(best.ellipse.center.y, 110.0, epsilon = 3.0);
    assert!(best.outline_contrast > 0.5);
}

#[test]
fn report_serializes_rejection_counts() {
    let gray = GrayImage::new(320, 240);
    let segments = vec![
        Segment::new(vec![(1, 1), (2, 2), (3, 3)]),
        Segment::new(vec![(4, 4)]),
    ];
    let report = evaluator().evaluate_frame(&segments, &gray).unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["rejections"]["too_few_points"], 2);
    assert!(json["candidates"].as_array().unwrap().is_empty());
}

#[test]
fn frame_size_mismatch_is_an_error() {
    let gray = GrayImage::new(640, 480);
    let segments = vec![Segment::new(circle_points(50.0, 50.0, 10.0, 6))];
    let err = evaluator().evaluate_frame(&segments, &gray).unwrap_err();
    assert!(matches!(err, EngineError::DimensionMismatch { .. }));
}

#[test]
fn config_file_overrides_resolution() {
    let cfg = DetectorConfig::from_json(r#"{ "width": 160, "height": 120, "approximate_chains": false }"#).unwrap();
    let detector = PupilDetector::new(cfg).unwrap();
    let frame = DynamicImage::ImageLuma8(eye_frame(320, 240, 160.0, 120.0, 30.0));
    let output = detector.run(&frame).unwrap();
    assert_eq!(output.gray.dimensions(), (160, 120));
}
