//! # Pupil-rs - PuRe Pupil Candidate Selection in Pure Rust
//!
//! Pupil-rs implements the candidate selection stage of the PuRe pupil
//! detector (Santini, Fuhl and Kasneci, 2018): edge segments of an eye
//! frame are filtered by size and curvature, fitted with ellipses, checked
//! for geometric plausibility and scored.
//!
//! ## Features
//!
//! - **Pure Rust**: edge detection via `imageproc`, ellipse fitting via `nalgebra`
//! - **Explicit parameters**: every threshold lives in an immutable [`FrameParameters`]
//! - **Pluggable stages**: normalization, edge map, refinement and contour
//!   extraction sit behind small traits
//! - **Parallel**: optional `parallel` feature evaluates segments with rayon
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pupil::{DetectorConfig, PupilDetector};
//!
//! let detector = PupilDetector::new(DetectorConfig::default())?;
//! let frame = image::open("eye.png")?;
//! let output = detector.run(&frame)?;
//!
//! for c in &output.report.candidates {
//!     println!(
//!         "({:.1}, {:.1}) aspect {:.2} spread {:.2} contrast {:.2}",
//!         c.ellipse.center.x, c.ellipse.center.y,
//!         c.aspect_ratio, c.angular_spread, c.outline_contrast
//!     );
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Working on already traced segments:
//!
//! ```rust
//! use pupil::{CandidateEvaluator, FrameParameters, Segment};
//!
//! let params = FrameParameters::new(320, 240)?;
//! let evaluator = CandidateEvaluator::new(params);
//! let gray = image::GrayImage::new(320, 240);
//! let segment = Segment::new(vec![(0, 0), (1, 0), (2, 0), (3, 0), (4, 0)]);
//! let report = evaluator.evaluate_frame(&[segment], &gray)?;
//! assert!(report.candidates.is_empty());
//! # Ok::<(), pupil::EngineError>(())
//! ```

// Core modules
mod engine;
mod geometry;
mod image_impl;
mod types;

pub mod confidence;
pub mod contours;
pub mod det;
pub mod ellipse;
pub mod overlay;
pub mod postprocess;
pub mod preprocess;

// Public API exports
pub use crate::contours::{ContourExtractor, EdgeTracer, Segment};
pub use crate::det::{PupilDetOutput, PupilDetector, StageTimings};
pub use crate::ellipse::{fit_ellipse, FittedEllipse};
pub use crate::engine::EngineError;
pub use crate::image_impl::{imread, min_area_rect, Point2d, RotatedRect, Size2d};
pub use crate::postprocess::{Candidate, CandidateEvaluator, FrameReport, Rejection, SegmentOutcome};
pub use crate::preprocess::{EdgeMapBuilder, EdgeTopologyRefiner, IntensityNormalizer};
pub use crate::types::{DetectorConfig, FrameParameters};
