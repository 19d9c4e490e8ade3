use std::time::Instant;

use image::{DynamicImage, GrayImage};
use serde::Serialize;
use tracing::debug;

use crate::contours::{ContourExtractor, EdgeTracer};
use crate::engine::EngineError;
use crate::image_impl::resize;
use crate::postprocess::{CandidateEvaluator, FrameReport};
use crate::preprocess::{
    refine_checked, CannyEdgeMap, EdgeMapBuilder, EdgeTopologyRefiner, IntensityNormalizer, MinMaxNormalizer,
    PassthroughRefiner,
};
use crate::types::DetectorConfig;

/// Wall-clock seconds spent in each stage of one frame.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StageTimings {
    pub normalize: f64,
    pub edges: f64,
    pub refine: f64,
    pub contours: f64,
    pub evaluate: f64,
    pub total: f64,
}

pub struct PupilDetOutput {
    /// Normalized grayscale frame at the working resolution.
    pub gray: GrayImage,
    pub report: FrameReport,
    pub elapse: StageTimings,
}

pub struct PupilDetector {
    pub cfg: DetectorConfig,
    pub evaluator: CandidateEvaluator,
    normalizer: Box<dyn IntensityNormalizer>,
    edge_map: Box<dyn EdgeMapBuilder>,
    refiner: Box<dyn EdgeTopologyRefiner>,
    extractor: Box<dyn ContourExtractor>,
}

impl PupilDetector {
    pub fn new(cfg: DetectorConfig) -> Result<Self, EngineError> {
        let edge_map = CannyEdgeMap {
            low_threshold: cfg.canny_low,
            high_threshold: cfg.canny_high,
        };
        let tracer = EdgeTracer {
            approximate: cfg.approximate_chains,
        };
        Self::with_stages(
            cfg,
            Box::new(MinMaxNormalizer),
            Box::new(edge_map),
            Box::new(PassthroughRefiner),
            Box::new(tracer),
        )
    }

    /// Detector with caller-supplied preprocessing and contour stages.
    pub fn with_stages(
        cfg: DetectorConfig,
        normalizer: Box<dyn IntensityNormalizer>,
        edge_map: Box<dyn EdgeMapBuilder>,
        refiner: Box<dyn EdgeTopologyRefiner>,
        extractor: Box<dyn ContourExtractor>,
    ) -> Result<Self, EngineError> {
        let evaluator = CandidateEvaluator::new(cfg.frame_parameters()?);
        Ok(Self {
            cfg,
            evaluator,
            normalizer,
            edge_map,
            refiner,
            extractor,
        })
    }

    pub fn run(&self, frame: &DynamicImage) -> Result<PupilDetOutput, EngineError> {
        let start = Instant::now();
        let mut elapse = StageTimings::default();

        let resized = resize(frame, self.cfg.width, self.cfg.height);

        let t = Instant::now();
        let gray = self.normalizer.normalize(&resized);
        elapse.normalize = t.elapsed().as_secs_f64();

        let t = Instant::now();
        let edges = self.edge_map.build(&gray);
        elapse.edges = t.elapsed().as_secs_f64();

        let t = Instant::now();
        let refined = refine_checked(self.refiner.as_ref(), &edges)?;
        elapse.refine = t.elapsed().as_secs_f64();

        let t = Instant::now();
        let segments = self.extractor.extract(&refined);
        elapse.contours = t.elapsed().as_secs_f64();

        let t = Instant::now();
        let report = self.evaluator.evaluate_frame(&segments, &gray)?;
        elapse.evaluate = t.elapsed().as_secs_f64();

        elapse.total = start.elapsed().as_secs_f64();
        debug!("frame done in {:.3} ms", elapse.total * 1000.0);

        Ok(PupilDetOutput { gray, report, elapse })
    }
}
