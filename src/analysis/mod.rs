pub mod edge_energy;
pub mod histogram;
pub mod noise;

use log::debug;

use crate::{
    HeuristicScores,
    analysis::{
        edge_energy::EdgeEnergyAnalyzer, histogram::ColorHistogramAnalyzer,
        noise::NoiseResidualAnalyzer,
    },
    error::{DetectorError, Result},
    image_utils::{GrayscaleBuffer, MIN_DIMENSION},
};

pub(crate) fn ensure_scorable(gray: &GrayscaleBuffer) -> Result<()> {
    let min = MIN_DIMENSION as usize;
    if gray.width() < min || gray.height() < min {
        return Err(DetectorError::ImageTooSmall(MIN_DIMENSION));
    }
    Ok(())
}

/// Runs the three pixel-statistics analyzers over one grayscale buffer.
#[derive(Debug, Clone, Copy)]
pub struct HeuristicScorer {
    edge: EdgeEnergyAnalyzer,
    noise: NoiseResidualAnalyzer,
    histogram: ColorHistogramAnalyzer,
    parallel: bool,
}

impl HeuristicScorer {
    pub fn new() -> Self {
        Self {
            edge: EdgeEnergyAnalyzer::new(),
            noise: NoiseResidualAnalyzer::new(),
            histogram: ColorHistogramAnalyzer::new(),
            parallel: true,
        }
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn score(&self, gray: &GrayscaleBuffer) -> Result<HeuristicScores> {
        ensure_scorable(gray)?;

        let (edge, (noise, histogram)) = if self.parallel {
            rayon::join(
                || self.edge.score(gray),
                || rayon::join(|| self.noise.score(gray), || self.histogram.score(gray)),
            )
        } else {
            (
                self.edge.score(gray),
                (self.noise.score(gray), self.histogram.score(gray)),
            )
        };

        let scores = HeuristicScores {
            frequency_spectrum: edge?,
            noise_residual: noise?,
            color_histogram: histogram?,
        };

        debug!(
            "heuristics for {}x{}: edge={:.4} noise={:.4} entropy={:.4}",
            gray.width(),
            gray.height(),
            scores.frequency_spectrum,
            scores.noise_residual,
            scores.color_histogram
        );

        Ok(scores)
    }
}

impl Default for HeuristicScorer {
    fn default() -> Self {
        Self::new()
    }
}
