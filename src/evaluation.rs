use std::{
    fs,
    path::{Path, PathBuf},
};

use log::{debug, warn};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use serde::Serialize;

use crate::{
    HeuristicScores,
    analysis::HeuristicScorer,
    error::Result,
    image_utils::{ImageSource, MIN_DIMENSION},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Real,
    Ai,
}

impl Label {
    pub fn dir_name(&self) -> &'static str {
        match self {
            Label::Real => "real",
            Label::Ai => "ai",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub label: Label,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredSample {
    pub label: Label,
    pub scores: HeuristicScores,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThresholdReport {
    pub threshold: f64,
    pub accuracy: f64,
    pub samples: usize,
}

/// Collects `<root>/real/*` and `<root>/ai/*`, skipping hidden files.
pub fn load_dataset<P: AsRef<Path>>(root: P) -> Result<Vec<Sample>> {
    let root = root.as_ref();
    let mut samples = Vec::new();

    for label in [Label::Real, Label::Ai] {
        let mut paths = fs::read_dir(root.join(label.dir_name()))?
            .filter_map(|entry| entry.ok())
            .filter(|entry| !entry.file_name().to_string_lossy().starts_with('.'))
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect::<Vec<_>>();
        paths.sort();

        debug!("{} {} samples", paths.len(), label.dir_name());
        samples.extend(paths.into_iter().map(|path| Sample { label, path }));
    }

    Ok(samples)
}

pub fn score_samples(samples: &[Sample]) -> Result<Vec<ScoredSample>> {
    let scorer = HeuristicScorer::new().with_parallel(false);

    samples
        .par_iter()
        .map(|sample| -> Result<ScoredSample> {
            let image = ImageSource::from_path(&sample.path)?.decode()?;
            image.ensure_min_size(MIN_DIMENSION)?;
            Ok(ScoredSample {
                label: sample.label,
                scores: scorer.score(&image.grayscale())?,
            })
        })
        .collect()
}

/// Sweeps 0.00..=1.00 in steps of 0.01, predicting `real` when the noise
/// residual is above the threshold. Ties keep the lowest threshold.
pub fn best_noise_threshold(scored: &[ScoredSample]) -> Option<ThresholdReport> {
    if scored.is_empty() {
        warn!("no samples to evaluate");
        return None;
    }

    let mut best = ThresholdReport {
        threshold: 0.0,
        accuracy: 0.0,
        samples: scored.len(),
    };

    for step in 0..=100 {
        let threshold = step as f64 / 100.0;
        let correct = scored
            .iter()
            .filter(|sample| {
                let predicted = if sample.scores.noise_residual > threshold {
                    Label::Real
                } else {
                    Label::Ai
                };
                predicted == sample.label
            })
            .count();

        let accuracy = correct as f64 / scored.len() as f64;
        if accuracy > best.accuracy {
            best.threshold = threshold;
            best.accuracy = accuracy;
        }
    }

    Some(best)
}
