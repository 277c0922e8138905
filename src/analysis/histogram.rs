use crate::{analysis::ensure_scorable, error::Result, image_utils::GrayscaleBuffer};

pub const HISTOGRAM_BINS: usize = 16;

/// Shannon entropy of the 16-bin intensity histogram, normalized to [0, 1].
#[derive(Debug, Default, Clone, Copy)]
pub struct ColorHistogramAnalyzer;

impl ColorHistogramAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn score(&self, gray: &GrayscaleBuffer) -> Result<f64> {
        ensure_scorable(gray)?;

        let histogram = intensity_histogram(gray);
        let total = gray.len() as f64;

        let entropy = histogram
            .iter()
            .filter(|&&count| count > 0)
            .map(|&count| count as f64 / total)
            .fold(0.0, |acc, p| acc - p * p.log2());

        Ok(entropy / (HISTOGRAM_BINS as f64).log2())
    }
}

/// Equal-width bins over [0, 256).
pub fn intensity_histogram(gray: &GrayscaleBuffer) -> [u64; HISTOGRAM_BINS] {
    let mut histogram = [0u64; HISTOGRAM_BINS];

    for &value in gray.view().iter() {
        let bin = ((value as f64 / 256.0) * HISTOGRAM_BINS as f64).floor() as usize;
        histogram[bin.min(HISTOGRAM_BINS - 1)] += 1;
    }

    histogram
}
