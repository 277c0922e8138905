use ndarray::ArrayView2;

use crate::{analysis::ensure_scorable, error::Result, image_utils::GrayscaleBuffer};

pub const SOBEL_X: [[f64; 3]; 3] = [[-1.0, 0.0, 1.0], [-2.0, 0.0, 2.0], [-1.0, 0.0, 1.0]];
pub const SOBEL_Y: [[f64; 3]; 3] = [[-1.0, -2.0, -1.0], [0.0, 0.0, 0.0], [1.0, 2.0, 1.0]];

/// Mean Sobel gradient magnitude over interior pixels, scaled by 1/255.
///
/// The one-pixel border is excluded from both the sum and the pixel count.
/// Extreme synthetic patterns (e.g. two-pixel stripes) can push the raw mean
/// above 255, so the score is capped at 1.
#[derive(Debug, Default, Clone, Copy)]
pub struct EdgeEnergyAnalyzer;

impl EdgeEnergyAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn score(&self, gray: &GrayscaleBuffer) -> Result<f64> {
        ensure_scorable(gray)?;

        let view = gray.view();
        let interior = ((gray.width() - 2) * (gray.height() - 2)) as f64;

        let sum = view
            .windows((3, 3))
            .into_iter()
            .map(|window| sobel_magnitude(&window))
            .fold(0.0, |acc, mag| acc + mag);

        Ok((sum / interior / 255.0).min(1.0))
    }
}

pub fn sobel_magnitude(window: &ArrayView2<'_, f32>) -> f64 {
    let mut gx = 0.0;
    let mut gy = 0.0;

    for ky in 0..3 {
        for kx in 0..3 {
            let val = window[[ky, kx]] as f64;
            gx += SOBEL_X[ky][kx] * val;
            gy += SOBEL_Y[ky][kx] * val;
        }
    }

    (gx * gx + gy * gy).sqrt()
}
