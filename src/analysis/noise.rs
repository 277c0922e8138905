use ndarray::{Array2, Zip, s};

use crate::{analysis::ensure_scorable, error::Result, image_utils::GrayscaleBuffer};

/// High-frequency residual: mean absolute difference between the image and
/// its 3x3 box blur, scaled by 1/255.
///
/// Only interior pixels are blurred. Border pixels of the blur stay at zero
/// but still take part in the residual, so the border contributes its raw
/// intensity.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoiseResidualAnalyzer;

impl NoiseResidualAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn score(&self, gray: &GrayscaleBuffer) -> Result<f64> {
        ensure_scorable(gray)?;

        let view = gray.view();
        let blurred = box_blur_3x3(gray);

        let residual = Zip::from(&view)
            .and(&blurred)
            .fold(0.0, |acc, &orig, &blur| acc + (orig as f64 - blur as f64).abs());

        Ok(residual / (gray.len() as f64 * 255.0))
    }
}

/// Unweighted 3x3 mean of interior pixels; the border is left at zero.
pub fn box_blur_3x3(gray: &GrayscaleBuffer) -> Array2<f32> {
    let view = gray.view();
    let (height, width) = view.dim();
    let mut blurred = Array2::zeros((height, width));

    if height < 3 || width < 3 {
        return blurred;
    }

    Zip::from(blurred.slice_mut(s![1..height - 1, 1..width - 1]))
        .and(view.windows((3, 3)))
        .for_each(|out, window| {
            let sum = window.iter().fold(0.0, |acc, &v| acc + v as f64);
            *out = (sum / 9.0) as f32;
        });

    blurred
}
