use std::{fs, path::Path};

use base64::{Engine, engine::general_purpose::STANDARD};
use image::{DynamicImage, Rgba, RgbaImage, imageops::FilterType};
use ndarray::{Array2, ArrayView2};

use crate::error::{DetectorError, Result};

/// Smallest width/height the heuristic scorers accept.
pub const MIN_DIMENSION: u32 = 3;

/// Anything the pipeline knows how to turn into pixels.
#[derive(Debug, Clone)]
pub enum ImageSource {
    EncodedBytes(Vec<u8>),
    DecodedRaster(RgbaImage),
}

impl ImageSource {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(ImageSource::EncodedBytes(fs::read(path)?))
    }

    /// Accepts `data:<mime>;base64,<payload>` URIs.
    pub fn from_data_uri(uri: &str) -> Result<Self> {
        let rest = uri
            .strip_prefix("data:")
            .ok_or_else(|| DetectorError::InvalidDataUri("missing `data:` scheme".into()))?;

        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| DetectorError::InvalidDataUri("missing `,` separator".into()))?;

        if !header.ends_with(";base64") {
            return Err(DetectorError::InvalidDataUri(
                "only base64 payloads are supported".into(),
            ));
        }

        let bytes = STANDARD
            .decode(payload.trim())
            .map_err(|e| DetectorError::InvalidDataUri(e.to_string()))?;

        Ok(ImageSource::EncodedBytes(bytes))
    }

    pub fn decode(self) -> Result<DecodedImage> {
        match self {
            ImageSource::EncodedBytes(bytes) => {
                let rgba = image::load_from_memory(&bytes)?.to_rgba8();
                Ok(DecodedImage {
                    rgba,
                    encoded: Some(bytes),
                })
            }
            ImageSource::DecodedRaster(rgba) => Ok(DecodedImage {
                rgba,
                encoded: None,
            }),
        }
    }
}

impl From<Vec<u8>> for ImageSource {
    fn from(bytes: Vec<u8>) -> Self {
        ImageSource::EncodedBytes(bytes)
    }
}

impl From<RgbaImage> for ImageSource {
    fn from(image: RgbaImage) -> Self {
        ImageSource::DecodedRaster(image)
    }
}

impl From<DynamicImage> for ImageSource {
    fn from(image: DynamicImage) -> Self {
        ImageSource::DecodedRaster(image.to_rgba8())
    }
}

/// A decoded RGBA raster, plus the bytes it came from when there were any.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    rgba: RgbaImage,
    encoded: Option<Vec<u8>>,
}

impl DecodedImage {
    pub fn dimensions(&self) -> (u32, u32) {
        self.rgba.dimensions()
    }

    pub fn rgba(&self) -> &RgbaImage {
        &self.rgba
    }

    pub fn encoded_bytes(&self) -> Option<&[u8]> {
        self.encoded.as_deref()
    }

    pub fn ensure_min_size(&self, min: u32) -> Result<()> {
        let (width, height) = self.dimensions();
        if width < min || height < min {
            return Err(DetectorError::ImageTooSmall(min));
        }
        Ok(())
    }

    pub fn grayscale(&self) -> GrayscaleBuffer {
        GrayscaleBuffer::from_rgba(&self.rgba)
    }

    pub fn classifier_grid(&self, size: u32) -> Vec<f32> {
        classifier_grid(&self.rgba, size)
    }
}

/// Single-channel luminance, `(r + g + b) / 3` per pixel, indexed `[[y, x]]`.
#[derive(Debug, Clone, PartialEq)]
pub struct GrayscaleBuffer {
    data: Array2<f32>,
}

impl GrayscaleBuffer {
    pub fn from_rgba(image: &RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        let mut data = Array2::zeros((height as usize, width as usize));

        for (x, y, pixel) in image.enumerate_pixels() {
            data[[y as usize, x as usize]] = rgb_mean(pixel);
        }

        Self { data }
    }

    pub fn from_array(data: Array2<f32>) -> Self {
        Self { data }
    }

    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn view(&self) -> ArrayView2<'_, f32> {
        self.data.view()
    }
}

pub fn rgb_mean(pixel: &Rgba<u8>) -> f32 {
    (pixel[0] as f32 + pixel[1] as f32 + pixel[2] as f32) / 3.0
}

/// Square grid of normalized luminance in [0, 1], row-major.
pub fn classifier_grid(image: &RgbaImage, size: u32) -> Vec<f32> {
    let resized = image::imageops::resize(image, size, size, FilterType::Nearest);

    resized
        .pixels()
        .map(|pixel| rgb_mean(pixel) / 255.0)
        .collect()
}
