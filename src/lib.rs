use std::{fs, path::{Path, PathBuf}, sync::Arc};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    analysis::HeuristicScorer,
    classifier::{Classifier, ClassifierOutput, ModelHandle, classify, onnx::OnnxClassifier},
    error::{DetectorError, Result},
    fusion::{Verdict, fuse},
    image_utils::{ImageSource, MIN_DIMENSION},
    metadata::exif::ExifExtractor,
    progress::{AnalysisStep, ProgressEvent, ProgressReporter},
};

pub mod analysis;
pub mod classifier;
pub mod error;
pub mod evaluation;
pub mod fusion;
pub mod image_utils;
pub mod metadata;
pub mod progress;
pub mod worker;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub model_path: PathBuf,
    pub grid_size: u32,
    pub parallel: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/mnist-8.onnx"),
            grid_size: 28,
            parallel: true,
        }
    }
}

impl AnalysisConfig {
    /// Missing keys fall back to the defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.grid_size == 0 {
            return Err(DetectorError::Config("grid_size must be positive".into()));
        }
        Ok(())
    }
}

pub struct AiImageDetector {
    config: AnalysisConfig,
    model: ModelHandle,
}

impl AiImageDetector {
    /// The ONNX model is not touched until the first analysis.
    pub fn new(config: AnalysisConfig) -> Self {
        let model_path = config.model_path.clone();
        let grid_size = config.grid_size;
        let model = ModelHandle::new(move || {
            let classifier = OnnxClassifier::load(&model_path, grid_size)?;
            Ok(Arc::new(classifier) as Arc<dyn Classifier>)
        });

        Self { config, model }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.model = ModelHandle::from_classifier(classifier);
        self
    }

    pub fn with_model_handle(mut self, model: ModelHandle) -> Self {
        self.model = model;
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn analyze(&self, source: ImageSource) -> Result<DetectionResult> {
        self.analyze_with_progress(source, &|_| {})
    }

    pub fn analyze_with_progress(
        &self,
        source: ImageSource,
        progress: &dyn Fn(ProgressEvent),
    ) -> Result<DetectionResult> {
        let mut reporter = ProgressReporter::new(progress);
        reporter.report(AnalysisStep::LoadingModel);

        let image = source.decode()?;
        image.ensure_min_size(MIN_DIMENSION)?;
        let (width, height) = image.dimensions();
        debug!("decoded {}x{} image", width, height);

        let classifier = self.model.get()?;
        reporter.report(AnalysisStep::ModelLoaded);

        let grid = image.classifier_grid(self.config.grid_size);
        let gray = image.grayscale();
        let scorer = HeuristicScorer::new().with_parallel(self.config.parallel);

        reporter.report(AnalysisStep::ComputingHeuristics);
        let (classified, heuristics) = if self.config.parallel {
            rayon::join(
                || classify(classifier.as_ref(), &grid),
                || scorer.score(&gray),
            )
        } else {
            (classify(classifier.as_ref(), &grid), scorer.score(&gray))
        };
        let classified: ClassifierOutput = classified?;
        let heuristics = heuristics?;

        reporter.report(AnalysisStep::ParsingMetadata);
        let camera_info_present = image
            .encoded_bytes()
            .map(ExifExtractor::extract_from_bytes)
            .is_some_and(|metadata| metadata.camera_info_present());

        let result = fuse(&classified, camera_info_present, heuristics);
        reporter.report(AnalysisStep::Complete);

        info!(
            "analysis complete: p={:.4} verdict={} camera={}",
            result.probability, result.final_verdict, result.camera_info_present
        );

        Ok(result)
    }

    /// Pixel statistics only; no model is loaded.
    pub fn heuristics(&self, source: ImageSource) -> Result<HeuristicScores> {
        let image = source.decode()?;
        image.ensure_min_size(MIN_DIMENSION)?;

        HeuristicScorer::new()
            .with_parallel(self.config.parallel)
            .score(&image.grayscale())
    }

    pub fn inspect_metadata(bytes: &[u8]) -> CameraMetadata {
        ExifExtractor::extract_from_bytes(bytes)
    }
}

impl Default for AiImageDetector {
    fn default() -> Self {
        Self::new(AnalysisConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeuristicScores {
    /// Sobel edge energy.
    pub frequency_spectrum: f64,
    pub noise_residual: f64,
    /// Intensity histogram entropy.
    pub color_histogram: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CameraMetadata {
    pub make: Option<String>,
    pub model: Option<String>,
    pub software: Option<String>,
}

impl CameraMetadata {
    pub fn camera_info_present(&self) -> bool {
        [&self.make, &self.model]
            .into_iter()
            .flatten()
            .any(|value| !value.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResult {
    pub probability: f64,
    pub camera_info_present: bool,
    #[serde(flatten)]
    pub heuristics: HeuristicScores,
    pub final_verdict: Verdict,
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{Rgba, RgbaImage};

    use super::*;
    use crate::{
        classifier::tests::FixedScores,
        metadata::exif::tests::{MAKE, MODEL, tiff_with_ascii_tags},
    };

    fn detector(scores: Vec<f32>) -> AiImageDetector {
        AiImageDetector::default().with_classifier(Arc::new(FixedScores(scores)))
    }

    fn jpeg_with_exif(image: &RgbaImage, tags: &[(u16, &str)]) -> Vec<u8> {
        let rgb = image::DynamicImage::ImageRgba8(image.clone()).to_rgb8();
        let mut jpeg = Cursor::new(Vec::new());
        rgb.write_to(&mut jpeg, image::ImageFormat::Jpeg).unwrap();
        let jpeg = jpeg.into_inner();

        let mut app1 = b"Exif\0\0".to_vec();
        app1.extend_from_slice(&tiff_with_ascii_tags(tags));
        let segment_len = (app1.len() + 2) as u16;

        let mut out = jpeg[..2].to_vec();
        out.extend_from_slice(&[0xff, 0xe1]);
        out.extend_from_slice(&segment_len.to_be_bytes());
        out.extend_from_slice(&app1);
        out.extend_from_slice(&jpeg[2..]);
        out
    }

    #[test]
    fn all_zero_image_with_fixed_logits() {
        let image = RgbaImage::new(28, 28);
        let result = detector(vec![2.0, 1.0]).analyze(image.into()).unwrap();

        let expected = 1.0 / (1.0 + (-1.0f64).exp());
        assert!((result.probability - expected).abs() < 1e-9);
        assert!(!result.camera_info_present);
        assert_eq!(result.heuristics.frequency_spectrum, 0.0);
        assert_eq!(result.heuristics.noise_residual, 0.0);
        assert_eq!(result.heuristics.color_histogram, 0.0);
        assert_eq!(result.final_verdict, Verdict::AiGenerated);
    }

    #[test]
    fn even_logits_are_not_ai_generated() {
        let image = RgbaImage::from_pixel(16, 16, Rgba([120, 80, 40, 255]));
        let result = detector(vec![0.0, 0.0]).analyze(image.into()).unwrap();

        assert_eq!(result.probability, 0.5);
        assert_eq!(result.final_verdict, Verdict::NotAiGenerated);
    }

    #[test]
    fn flat_color_only_leaves_border_residual() {
        let image = RgbaImage::from_pixel(40, 30, Rgba([200, 10, 90, 255]));
        let result = detector(vec![0.1, 0.9]).analyze(image.into()).unwrap();

        assert_eq!(result.heuristics.frequency_spectrum, 0.0);
        assert!(result.heuristics.noise_residual > 0.0);
        assert_eq!(result.heuristics.color_histogram, 0.0);
    }

    #[test]
    fn camera_exif_is_detected_from_encoded_bytes() {
        let image = RgbaImage::from_fn(32, 32, |x, y| Rgba([(x * 8) as u8, (y * 8) as u8, 0, 255]));
        let bytes = jpeg_with_exif(&image, &[(MAKE, "Nikon"), (MODEL, "D850")]);

        let result = detector(vec![0.0, 3.0])
            .analyze(ImageSource::EncodedBytes(bytes))
            .unwrap();

        assert!(result.camera_info_present);
        assert_eq!(result.final_verdict, Verdict::NotAiGenerated);
    }

    #[test]
    fn progress_is_ordered_and_complete() {
        let seen = std::sync::Mutex::new(Vec::new());
        let sink = |event: ProgressEvent| seen.lock().unwrap().push(event);

        detector(vec![1.0, 0.0])
            .analyze_with_progress(RgbaImage::new(8, 8).into(), &sink)
            .unwrap();

        let seen = seen.into_inner().unwrap();
        let percents = seen.iter().map(|e| e.progress).collect::<Vec<_>>();
        assert_eq!(percents, vec![10, 30, 60, 80, 100]);
        assert_eq!(seen[0].step, "Loading model");
        assert_eq!(seen[4].step, "Analysis complete");
    }

    #[test]
    fn decode_failure_is_fatal() {
        let result = detector(vec![1.0]).analyze(ImageSource::EncodedBytes(vec![0, 1, 2, 3]));
        assert!(matches!(result, Err(DetectorError::ImageLoad(_))));
    }

    #[test]
    fn non_finite_logits_fail_instead_of_defaulting() {
        for scores in [
            vec![f32::INFINITY, 0.0],
            vec![f32::NAN, 1.0],
            vec![f32::INFINITY, f32::INFINITY],
        ] {
            let result = detector(scores).analyze(RgbaImage::new(28, 28).into());
            assert!(matches!(result, Err(DetectorError::Inference(_))));
        }
    }

    #[test]
    fn tiny_images_are_rejected_before_scoring() {
        let result = detector(vec![1.0]).analyze(RgbaImage::new(2, 2).into());
        assert!(matches!(result, Err(DetectorError::ImageTooSmall(3))));
    }

    #[test]
    fn missing_model_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let detector = AiImageDetector::new(AnalysisConfig {
            model_path: dir.path().join("missing.onnx"),
            ..AnalysisConfig::default()
        });

        let result = detector.analyze(RgbaImage::new(28, 28).into());
        assert!(matches!(result, Err(DetectorError::ModelLoad(_))));
    }

    #[test]
    fn heuristics_need_no_model() {
        let detector = AiImageDetector::default();
        let scores = detector
            .heuristics(RgbaImage::from_pixel(10, 10, Rgba([5, 5, 5, 255])).into())
            .unwrap();

        assert_eq!(scores.frequency_spectrum, 0.0);
    }

    #[test]
    fn result_serializes_with_wire_names() {
        let result = detector(vec![2.0, 1.0])
            .analyze(RgbaImage::new(28, 28).into())
            .unwrap();
        let json = serde_json::to_value(&result).unwrap();

        for key in [
            "probability",
            "cameraInfoPresent",
            "frequencySpectrum",
            "noiseResidual",
            "colorHistogram",
            "finalVerdict",
        ] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert_eq!(json["finalVerdict"], "AI-generated");
    }

    #[test]
    fn config_from_json_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "model_path": "weights/detector.onnx", "parallel": false }"#).unwrap();

        let config = AnalysisConfig::from_json_file(&path).unwrap();
        assert_eq!(config.model_path, PathBuf::from("weights/detector.onnx"));
        assert!(!config.parallel);
        assert_eq!(config.grid_size, 28);
    }

    #[test]
    fn verdict_threshold_is_not_configurable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "verdict_threshold": 0.9 }"#).unwrap();

        let config = AnalysisConfig::from_json_file(&path).unwrap();
        assert_eq!(config, AnalysisConfig::default());

        // p = sigmoid(1) ~ 0.73 stays above the fixed 0.5 cut.
        let detector = AiImageDetector::new(config)
            .with_classifier(Arc::new(FixedScores(vec![2.0, 1.0])));
        let result = detector.analyze(RgbaImage::new(28, 28).into()).unwrap();
        assert_eq!(result.final_verdict, Verdict::AiGenerated);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        fs::write(&path, r#"{ "grid_size": 0 }"#).unwrap();
        assert!(matches!(
            AnalysisConfig::from_json_file(&path),
            Err(DetectorError::Config(_))
        ));

        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            AnalysisConfig::from_json_file(&path),
            Err(DetectorError::Config(_))
        ));
    }

    #[test]
    fn model_is_loaded_lazily_and_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let loads = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&loads);
        let handle = ModelHandle::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(FixedScores(vec![1.0, 2.0])) as Arc<dyn Classifier>)
        });
        let detector = AiImageDetector::default().with_model_handle(handle);
        assert_eq!(loads.load(Ordering::SeqCst), 0);

        for _ in 0..3 {
            detector.analyze(RgbaImage::new(5, 5).into()).unwrap();
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn metadata_inspection_never_fails() {
        assert!(!AiImageDetector::inspect_metadata(b"\x89PNG not really").camera_info_present());

        let bytes = tiff_with_ascii_tags(&[(MAKE, "Sony")]);
        assert!(AiImageDetector::inspect_metadata(&bytes).camera_info_present());
    }

    #[test]
    fn camera_metadata_presence() {
        let mut metadata = CameraMetadata::default();
        assert!(!metadata.camera_info_present());

        metadata.software = Some("GIMP".into());
        assert!(!metadata.camera_info_present());

        metadata.make = Some(String::new());
        assert!(!metadata.camera_info_present());

        metadata.model = Some("X-T4".into());
        assert!(metadata.camera_info_present());
    }
}
