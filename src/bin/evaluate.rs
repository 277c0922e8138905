//! Finds the noise-residual threshold that best separates a labelled set of
//! real and AI-generated images.
//!
//! Usage: evaluate [dataset_dir]   (default: data/validation, with real/ and ai/ inside)

use std::{env, process};

use ai_image_detector::evaluation::{best_noise_threshold, load_dataset, score_samples};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let dataset_dir = env::args()
        .nth(1)
        .unwrap_or_else(|| "data/validation".to_string());

    let samples = match load_dataset(&dataset_dir) {
        Ok(samples) => samples,
        Err(err) => {
            eprintln!("error: cannot read dataset {dataset_dir}: {err}");
            process::exit(1);
        }
    };

    if samples.is_empty() {
        eprintln!("No validation images found in {dataset_dir}.");
        return;
    }

    let scored = match score_samples(&samples) {
        Ok(scored) => scored,
        Err(err) => {
            eprintln!("error: {err}");
            process::exit(1);
        }
    };

    if let Some(report) = best_noise_threshold(&scored) {
        println!("Best threshold: {:.2}", report.threshold);
        println!("Accuracy: {:.2}%", report.accuracy * 100.0);
    }
}
