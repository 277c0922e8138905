//! Runs one image through the full detection pipeline on a worker thread.
//!
//! Usage: analyze <image_path> [config.json]

use std::{env, process, sync::Arc};

use ai_image_detector::{
    AiImageDetector, AnalysisConfig,
    error::Result,
    image_utils::ImageSource,
    worker::{AnalysisMessage, spawn_analysis},
};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = env::args().collect::<Vec<_>>();
    if args.len() < 2 {
        eprintln!("Usage: {} <image_path> [config.json]", args[0]);
        process::exit(2);
    }

    match run(&args[1], args.get(2).map(String::as_str)) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(err) => {
            eprintln!("error: {err}");
            process::exit(1);
        }
    }
}

fn run(image_path: &str, config_path: Option<&str>) -> Result<bool> {
    let config = match config_path {
        Some(path) => AnalysisConfig::from_json_file(path)?,
        None => AnalysisConfig::default(),
    };

    let source = ImageSource::from_path(image_path)?;
    let detector = Arc::new(AiImageDetector::new(config));
    let mut task = spawn_analysis(detector, source)?;

    let mut succeeded = false;
    while let Some(message) = task.blocking_next() {
        match &message {
            AnalysisMessage::Progress(event) => {
                eprintln!("[{:>3}%] {}", event.progress, event.step);
            }
            AnalysisMessage::Result(_) => {
                succeeded = true;
                println!("{}", message.to_json()?);
            }
            AnalysisMessage::Error { .. } => {
                println!("{}", message.to_json()?);
            }
        }
    }

    Ok(succeeded)
}
