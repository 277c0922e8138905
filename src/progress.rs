use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisStep {
    LoadingModel,
    ModelLoaded,
    ComputingHeuristics,
    ParsingMetadata,
    Complete,
}

impl AnalysisStep {
    pub fn label(&self) -> &'static str {
        match self {
            AnalysisStep::LoadingModel => "Loading model",
            AnalysisStep::ModelLoaded => "Model loaded",
            AnalysisStep::ComputingHeuristics => "Computing heuristics",
            AnalysisStep::ParsingMetadata => "Parsing EXIF data",
            AnalysisStep::Complete => "Analysis complete",
        }
    }

    pub fn percent(&self) -> u8 {
        match self {
            AnalysisStep::LoadingModel => 10,
            AnalysisStep::ModelLoaded => 30,
            AnalysisStep::ComputingHeuristics => 60,
            AnalysisStep::ParsingMetadata => 80,
            AnalysisStep::Complete => 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub step: String,
    pub progress: u8,
}

impl From<AnalysisStep> for ProgressEvent {
    fn from(step: AnalysisStep) -> Self {
        Self {
            step: step.label().to_string(),
            progress: step.percent(),
        }
    }
}

/// Forwards progress to a sink, dropping anything that would go backwards.
pub struct ProgressReporter<'a> {
    sink: &'a dyn Fn(ProgressEvent),
    last: Option<u8>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(sink: &'a dyn Fn(ProgressEvent)) -> Self {
        Self { sink, last: None }
    }

    pub fn report(&mut self, event: impl Into<ProgressEvent>) {
        let event = event.into();
        let progress = event.progress.min(100);

        if self.last.is_some_and(|last| progress < last) {
            return;
        }

        self.last = Some(progress);
        (self.sink)(ProgressEvent { progress, ..event });
    }
}
