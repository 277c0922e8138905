//! Runs one analysis per dedicated worker thread and streams its progress
//! back over a typed channel.
//!
//! Every request ends with exactly one terminal message, either
//! [`AnalysisMessage::Result`] or [`AnalysisMessage::Error`]. Dropping the
//! [`AnalysisTask`] abandons the request: the worker runs to completion but
//! whatever it sends afterwards is discarded.

use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    thread,
};

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use crate::{
    AiImageDetector, DetectionResult,
    error::{DetectorError, Result},
    image_utils::ImageSource,
    progress::ProgressEvent,
};

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AnalysisMessage {
    Progress(ProgressEvent),
    Result(DetectionResult),
    Error { error: String },
}

impl AnalysisMessage {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AnalysisMessage::Progress(_))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Everything a finished request produced.
#[derive(Debug)]
pub struct AnalysisOutcome {
    pub progress: Vec<ProgressEvent>,
    pub result: Result<DetectionResult>,
}

pub struct AnalysisTask {
    id: u64,
    receiver: UnboundedReceiver<AnalysisMessage>,
}

impl AnalysisTask {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// `None` once the worker has sent its terminal message and exited.
    pub async fn next(&mut self) -> Option<AnalysisMessage> {
        self.receiver.recv().await
    }

    /// Must not be called from inside an async runtime.
    pub fn blocking_next(&mut self) -> Option<AnalysisMessage> {
        self.receiver.blocking_recv()
    }

    /// Blocks until the terminal message arrives.
    pub fn wait(mut self) -> AnalysisOutcome {
        let mut progress = Vec::new();

        while let Some(message) = self.blocking_next() {
            match message {
                AnalysisMessage::Progress(event) => progress.push(event),
                AnalysisMessage::Result(result) => {
                    return AnalysisOutcome {
                        progress,
                        result: Ok(result),
                    };
                }
                AnalysisMessage::Error { error } => {
                    return AnalysisOutcome {
                        progress,
                        result: Err(DetectorError::AnalysisFailed(error)),
                    };
                }
            }
        }

        AnalysisOutcome {
            progress,
            result: Err(DetectorError::WorkerFailed(format!(
                "task {} closed without a terminal message",
                self.id
            ))),
        }
    }
}

pub fn spawn_analysis(detector: Arc<AiImageDetector>, source: ImageSource) -> Result<AnalysisTask> {
    let id = NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed);
    let (sender, receiver) = unbounded_channel();

    thread::Builder::new()
        .name(format!("analysis-worker-{id}"))
        .spawn(move || run_worker(id, &detector, source, &sender))?;

    Ok(AnalysisTask { id, receiver })
}

fn run_worker(
    id: u64,
    detector: &AiImageDetector,
    source: ImageSource,
    sender: &UnboundedSender<AnalysisMessage>,
) {
    let progress = |event: ProgressEvent| {
        // a closed receiver only means nobody is watching any more
        let _ = sender.send(AnalysisMessage::Progress(event));
    };

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        detector.analyze_with_progress(source, &progress)
    }));

    let terminal = match outcome {
        Ok(Ok(result)) => AnalysisMessage::Result(result),
        Ok(Err(err)) => {
            warn!("analysis {id} failed: {err}");
            AnalysisMessage::Error {
                error: err.to_string(),
            }
        }
        Err(payload) => {
            let error = format!("analysis worker panicked: {}", panic_message(payload.as_ref()));
            warn!("analysis {id}: {error}");
            AnalysisMessage::Error { error }
        }
    };

    if sender.send(terminal).is_err() {
        debug!("analysis {id} was abandoned, dropping its terminal message");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
