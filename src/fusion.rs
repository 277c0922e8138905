use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{DetectionResult, HeuristicScores, classifier::ClassifierOutput};

pub const VERDICT_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    #[serde(rename = "AI-generated")]
    AiGenerated,
    #[serde(rename = "not AI-generated")]
    NotAiGenerated,
}

impl Verdict {
    /// Strictly above [`VERDICT_THRESHOLD`] is AI-generated; a tie is not.
    pub fn from_probability(probability: f64) -> Self {
        if probability > VERDICT_THRESHOLD {
            Verdict::AiGenerated
        } else {
            Verdict::NotAiGenerated
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Verdict::AiGenerated => "AI-generated",
            Verdict::NotAiGenerated => "not AI-generated",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Assembles the final record. Only the classifier decides the verdict; the
/// heuristic scores are reported as they are.
pub fn fuse(
    classifier: &ClassifierOutput,
    camera_info_present: bool,
    heuristics: HeuristicScores,
) -> DetectionResult {
    DetectionResult {
        probability: classifier.probability,
        camera_info_present,
        heuristics,
        final_verdict: Verdict::from_probability(classifier.probability),
    }
}
