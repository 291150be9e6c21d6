//! Decision and confidence mapping
//!
//! The network's sigmoid output is the probability of the `Normal` class.
//! Scores strictly above 0.5 read as COVID negative with confidence `p`,
//! everything else as COVID positive with confidence `1 - p`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::utils::error::{Result, XrayError};

/// Score above which an image is labeled negative
pub const DECISION_THRESHOLD: f64 = 0.5;

/// Outcome label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    #[serde(rename = "COVID POSITIVE")]
    Positive,
    #[serde(rename = "COVID NEGATIVE")]
    Negative,
}

impl Label {
    /// Text shown to operators and printed in reports
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Positive => "COVID POSITIVE",
            Label::Negative => "COVID NEGATIVE",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Confidence in percent, always within [50, 100]
///
/// Only [`decide`] constructs this.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Confidence(f64);

impl Confidence {
    /// Value in percent
    pub fn percent(&self) -> f64 {
        self.0
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}%", self.0)
    }
}

/// Classification outcome for one image
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    Positive(Confidence),
    Negative(Confidence),
}

impl Verdict {
    pub fn label(&self) -> Label {
        match self {
            Verdict::Positive(_) => Label::Positive,
            Verdict::Negative(_) => Label::Negative,
        }
    }

    pub fn confidence(&self) -> Confidence {
        match self {
            Verdict::Positive(c) | Verdict::Negative(c) => *c,
        }
    }

    /// Positive results carry the hospital admission alert
    pub fn is_emergency(&self) -> bool {
        matches!(self, Verdict::Positive(_))
    }

    /// Serializable view for JSON responses and history records
    pub fn summary(&self) -> VerdictSummary {
        VerdictSummary {
            label: self.label(),
            confidence: self.confidence().percent(),
            confidence_text: self.confidence().to_string(),
            emergency: self.is_emergency(),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label(), self.confidence())
    }
}

/// Flattened verdict for serialization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerdictSummary {
    pub label: Label,
    /// Confidence in percent
    pub confidence: f64,
    /// Confidence formatted with two decimals, e.g. `82.00%`
    pub confidence_text: String,
    pub emergency: bool,
}

/// Map a raw sigmoid score to a verdict
pub fn decide(score: f64) -> Result<Verdict> {
    if !score.is_finite() || !(0.0..=1.0).contains(&score) {
        return Err(XrayError::Inference(format!(
            "model score {} is outside [0, 1]",
            score
        )));
    }

    if score > DECISION_THRESHOLD {
        Ok(Verdict::Negative(Confidence(score * 100.0)))
    } else {
        Ok(Verdict::Positive(Confidence((1.0 - score) * 100.0)))
    }
}
