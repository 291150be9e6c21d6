//! Inference module for the serving flow
//!
//! - `preprocess`: uploaded bytes to a normalized `[1, 3, 224, 224]` tensor
//! - `classifier`: the `Classifier` seam and its Burn implementation
//! - `decision`: score to verdict and confidence

pub mod classifier;
pub mod decision;
pub mod preprocess;

pub use classifier::{BurnClassifier, Classifier};
pub use decision::{decide, Confidence, Label, Verdict, VerdictSummary};
pub use preprocess::{ImageTensor, Preprocessor};

use tracing::debug;

use crate::utils::error::Result;

/// One forward pass followed by the decision mapping
pub fn classify(classifier: &dyn Classifier, image: &ImageTensor) -> Result<Verdict> {
    let score = classifier.predict(image)?;
    let verdict = decide(score as f64)?;
    debug!("score {:.4} -> {}", score, verdict);
    Ok(verdict)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::classifier::testing::FixedScore;

    #[test]
    fn test_classify_maps_score() {
        let image = ImageTensor::new(vec![0.0; 3 * 224 * 224], [1, 3, 224, 224]).unwrap();

        let verdict = classify(&FixedScore::new(0.82), &image).unwrap();
        assert_eq!(verdict.label(), Label::Negative);

        let verdict = classify(&FixedScore::new(0.1), &image).unwrap();
        assert_eq!(verdict.label(), Label::Positive);
    }

    #[test]
    fn test_classify_rejects_bad_score() {
        let image = ImageTensor::new(vec![0.0; 3 * 224 * 224], [1, 3, 224, 224]).unwrap();
        assert!(classify(&FixedScore::new(f32::NAN), &image).is_err());
    }
}
