use crate::model::{DIGIT_CLASSES, DigitClassifier, PredictionSource, ProbabilityVector};
use crate::preprocess::{RawBitmap, preprocess};

/// The outcome of one recognition request.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionResult {
    /// Recognized digit in `0..=9`, or `-1` when no usable distribution
    /// was produced.
    pub digit: i32,
    /// Probability assigned to the recognized digit.
    pub confidence: f32,
    /// The full distribution over the ten classes.
    pub probabilities: Vec<f32>,
    /// Whether the distribution came from the model or a neutral fallback.
    pub source: PredictionSource,
}

impl PredictionResult {
    fn from_probabilities(probs: ProbabilityVector) -> Self {
        let (digit, confidence) = match best_class(&probs.values) {
            Some((index, confidence)) => (index as i32, confidence),
            None => (-1, 0.0),
        };
        Self {
            digit,
            confidence,
            probabilities: probs.values,
            source: probs.source,
        }
    }
}

/// Index and value of the maximum probability, or `None` when the vector
/// does not hold exactly one probability per digit class.
///
/// Ties resolve to the lowest index, so a uniform distribution selects
/// digit 0.
fn best_class(values: &[f32]) -> Option<(usize, f32)> {
    if values.len() != DIGIT_CLASSES {
        return None;
    }
    let mut best = (0, values[0]);
    for (index, &value) in values.iter().enumerate().skip(1) {
        if value > best.1 {
            best = (index, value);
        }
    }
    Some(best)
}

/// Orchestrates one recognition pass: preprocess, predict, select best class.
///
/// The classifier is injected at construction so tests can substitute a
/// mock. There is no retry or recovery logic here; both stages already
/// degrade internally to usable fallbacks.
pub struct PredictionPipeline {
    classifier: Box<dyn DigitClassifier>,
    input_size: u32,
}

impl PredictionPipeline {
    pub fn new(classifier: Box<dyn DigitClassifier>, input_size: u32) -> Self {
        Self {
            classifier,
            input_size,
        }
    }

    pub fn classifier(&self) -> &dyn DigitClassifier {
        self.classifier.as_ref()
    }

    /// Runs a full recognition pass over a canvas bitmap.
    pub fn recognize(&self, bitmap: &RawBitmap) -> PredictionResult {
        let tensor = preprocess(bitmap, self.input_size);
        let probs = self.classifier.predict(tensor.view());
        PredictionResult::from_probabilities(probs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelHandler;
    use approx::assert_relative_eq;
    use ndarray::ArrayView4;

    struct FixedClassifier {
        values: Vec<f32>,
    }

    impl DigitClassifier for FixedClassifier {
        fn predict(&self, _input: ArrayView4<f32>) -> ProbabilityVector {
            ProbabilityVector::from_model(self.values.clone())
        }

        fn is_loaded(&self) -> bool {
            true
        }

        fn name(&self) -> String {
            "fixed".to_string()
        }
    }

    fn blank_bitmap() -> RawBitmap {
        RawBitmap::new(280, 280, vec![255; 280 * 280 * 4])
    }

    #[test]
    fn recognize_selects_the_argmax_class() {
        let mut values = vec![0.05; 10];
        values[7] = 0.55;
        let pipeline = PredictionPipeline::new(Box::new(FixedClassifier { values }), 28);

        let result = pipeline.recognize(&blank_bitmap());
        assert_eq!(result.digit, 7);
        assert_relative_eq!(result.confidence, 0.55);
        assert_eq!(result.source, PredictionSource::Model);
    }

    #[test]
    fn malformed_vector_yields_the_unavailable_sentinel() {
        let pipeline = PredictionPipeline::new(
            Box::new(FixedClassifier {
                values: Vec::new(),
            }),
            28,
        );

        let result = pipeline.recognize(&blank_bitmap());
        assert_eq!(result.digit, -1);
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn unloaded_model_recognizes_as_uniform_fallback() {
        let handler = ModelHandler::load("definitely/not/a/model/dir");
        let pipeline = PredictionPipeline::new(Box::new(handler), 28);

        let result = pipeline.recognize(&blank_bitmap());
        // Uniform distribution: the argmax resolves to the first class.
        assert_eq!(result.digit, 0);
        assert_relative_eq!(result.confidence, 0.1);
        assert_eq!(result.source, PredictionSource::Fallback);
        assert_eq!(result.probabilities, vec![0.1; 10]);
    }

    #[test]
    fn recognize_is_deterministic_for_identical_bitmaps() {
        let handler = ModelHandler::load("definitely/not/a/model/dir");
        let pipeline = PredictionPipeline::new(Box::new(handler), 28);

        let bitmap = blank_bitmap();
        assert_eq!(pipeline.recognize(&bitmap), pipeline.recognize(&bitmap));
    }
}
