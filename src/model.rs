use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use ndarray::ArrayView4;
use ort::logging::LogLevel;
use ort::session::Session;
use ort::value::TensorRef;

/// Number of digit classes the model discriminates between.
pub const DIGIT_CLASSES: usize = 10;

/// File name of the model definition inside the artifact directory.
pub const MODEL_FILE: &str = "model.onnx";

/// Where a probability vector came from.
///
/// `Fallback` marks the neutral uniform distribution substituted when the
/// model is unavailable or misbehaves, so the UI can tell a real prediction
/// from a degraded one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictionSource {
    Model,
    Fallback,
}

/// An ordered distribution over the ten digit classes: index i is the
/// probability of digit i. Values are non-negative and sum to ~1.0.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityVector {
    pub values: Vec<f32>,
    pub source: PredictionSource,
}

impl ProbabilityVector {
    pub fn from_model(values: Vec<f32>) -> Self {
        Self {
            values,
            source: PredictionSource::Model,
        }
    }

    /// The neutral distribution returned whenever inference cannot run.
    pub fn uniform_fallback() -> Self {
        Self {
            values: vec![1.0 / DIGIT_CLASSES as f32; DIGIT_CLASSES],
            source: PredictionSource::Fallback,
        }
    }
}

/// The interface the pipeline needs from a classifier.
///
/// `ModelHandler` is the production implementation; tests inject mocks.
pub trait DigitClassifier: Send + Sync {
    /// Runs inference on a `(1, S, S, 1)` tensor of values in `[0, 1]`.
    ///
    /// Implementations must always return a valid vector; failures degrade
    /// to [`ProbabilityVector::uniform_fallback`] rather than propagating.
    fn predict(&self, input: ArrayView4<f32>) -> ProbabilityVector;

    /// Whether a model is actually loaded behind this classifier.
    fn is_loaded(&self) -> bool;

    fn name(&self) -> String;
}

/// Errors that can occur while loading or invoking the model.
#[derive(Debug)]
pub enum ModelError {
    /// The configured model directory does not exist
    DirectoryMissing(PathBuf),
    /// The model definition file is missing from the artifact directory
    ArtifactMissing(PathBuf),
    /// No model has been loaded
    NotLoaded,
    /// The input tensor contains no elements
    EmptyInput,
    /// The session has no declared inputs or outputs
    NoDeclaredIo,
    /// The session mutex was poisoned by a panicking thread
    LockPoisoned,
    /// The raw output tensor shape cannot be coerced to ten scalars
    UnsupportedOutputShape(Vec<i64>),
    /// The flattened output holds fewer than ten values
    TooFewOutputs(usize),
    /// An ONNX Runtime error during session construction or inference
    Session(ort::Error),
}

impl Display for ModelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelError::DirectoryMissing(path) => {
                write!(f, "model directory not found: {}", path.display())
            }
            ModelError::ArtifactMissing(path) => {
                write!(f, "required model artifact not found: {}", path.display())
            }
            ModelError::NotLoaded => write!(f, "no model is loaded"),
            ModelError::EmptyInput => write!(f, "input tensor is empty"),
            ModelError::NoDeclaredIo => {
                write!(f, "session declares no input or output tensors")
            }
            ModelError::LockPoisoned => write!(f, "model session lock is poisoned"),
            ModelError::UnsupportedOutputShape(shape) => {
                write!(f, "unsupported output tensor shape: {:?}", shape)
            }
            ModelError::TooFewOutputs(len) => {
                write!(f, "model produced {} output values, expected 10", len)
            }
            ModelError::Session(e) => write!(f, "ONNX Runtime error: {}", e),
        }
    }
}

impl Error for ModelError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ModelError::Session(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ort::Error> for ModelError {
    fn from(e: ort::Error) -> Self {
        ModelError::Session(e)
    }
}

/// Owns the loaded model session, if any.
///
/// Created once at application start; the load is attempted immediately and
/// the handle stays in whichever state results for the process lifetime.
/// When the load fails the application keeps running in degraded mode and
/// every prediction is the uniform fallback.
pub struct ModelHandler {
    session: Option<Mutex<Session>>,
    model_path: PathBuf,
}

impl Debug for ModelHandler {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandler")
            .field("model_path", &self.model_path)
            .field("is_loaded", &self.session.is_some())
            .finish()
    }
}

impl ModelHandler {
    /// Loads the model artifact from `path`.
    ///
    /// Never fails outward: a missing or broken artifact is logged and the
    /// handler is returned unloaded.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let session = match Self::try_load(path) {
            Ok(session) => {
                tracing::info!("model loaded from {}", path.display());
                Some(Mutex::new(session))
            }
            Err(e) => {
                tracing::warn!(
                    "failed to load model from {}: {e}; running in degraded mode",
                    path.display()
                );
                None
            }
        };
        Self {
            session,
            model_path: path.to_path_buf(),
        }
    }

    fn try_load(path: &Path) -> Result<Session, ModelError> {
        if !path.exists() {
            return Err(ModelError::DirectoryMissing(path.to_path_buf()));
        }
        let model_file = path.join(MODEL_FILE);
        if !model_file.exists() {
            return Err(ModelError::ArtifactMissing(model_file));
        }
        let session = Session::builder()?
            .with_log_level(LogLevel::Error)?
            .commit_from_file(&model_file)?;
        if session.inputs.is_empty() || session.outputs.is_empty() {
            return Err(ModelError::NoDeclaredIo);
        }
        Ok(session)
    }

    pub fn is_loaded(&self) -> bool {
        self.session.is_some()
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    fn try_predict(&self, input: ArrayView4<f32>) -> Result<Vec<f32>, ModelError> {
        let session_mutex = self.session.as_ref().ok_or(ModelError::NotLoaded)?;
        if input.is_empty() {
            return Err(ModelError::EmptyInput);
        }

        let mut session = session_mutex.lock().map_err(|_| ModelError::LockPoisoned)?;
        let input_name = session
            .inputs
            .first()
            .ok_or(ModelError::NoDeclaredIo)?
            .name
            .clone();
        // Models with several outputs are disambiguated by taking the first
        // declared output, which is stable for a given artifact.
        let output_name = session
            .outputs
            .first()
            .ok_or(ModelError::NoDeclaredIo)?
            .name
            .clone();

        let input_tensor = TensorRef::from_array_view(input)?;
        let inputs = ort::inputs![input_name.as_str() => input_tensor];
        let outputs = session.run(inputs)?;

        let (shape, data) = outputs[output_name.as_str()].try_extract_tensor::<f32>()?;
        tracing::debug!("raw model output shape: {:?}", shape);

        let logits = coerce_logits(shape, data)?;
        // Softmax is applied unconditionally, even if the model's final
        // layer already normalizes its output.
        Ok(softmax(&logits))
    }
}

impl DigitClassifier for ModelHandler {
    fn predict(&self, input: ArrayView4<f32>) -> ProbabilityVector {
        match self.try_predict(input) {
            Ok(values) => ProbabilityVector::from_model(values),
            Err(e) => {
                tracing::warn!("inference failed: {e}; returning uniform probabilities");
                ProbabilityVector::uniform_fallback()
            }
        }
    }

    fn is_loaded(&self) -> bool {
        ModelHandler::is_loaded(self)
    }

    fn name(&self) -> String {
        format!("ONNX ({})", self.model_path.display())
    }
}

/// Coerces a raw output tensor to exactly ten scalar scores.
///
/// Accepted shapes, in priority order: `(1, 10)` takes row 0; `(10,)` is
/// used directly; any other multi-dimensional shape is flattened and
/// truncated to its first ten elements, failing if it holds fewer. Anything
/// else is rejected.
pub fn coerce_logits(shape: &[i64], data: &[f32]) -> Result<Vec<f32>, ModelError> {
    match shape {
        [1, 10] => Ok(data[..DIGIT_CLASSES].to_vec()),
        [10] => Ok(data.to_vec()),
        s if s.len() > 1 => {
            if data.len() >= DIGIT_CLASSES {
                Ok(data[..DIGIT_CLASSES].to_vec())
            } else {
                Err(ModelError::TooFewOutputs(data.len()))
            }
        }
        s => Err(ModelError::UnsupportedOutputShape(s.to_vec())),
    }
}

/// Numerically stable softmax: exponentiate (shifted by the maximum) and
/// normalize by the sum.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.iter().map(|&e| e / sum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array4;

    #[test]
    fn softmax_sums_to_one_with_nonnegative_values() {
        let probs = softmax(&[3.0, -1.0, 0.5, 7.2, 0.0, 0.0, -4.0, 1.1, 2.2, 0.3]);
        assert!(probs.iter().all(|&p| p >= 0.0));
        let sum: f32 = probs.iter().sum();
        assert_relative_eq!(sum, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn softmax_of_known_logits_matches_closed_form() {
        let mut logits = vec![0.0; 10];
        logits[0] = 2.0;
        logits[1] = 1.0;
        let probs = softmax(&logits);
        let expected = 2f32.exp() / (2f32.exp() + 1f32.exp() + 8.0);
        assert_relative_eq!(probs[0], expected, epsilon = 1e-5);
        assert_relative_eq!(probs[0], 0.523, epsilon = 1e-3);
    }

    #[test]
    fn coerce_accepts_batched_row() {
        let data: Vec<f32> = (0..10).map(|v| v as f32).collect();
        let logits = coerce_logits(&[1, 10], &data).unwrap();
        assert_eq!(logits, data);
    }

    #[test]
    fn coerce_accepts_flat_vector() {
        let data: Vec<f32> = (0..10).map(|v| v as f32).collect();
        let logits = coerce_logits(&[10], &data).unwrap();
        assert_eq!(logits, data);
    }

    #[test]
    fn coerce_flattens_and_truncates_larger_outputs() {
        let data: Vec<f32> = (0..20).map(|v| v as f32).collect();
        let logits = coerce_logits(&[2, 10], &data).unwrap();
        assert_eq!(logits, data[..10].to_vec());

        let logits = coerce_logits(&[1, 10, 1], &data[..10]).unwrap();
        assert_eq!(logits.len(), 10);
    }

    #[test]
    fn coerce_rejects_short_multidimensional_outputs() {
        let data = [1.0, 2.0, 3.0, 4.0];
        assert!(matches!(
            coerce_logits(&[2, 2], &data),
            Err(ModelError::TooFewOutputs(4))
        ));
    }

    #[test]
    fn coerce_rejects_flat_vectors_of_wrong_length() {
        let data = [1.0, 2.0, 3.0];
        assert!(matches!(
            coerce_logits(&[3], &data),
            Err(ModelError::UnsupportedOutputShape(_))
        ));
    }

    #[test]
    fn missing_directory_leaves_handler_unloaded() {
        let handler = ModelHandler::load("definitely/not/a/model/dir");
        assert!(!handler.is_loaded());
    }

    #[test]
    fn directory_without_artifact_leaves_handler_unloaded() {
        let dir = std::env::temp_dir().join("reco-empty-model-dir");
        std::fs::create_dir_all(&dir).unwrap();
        let handler = ModelHandler::load(&dir);
        assert!(!handler.is_loaded());
    }

    #[test]
    fn unloaded_handler_predicts_exact_uniform_fallback() {
        let handler = ModelHandler::load("definitely/not/a/model/dir");
        let input = Array4::<f32>::zeros((1, 28, 28, 1));
        let probs = handler.predict(input.view());
        assert_eq!(probs.values, vec![0.1; 10]);
        assert_eq!(probs.source, PredictionSource::Fallback);
    }
}
