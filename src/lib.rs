//! Core pipeline for the handwritten digit recognizer.
//!
//! The crate turns a rasterized canvas drawing into a probability
//! distribution over the ten digit classes. It is organized leaf-first:
//!
//! * [`preprocess`] converts a raw RGBA bitmap into the normalized
//!   `(1, S, S, 1)` tensor the classifier expects.
//! * [`model`] loads the pre-trained ONNX artifact and runs inference,
//!   reconciling whatever output shape the model produces into exactly
//!   ten scores.
//! * [`pipeline`] wires the two together and selects the best class.
//!
//! Every stage degrades to a neutral value instead of failing: a broken
//! bitmap becomes a zero tensor, a missing or misbehaving model becomes a
//! uniform distribution. The GUI on top never has to branch on errors.

pub mod config;
pub mod model;
pub mod pipeline;
pub mod preprocess;

pub use config::AppConfig;
pub use model::{DigitClassifier, ModelHandler, PredictionSource, ProbabilityVector};
pub use pipeline::{PredictionPipeline, PredictionResult};
pub use preprocess::{RawBitmap, preprocess};
