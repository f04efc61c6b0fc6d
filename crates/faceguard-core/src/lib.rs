//! faceguard-core — Face location, LBPH recognition and dataset management.
//!
//! Pipeline: a grayscale frame goes through the [`locator::FaceLocator`]
//! (SeetaFace cascade behind a pluggable backend), normalized crops are
//! matched by the in-crate LBPH recognizer, and [`classify::decide`] turns
//! the nearest-neighbor distance into an accept/reject gate decision.
//! Training samples and model artifacts live in the [`layout::DataLayout`]
//! tree.

pub mod cache;
pub mod classify;
pub mod dataset;
pub mod error;
pub mod layout;
pub mod lbph;
pub mod locator;
pub mod seeta;
pub mod trainer;
pub mod types;

pub use cache::{LoadedModel, ModelCache};
pub use error::EngineError;
pub use layout::DataLayout;
pub use locator::{DetectParams, DetectorBackend, FaceLocator};
pub use types::{FaceRect, GateStatus, RecognitionDecision, UNKNOWN_LABEL};
