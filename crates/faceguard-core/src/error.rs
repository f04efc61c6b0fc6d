//! Error type shared across the recognition engine.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("detector backend unavailable: {0}")]
    BackendUnavailable(String),
    #[error("model artifact not found; train a model first")]
    ArtifactMissing,
    #[error("dataset contains no usable face samples")]
    EmptyDataset,
    #[error("corrupt model artifact: {0}")]
    CorruptArtifact(String),
    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("artifact serialization: {0}")]
    Serialize(#[from] serde_json::Error),
}
