//! The daemon's exposed operations, independent of the D-Bus transport.

use crate::context::RuntimeContext;
use crate::db::{EventRecord, StoreError};
use crate::recognize::{FrameRecognizer, FrameReport};
use crate::worker::{RecognitionWorker, WorkerError, WorkerStatus};
use faceguard_core::dataset::{DatasetStore, IngestStats};
use faceguard_core::trainer::{ModelTrainer, TrainSummary};
use faceguard_core::{DataLayout, EngineError};
use faceguard_hw::SourceId;
use serde::Serialize;
use std::sync::Arc;
use std::time::UNIX_EPOCH;
use thiserror::Error;

/// Training cap bounds; requests outside are clamped, not rejected.
const TRAIN_CAP_MIN: usize = 10;
const TRAIN_CAP_MAX: usize = 2000;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Worker(#[from] WorkerError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("no usable face found in any of the {attempted} uploaded images")]
    NoFacesSaved { attempted: usize },
}

/// On-disk state of the model artifacts.
#[derive(Debug, Clone, Serialize)]
pub struct ModelStatus {
    pub trained: bool,
    /// Unix mtimes, present when the file exists.
    pub artifact_mtime: Option<i64>,
    pub labels_mtime: Option<i64>,
    pub threshold: f64,
    pub max_train_images: usize,
}

/// Result of an ingest batch, with the optional retrain piggybacked on.
#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    #[serde(flatten)]
    pub stats: IngestStats,
    /// Present when a post-ingest retrain ran and succeeded.
    pub training: Option<TrainSummary>,
    /// A retrain failure is a warning here; the ingested samples stay.
    pub training_error: Option<String>,
}

pub struct Service {
    ctx: Arc<RuntimeContext>,
    layout: DataLayout,
    dataset: DatasetStore,
    trainer: ModelTrainer,
    recognizer: FrameRecognizer,
    worker: RecognitionWorker,
    max_train_images: usize,
}

impl Service {
    pub fn new(
        ctx: Arc<RuntimeContext>,
        layout: DataLayout,
        worker: RecognitionWorker,
        max_train_images: usize,
    ) -> Self {
        Self {
            dataset: DatasetStore::new(layout.clone()),
            trainer: ModelTrainer::new(layout.clone()),
            recognizer: FrameRecognizer::new(Arc::clone(&ctx)),
            ctx,
            layout,
            worker,
            max_train_images,
        }
    }

    /// Retrain from the dataset tree. `max` of `None` (or 0) uses the
    /// configured default; anything else is clamped to a sane range.
    pub fn train(&self, max: Option<usize>) -> Result<TrainSummary, ServiceError> {
        let cap = max
            .filter(|&m| m > 0)
            .unwrap_or(self.max_train_images)
            .clamp(TRAIN_CAP_MIN, TRAIN_CAP_MAX);
        Ok(self.trainer.train(cap)?)
    }

    pub fn model_status(&self) -> ModelStatus {
        let artifact_mtime = file_mtime_unix(&self.layout.model_path());
        ModelStatus {
            trained: artifact_mtime.is_some(),
            artifact_mtime,
            labels_mtime: file_mtime_unix(&self.layout.labels_path()),
            threshold: self.ctx.threshold,
            max_train_images: self.max_train_images,
        }
    }

    /// Save face samples for a person, optionally retraining afterwards.
    ///
    /// A batch where nothing was saved is an error; a retrain failure
    /// after a successful ingest is only reported, the samples stay.
    pub fn ingest_faces(
        &self,
        name: &str,
        images: &[Vec<u8>],
        retrain: bool,
    ) -> Result<IngestOutcome, ServiceError> {
        let stats = self.dataset.ingest(&self.ctx.locator, name, images)?;
        if stats.saved == 0 {
            return Err(ServiceError::NoFacesSaved {
                attempted: images.len(),
            });
        }
        self.ctx.residents.register(name)?;

        let (training, training_error) = if retrain {
            match self.train(None) {
                Ok(summary) => (Some(summary), None),
                Err(e) => {
                    tracing::warn!(error = %e, "post-ingest training failed");
                    (None, Some(e.to_string()))
                }
            }
        } else {
            (None, None)
        };

        Ok(IngestOutcome {
            stats,
            training,
            training_error,
        })
    }

    pub fn recognize_frame(&self, image_bytes: &[u8]) -> Result<FrameReport, ServiceError> {
        Ok(self.recognizer.recognize(image_bytes)?)
    }

    pub fn worker_start(&self, source: Option<SourceId>) -> Result<WorkerStatus, ServiceError> {
        self.worker.start(source)?;
        Ok(self.worker.status())
    }

    pub fn worker_stop(&self) -> Result<WorkerStatus, ServiceError> {
        self.worker.stop()?;
        Ok(self.worker.status())
    }

    pub fn worker_status(&self) -> WorkerStatus {
        self.worker.status()
    }

    pub fn recent_events(&self, limit: usize) -> Result<Vec<EventRecord>, ServiceError> {
        Ok(self.ctx.events.list_recent(limit)?)
    }

    pub fn event_by_id(&self, id: i64) -> Result<Option<EventRecord>, ServiceError> {
        Ok(self.ctx.events.get_by_id(id)?)
    }
}

fn file_mtime_unix(path: &std::path::Path) -> Option<i64> {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
}
