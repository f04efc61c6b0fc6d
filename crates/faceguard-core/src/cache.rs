//! Process-wide cache of the loaded LBPH model.
//!
//! The daemon's worker and per-frame handlers share one cache. A load is
//! keyed on the artifact's mtime and the active threshold, so retraining
//! (which bumps the mtime via rename) and threshold changes both invalidate
//! it naturally. When no artifact exists yet the cache trains one with the
//! default cap before loading.

use crate::error::EngineError;
use crate::layout::DataLayout;
use crate::lbph::LbphModel;
use crate::trainer::ModelTrainer;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

const LOAD_RETRIES: usize = 3;

/// An immutable, fully-loaded model snapshot shared via `Arc`.
#[derive(Debug)]
pub struct LoadedModel {
    pub lbph: LbphModel,
    pub id_to_label: HashMap<u32, String>,
    pub threshold: f64,
    pub artifact_mtime: SystemTime,
}

struct CacheSlot {
    mtime: SystemTime,
    threshold_bits: u64,
    model: Arc<LoadedModel>,
}

pub struct ModelCache {
    layout: DataLayout,
    trainer: ModelTrainer,
    default_cap: usize,
    slot: Mutex<Option<CacheSlot>>,
}

impl ModelCache {
    pub fn new(layout: DataLayout, default_cap: usize) -> Self {
        Self {
            trainer: ModelTrainer::new(layout.clone()),
            layout,
            default_cap,
            slot: Mutex::new(None),
        }
    }

    /// The current model for the given threshold, loading (and if need be
    /// training) it on a miss. Training failures propagate; an
    /// `EmptyDataset` here means there is nothing to recognize against yet.
    pub fn get_or_load(&self, threshold: f64) -> Result<Arc<LoadedModel>, EngineError> {
        let mut slot = self.slot.lock().unwrap_or_else(|p| p.into_inner());

        let mtime = match artifact_mtime(&self.layout) {
            Some(t) => t,
            None => {
                tracing::info!("no model artifact on disk, training once");
                self.trainer.train(self.default_cap)?;
                artifact_mtime(&self.layout).ok_or(EngineError::ArtifactMissing)?
            }
        };

        let threshold_bits = threshold.to_bits();
        if let Some(cached) = slot.as_ref() {
            if cached.mtime == mtime && cached.threshold_bits == threshold_bits {
                return Ok(Arc::clone(&cached.model));
            }
        }

        let (model, mtime) = load_pair(&self.layout, threshold, mtime)?;
        let model = Arc::new(model);
        *slot = Some(CacheSlot {
            mtime,
            threshold_bits,
            model: Arc::clone(&model),
        });
        tracing::debug!(threshold, samples = model.lbph.num_samples(), "model (re)loaded");
        Ok(model)
    }

    /// Drop the cached snapshot; the next call reloads from disk.
    pub fn invalidate(&self) {
        let mut slot = self.slot.lock().unwrap_or_else(|p| p.into_inner());
        *slot = None;
    }
}

fn artifact_mtime(layout: &DataLayout) -> Option<SystemTime> {
    fs::metadata(layout.model_path()).and_then(|m| m.modified()).ok()
}

/// Read the artifact and label map, retrying if the artifact mtime moves
/// mid-read (a retrain publishing underneath us).
fn load_pair(
    layout: &DataLayout,
    threshold: f64,
    mut mtime: SystemTime,
) -> Result<(LoadedModel, SystemTime), EngineError> {
    for _ in 0..LOAD_RETRIES {
        let labels = read_json::<BTreeMap<String, u32>>(&layout.labels_path())?;
        let lbph = read_json::<LbphModel>(&layout.model_path())?;

        let after = artifact_mtime(layout).ok_or(EngineError::ArtifactMissing)?;
        if after == mtime {
            let id_to_label = labels.into_iter().map(|(label, id)| (id, label)).collect();
            return Ok((
                LoadedModel {
                    lbph,
                    id_to_label,
                    threshold,
                    artifact_mtime: mtime,
                },
                mtime,
            ));
        }
        tracing::debug!("artifact changed during load, retrying");
        mtime = after;
    }
    Err(EngineError::CorruptArtifact(
        "artifact kept changing during load".into(),
    ))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &std::path::Path) -> Result<T, EngineError> {
    let bytes = fs::read(path).map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            EngineError::ArtifactMissing
        } else {
            EngineError::Io(e)
        }
    })?;
    serde_json::from_slice(&bytes)
        .map_err(|e| EngineError::CorruptArtifact(format!("{}: {e}", path.display())))
}
