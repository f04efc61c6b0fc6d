//! LBPH training over the dataset tree.

use crate::error::EngineError;
use crate::layout::{list_image_files, DataLayout};
use crate::lbph::LbphModel;
use crate::types::FACE_SIZE;
use image::imageops::{self, FilterType};
use image::GrayImage;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Result of one training run, also the JSON payload reported to clients.
#[derive(Debug, Clone, Serialize)]
pub struct TrainSummary {
    pub num_classes: usize,
    pub num_samples: usize,
    /// Dataset label -> class id, in id order.
    pub label_map: BTreeMap<String, u32>,
    pub elapsed_seconds: f64,
    pub max_samples_per_person: usize,
}

/// Trains the LBPH model from `faces/` and publishes the artifact pair.
pub struct ModelTrainer {
    layout: DataLayout,
}

impl ModelTrainer {
    pub fn new(layout: DataLayout) -> Self {
        Self { layout }
    }

    /// Train over every person directory, keeping at most
    /// `max_samples_per_person` evenly spread samples per class.
    ///
    /// Class ids are assigned in case-insensitive lexicographic label
    /// order, so the same dataset always yields the same ids. Unreadable
    /// sample files are skipped. Fails with [`EngineError::EmptyDataset`]
    /// when no directory yields a usable sample.
    pub fn train(&self, max_samples_per_person: usize) -> Result<TrainSummary, EngineError> {
        let started = Instant::now();

        let mut labels: Vec<String> = match fs::read_dir(self.layout.faces_dir()) {
            Ok(entries) => entries
                .flatten()
                .filter(|e| e.path().is_dir())
                .filter_map(|e| e.file_name().into_string().ok())
                .collect(),
            Err(_) => Vec::new(),
        };
        labels.sort_by_key(|l| l.to_lowercase());

        let mut samples: Vec<GrayImage> = Vec::new();
        let mut ids: Vec<u32> = Vec::new();
        let mut label_map: BTreeMap<String, u32> = BTreeMap::new();

        for label in labels {
            let files = list_image_files(&self.layout.person_dir(&label));
            let picked = sample_indices(files.len(), max_samples_per_person);
            let mut loaded = 0usize;
            for idx in picked {
                match load_sample(&files[idx]) {
                    Some(face) => {
                        samples.push(face);
                        loaded += 1;
                    }
                    None => {
                        tracing::warn!(path = %files[idx].display(), "skipping unreadable sample");
                    }
                }
            }
            if loaded == 0 {
                continue;
            }
            let id = label_map.len() as u32;
            label_map.insert(label, id);
            ids.extend(std::iter::repeat(id).take(loaded));
        }

        if samples.is_empty() {
            return Err(EngineError::EmptyDataset);
        }

        let model = LbphModel::train(&samples, &ids);
        self.publish(&model, &label_map)?;

        let summary = TrainSummary {
            num_classes: label_map.len(),
            num_samples: samples.len(),
            label_map,
            elapsed_seconds: started.elapsed().as_secs_f64(),
            max_samples_per_person,
        };
        tracing::info!(
            classes = summary.num_classes,
            samples = summary.num_samples,
            elapsed_s = summary.elapsed_seconds,
            "trained LBPH model"
        );
        Ok(summary)
    }

    /// Write the label map, then the artifact, each via temp-file-and-rename
    /// so a concurrent loader never observes a half-written file. The
    /// loader re-checks the artifact mtime to catch the pair mid-swap.
    fn publish(&self, model: &LbphModel, label_map: &BTreeMap<String, u32>) -> Result<(), EngineError> {
        fs::create_dir_all(self.layout.models_dir())?;
        write_atomic(&self.layout.labels_path(), &serde_json::to_vec_pretty(label_map)?)?;
        write_atomic(&self.layout.model_path(), &serde_json::to_vec(model)?)?;
        Ok(())
    }
}

/// Write via a temp file unique to this writer, then rename into place.
/// Concurrent trainers each publish a complete file; the rename decides
/// which one wins.
fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    static SEQ: AtomicU64 = AtomicU64::new(0);
    let n = SEQ.fetch_add(1, Ordering::Relaxed);
    let tmp = path.with_extension(format!("tmp.{}.{n}", std::process::id()));
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)
}

fn load_sample(path: &Path) -> Option<GrayImage> {
    let gray = image::open(path).ok()?.to_luma8();
    if gray.dimensions() == (FACE_SIZE, FACE_SIZE) {
        Some(gray)
    } else {
        Some(imageops::resize(&gray, FACE_SIZE, FACE_SIZE, FilterType::Triangle))
    }
}

/// Evenly spread `cap` indices over `0..count`.
///
/// Keeps samples from across the whole capture session instead of the
/// first `cap` frames: stride is `count / cap`, indices are
/// `floor(i * stride)` deduplicated in order. `cap == 0` keeps everything.
pub fn sample_indices(count: usize, cap: usize) -> Vec<usize> {
    if cap == 0 || count <= cap {
        return (0..count).collect();
    }
    let stride = count as f64 / cap as f64;
    let mut picked = Vec::with_capacity(cap);
    let mut last: Option<usize> = None;
    for i in 0..cap {
        let idx = ((i as f64 * stride).floor() as usize).min(count - 1);
        if last != Some(idx) {
            picked.push(idx);
            last = Some(idx);
        }
    }
    picked
}
