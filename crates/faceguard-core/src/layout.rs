//! On-disk layout of the dataset tree.
//!
//! Everything the engine persists lives under one root:
//!
//! ```text
//! <root>/faces/<label>/<label>_<n>.jpeg   training samples, one dir per person
//! <root>/models/lbph_model.json          trained LBPH artifact
//! <root>/models/labels.json              label -> class id map
//! <root>/snapshots/                      rejected-visitor snapshots
//! ```

use std::fs;
use std::path::{Path, PathBuf};

pub const MODEL_FILE: &str = "lbph_model.json";
pub const LABELS_FILE: &str = "labels.json";

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

#[derive(Debug, Clone)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn faces_dir(&self) -> PathBuf {
        self.root.join("faces")
    }

    pub fn person_dir(&self, label: &str) -> PathBuf {
        self.faces_dir().join(label)
    }

    pub fn models_dir(&self) -> PathBuf {
        self.root.join("models")
    }

    pub fn snapshots_dir(&self) -> PathBuf {
        self.root.join("snapshots")
    }

    pub fn model_path(&self) -> PathBuf {
        self.models_dir().join(MODEL_FILE)
    }

    pub fn labels_path(&self) -> PathBuf {
        self.models_dir().join(LABELS_FILE)
    }

    /// Create the faces/models/snapshots directories if missing.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        fs::create_dir_all(self.faces_dir())?;
        fs::create_dir_all(self.models_dir())?;
        fs::create_dir_all(self.snapshots_dir())?;
        Ok(())
    }
}

/// Whether a path looks like a training image (by extension, case-insensitive).
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&e.as_str())
        })
        .unwrap_or(false)
}

/// Image files directly inside `dir`, sorted by file name for deterministic
/// sampling. A missing directory reads as empty.
pub fn list_image_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = match fs::read_dir(dir) {
        Ok(entries) => entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.is_file() && is_image_file(p))
            .collect(),
        Err(_) => Vec::new(),
    };
    files.sort();
    files
}
