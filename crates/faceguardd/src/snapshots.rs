//! Snapshots of rejected visitors.

use chrono::Local;
use faceguard_core::types::safe_label;
use image::DynamicImage;
use std::path::{Path, PathBuf};

/// Writes timestamped JPEG snapshots under `snapshots/`.
///
/// The Unknown-only policy is enforced by the emission path, not here; the
/// store just names and writes files.
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Save a snapshot and return its filename
    /// (`YYYYmmdd_HHMMSS_<label>.jpg`).
    pub fn save(&self, img: &DynamicImage, label: &str) -> std::io::Result<String> {
        std::fs::create_dir_all(&self.dir)?;
        let label = match safe_label(label).as_str() {
            "" => "event".to_string(),
            l => l.to_string(),
        };
        let filename = format!("{}_{label}.jpg", Local::now().format("%Y%m%d_%H%M%S"));
        let path = self.dir.join(&filename);
        img.save(&path)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        Ok(filename)
    }

    pub fn path_of(&self, filename: &str) -> PathBuf {
        self.dir.join(filename)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
