//! Training-sample ingestion into the dataset tree.

use crate::error::EngineError;
use crate::layout::{list_image_files, DataLayout};
use crate::locator::FaceLocator;
use crate::types::safe_label;
use std::collections::HashMap;
use std::fs;
use std::sync::{Arc, Mutex};

/// Accounting for one ingestion batch.
#[derive(Debug, Clone, serde::Serialize)]
pub struct IngestStats {
    /// Normalized dataset label the samples were filed under.
    pub label: String,
    /// Images that produced a usable face sample.
    pub saved: usize,
    /// Images that decoded badly, held no face, or failed to write.
    pub skipped: usize,
    /// Sample count for this label after the batch.
    pub total_after: usize,
}

/// Writes normalized face crops into `faces/<label>/`.
///
/// Batches for the same label are serialized with a per-label lock so the
/// `<label>_<n>.jpeg` numbering never races; different labels ingest
/// concurrently.
pub struct DatasetStore {
    layout: DataLayout,
    label_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl DatasetStore {
    pub fn new(layout: DataLayout) -> Self {
        Self {
            layout,
            label_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Ingest a batch of encoded images for one person.
    ///
    /// Each image is decoded, reduced to its largest detected face and
    /// saved as `<label>_<n>.jpeg` where `n` continues the existing
    /// numbering. Undecodable and faceless images are counted as skipped,
    /// never fatal; only filesystem and detector-backend failures abort.
    pub fn ingest(
        &self,
        locator: &FaceLocator,
        display_name: &str,
        images: &[Vec<u8>],
    ) -> Result<IngestStats, EngineError> {
        let label = safe_label(display_name);
        if label.is_empty() {
            return Err(EngineError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "person name normalizes to an empty label",
            )));
        }

        let lock = self.label_lock(&label);
        let _guard = lock.lock().unwrap_or_else(|p| p.into_inner());

        let dir = self.layout.person_dir(&label);
        fs::create_dir_all(&dir)?;
        let existing = list_image_files(&dir).len();

        let mut saved = 0usize;
        let mut skipped = 0usize;
        for bytes in images {
            let decoded = match image::load_from_memory(bytes) {
                Ok(img) => img,
                Err(e) => {
                    tracing::debug!(label = %label, error = %e, "skipping undecodable upload");
                    skipped += 1;
                    continue;
                }
            };
            let gray = decoded.to_luma8();
            let face = match locator.locate_largest(&gray)? {
                Some((face, _)) => face,
                None => {
                    skipped += 1;
                    continue;
                }
            };

            let index = existing + saved + 1;
            let path = dir.join(format!("{label}_{index}.jpeg"));
            match face.save(&path) {
                Ok(()) => saved += 1,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to write face sample");
                    skipped += 1;
                }
            }
        }

        let stats = IngestStats {
            label,
            saved,
            skipped,
            total_after: existing + saved,
        };
        tracing::info!(
            label = %stats.label,
            saved = stats.saved,
            skipped = stats.skipped,
            total = stats.total_after,
            "ingested face samples"
        );
        Ok(stats)
    }

    fn label_lock(&self, label: &str) -> Arc<Mutex<()>> {
        let mut locks = self.label_locks.lock().unwrap_or_else(|p| p.into_inner());
        locks.entry(label.to_string()).or_default().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::{DetectParams, DetectorBackend, FaceLocator};
    use crate::types::FaceRect;
    use image::GrayImage;
    use std::io::Cursor;

    /// Reports one full-frame face for any image at least 50px square.
    struct SizeGate;

    impl DetectorBackend for SizeGate {
        fn detect(&self, gray: &GrayImage) -> Result<Vec<FaceRect>, EngineError> {
            let (w, h) = gray.dimensions();
            if w >= 50 && h >= 50 {
                Ok(vec![FaceRect { x: 0, y: 0, width: w, height: h }])
            } else {
                Ok(vec![])
            }
        }
    }

    fn test_locator() -> FaceLocator {
        FaceLocator::new(Box::new(SizeGate), &DetectParams::default())
    }

    fn png_bytes(side: u32) -> Vec<u8> {
        let img = GrayImage::from_fn(side, side, |x, y| image::Luma([((x * y) % 256) as u8]));
        let mut buf = Cursor::new(Vec::new());
        image::DynamicImage::ImageLuma8(img)
            .write_to(&mut buf, image::ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_ingest_accounting_and_numbering() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(tmp.path());
        layout.ensure_dirs().unwrap();
        let store = DatasetStore::new(layout.clone());

        // 5 uploads: 2 undecodable, 1 too small to hold a face, 2 good.
        let batch = vec![
            b"definitely not an image".to_vec(),
            png_bytes(120),
            png_bytes(20),
            vec![0u8; 16],
            png_bytes(100),
        ];
        let stats = store.ingest(&test_locator(), "Budi Santoso", &batch).unwrap();
        assert_eq!(stats.label, "Budi_Santoso");
        assert_eq!(stats.saved, 2);
        assert_eq!(stats.skipped, 3);
        assert_eq!(stats.total_after, 2);

        let dir = tmp.path().join("faces/Budi_Santoso");
        assert!(dir.join("Budi_Santoso_1.jpeg").is_file());
        assert!(dir.join("Budi_Santoso_2.jpeg").is_file());
    }

    #[test]
    fn test_ingest_continues_existing_numbering() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(tmp.path());
        layout.ensure_dirs().unwrap();
        let store = DatasetStore::new(layout);

        let first = store.ingest(&test_locator(), "Ana", &[png_bytes(80)]).unwrap();
        assert_eq!(first.total_after, 1);
        let second = store.ingest(&test_locator(), "Ana", &[png_bytes(90)]).unwrap();
        assert_eq!(second.total_after, 2);
        assert!(tmp.path().join("faces/Ana/Ana_2.jpeg").is_file());
    }

    #[test]
    fn test_ingest_rejects_empty_label() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DatasetStore::new(DataLayout::new(tmp.path()));
        assert!(store.ingest(&test_locator(), "...", &[]).is_err());
    }

    #[test]
    fn test_ingest_all_faceless_saves_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(tmp.path());
        layout.ensure_dirs().unwrap();
        let store = DatasetStore::new(layout);

        let stats = store
            .ingest(&test_locator(), "Ghost", &[png_bytes(20), png_bytes(30)])
            .unwrap();
        assert_eq!(stats.saved, 0);
        assert_eq!(stats.skipped, 2);
    }
}
