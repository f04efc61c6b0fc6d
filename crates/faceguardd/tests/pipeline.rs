//! End-to-end pipeline tests: ingest, train, recognize and log, with a
//! scripted detector backend and in-memory stores.

use faceguard_core::locator::{DetectParams, DetectorBackend, FaceLocator};
use faceguard_core::types::{safe_label, FaceRect};
use faceguard_core::{DataLayout, EngineError, GateStatus, ModelCache};
use faceguard_hw::{SourceError, SourceId};
use faceguardd::context::RuntimeContext;
use faceguardd::db::{EventRecord, EventSink, NewEvent, ResidentDirectory, StoreError};
use faceguardd::debounce::EventDebouncer;
use faceguardd::service::{Service, ServiceError};
use faceguardd::snapshots::SnapshotStore;
use faceguardd::worker::{RecognitionWorker, SourceOpener};
use image::GrayImage;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One full-frame face for any image at least 50px on a side.
struct SizeGateDetector;

impl DetectorBackend for SizeGateDetector {
    fn detect(&self, gray: &GrayImage) -> Result<Vec<FaceRect>, EngineError> {
        let (w, h) = gray.dimensions();
        if w >= 50 && h >= 50 {
            Ok(vec![FaceRect { x: 0, y: 0, width: w, height: h }])
        } else {
            Ok(vec![])
        }
    }
}

/// A small and a large box for frames at least 160px square.
struct TwoBoxDetector;

impl DetectorBackend for TwoBoxDetector {
    fn detect(&self, gray: &GrayImage) -> Result<Vec<FaceRect>, EngineError> {
        let (w, h) = gray.dimensions();
        if w >= 160 && h >= 160 {
            // Smaller box first, so area selection has to do the work.
            Ok(vec![
                FaceRect { x: 0, y: 0, width: 80, height: 80 },
                FaceRect { x: 20, y: 20, width: 120, height: 120 },
            ])
        } else {
            Ok(vec![])
        }
    }
}

#[derive(Default)]
struct MemoryEvents(Mutex<Vec<EventRecord>>);

impl MemoryEvents {
    fn all(&self) -> Vec<EventRecord> {
        self.0.lock().unwrap().clone()
    }
}

impl EventSink for MemoryEvents {
    fn append(&self, event: NewEvent) -> Result<i64, StoreError> {
        let mut events = self.0.lock().unwrap();
        let id = events.len() as i64 + 1;
        events.push(EventRecord {
            id,
            timestamp: format!("2025-01-01T00:00:{:02}Z", id),
            name: event.name,
            status: event.status,
            confidence: event.confidence,
            snapshot: event.snapshot,
        });
        Ok(id)
    }

    fn list_recent(&self, limit: usize) -> Result<Vec<EventRecord>, StoreError> {
        Ok(self.0.lock().unwrap().iter().rev().take(limit).cloned().collect())
    }

    fn get_by_id(&self, id: i64) -> Result<Option<EventRecord>, StoreError> {
        Ok(self.0.lock().unwrap().iter().find(|e| e.id == id).cloned())
    }
}

#[derive(Default)]
struct MemoryResidents(Mutex<HashMap<String, String>>);

impl ResidentDirectory for MemoryResidents {
    fn display_names(&self) -> Result<HashMap<String, String>, StoreError> {
        Ok(self.0.lock().unwrap().clone())
    }

    fn register(&self, name: &str) -> Result<(), StoreError> {
        self.0
            .lock()
            .unwrap()
            .insert(safe_label(name), name.to_string());
        Ok(())
    }
}

/// Distinct texture per person so LBPH separates them cleanly.
fn person_image(pattern: u8, variant: u32) -> Vec<u8> {
    let img = GrayImage::from_fn(160, 160, |x, y| {
        let v = match pattern {
            0 => (y * 2 + variant * 3) % 256,            // horizontal bands
            1 => (x * 2 + variant * 3) % 256,            // vertical bands
            _ => {
                if (x / 10 + y / 10 + variant) % 2 == 0 { // checkerboard
                    220
                } else {
                    30
                }
            }
        };
        image::Luma([v as u8])
    });
    let mut buf = Cursor::new(Vec::new());
    image::DynamicImage::ImageLuma8(img)
        .write_to(&mut buf, image::ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

fn noise_image() -> Vec<u8> {
    // Deterministic pseudo-noise unlike any training texture.
    let img = GrayImage::from_fn(120, 120, |x, y| {
        image::Luma([((x * 31 + y * 17 + x * y) % 256) as u8])
    });
    let mut buf = Cursor::new(Vec::new());
    image::DynamicImage::ImageLuma8(img)
        .write_to(&mut buf, image::ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

struct Fixture {
    service: Service,
    events: Arc<MemoryEvents>,
    _tmp: tempfile::TempDir,
}

fn fixture(threshold: f64, debounce: Duration) -> Fixture {
    fixture_with_detector(threshold, debounce, Box::new(SizeGateDetector))
}

fn fixture_with_detector(
    threshold: f64,
    debounce: Duration,
    backend: Box<dyn DetectorBackend>,
) -> Fixture {
    let tmp = tempfile::tempdir().unwrap();
    let layout = DataLayout::new(tmp.path());
    layout.ensure_dirs().unwrap();

    let events = Arc::new(MemoryEvents::default());
    // Populated through ingest, like the daemon's database directory.
    let residents = Arc::new(MemoryResidents::default());

    let ctx = Arc::new(RuntimeContext {
        locator: FaceLocator::new(backend, &DetectParams::default()),
        cache: ModelCache::new(layout.clone(), 200),
        debounce: EventDebouncer::new(debounce),
        events: Arc::clone(&events) as Arc<dyn EventSink>,
        residents,
        snapshots: SnapshotStore::new(tmp.path().join("snapshots")),
        threshold,
    });

    let opener: Arc<SourceOpener> =
        Arc::new(|_: &SourceId| Err(SourceError::Unavailable("no camera in tests".into())));
    let worker = RecognitionWorker::with_opener(Arc::clone(&ctx), SourceId::Device(0), opener);
    let service = Service::new(Arc::clone(&ctx), layout, worker, 200);

    Fixture {
        service,
        events,
        _tmp: tmp,
    }
}

fn seed_three_people(service: &Service) {
    for (pattern, name) in [(0u8, "Budi Santoso"), (1, "Ana"), (2, "Chandra")] {
        let images: Vec<Vec<u8>> = (0..5).map(|v| person_image(pattern, v)).collect();
        let outcome = service.ingest_faces(name, &images, false).unwrap();
        assert_eq!(outcome.stats.saved, 5);
    }
}

#[test]
fn test_train_three_people_five_samples_each() {
    let fx = fixture(60.0, Duration::ZERO);
    seed_three_people(&fx.service);

    let summary = fx.service.train(None).unwrap();
    assert_eq!(summary.num_classes, 3);
    assert_eq!(summary.num_samples, 15);
    assert_eq!(summary.label_map["Ana"], 0);
    assert_eq!(summary.label_map["Budi_Santoso"], 1);
    assert_eq!(summary.label_map["Chandra"], 2);

    let status = fx.service.model_status();
    assert!(status.trained);
    assert!(status.artifact_mtime.is_some());
    assert!(status.labels_mtime.is_some());
}

#[test]
fn test_recognize_known_resident_accepted_without_snapshot() {
    let fx = fixture(60.0, Duration::ZERO);
    seed_three_people(&fx.service);
    fx.service.train(None).unwrap();

    // A fresh variant of Budi's texture.
    let report = fx.service.recognize_frame(&person_image(0, 1)).unwrap();
    assert!(report.detected);
    assert_eq!(report.faces.len(), 1);

    let primary = report.primary.unwrap();
    assert_eq!(primary.name, "Budi Santoso"); // display name from the directory
    assert_eq!(primary.status, GateStatus::Masuk);
    assert!(primary.known);
    assert!(primary.confidence < 60.0);

    let events = fx.events.all();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].status, GateStatus::Masuk);
    assert!(events[0].snapshot.is_none(), "accepted events carry no snapshot");
}

#[test]
fn test_recognize_stranger_rejected_with_snapshot() {
    // A near-zero ceiling rejects everything that is not an exact match.
    let fx = fixture(1e-9, Duration::ZERO);
    seed_three_people(&fx.service);
    fx.service.train(None).unwrap();

    let report = fx.service.recognize_frame(&noise_image()).unwrap();
    let primary = report.primary.unwrap();
    assert_eq!(primary.name, "Unknown");
    assert_eq!(primary.status, GateStatus::Ditolak);
    assert!(!primary.known);

    let events = fx.events.all();
    assert_eq!(events.len(), 1);
    let snapshot = events[0].snapshot.as_ref().expect("rejections are snapshotted");
    assert!(snapshot.ends_with("_Unknown.jpg"));
    assert!(fx._tmp.path().join("snapshots").join(snapshot).is_file());
}

#[test]
fn test_recognize_multi_face_primary_is_largest_box() {
    let fx = fixture_with_detector(60.0, Duration::ZERO, Box::new(TwoBoxDetector));
    // Ingest goes through the same detector, so samples are big-box crops.
    let images: Vec<Vec<u8>> = (0..5).map(|v| person_image(0, v)).collect();
    fx.service.ingest_faces("Budi Santoso", &images, false).unwrap();
    fx.service.train(None).unwrap();

    let report = fx.service.recognize_frame(&person_image(0, 1)).unwrap();
    assert_eq!(report.faces.len(), 2);

    let primary = report.primary.unwrap();
    assert_eq!(primary.bbox, FaceRect { x: 20, y: 20, width: 120, height: 120 });
    assert_eq!(primary.status, GateStatus::Masuk);
    assert_eq!(primary.name, "Budi Santoso");

    // Only the primary face drives the shared event path.
    let events = fx.events.all();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].status, GateStatus::Masuk);
}

#[test]
fn test_debounce_suppresses_repeat_within_window() {
    let fx = fixture(60.0, Duration::from_secs(3600));
    seed_three_people(&fx.service);
    fx.service.train(None).unwrap();

    fx.service.recognize_frame(&person_image(0, 1)).unwrap();
    fx.service.recognize_frame(&person_image(0, 2)).unwrap();
    assert_eq!(fx.events.all().len(), 1, "second sighting is debounced");

    // A different identity emits immediately.
    fx.service.recognize_frame(&person_image(1, 1)).unwrap();
    assert_eq!(fx.events.all().len(), 2);
}

#[test]
fn test_recognize_faceless_frame_reports_empty() {
    let fx = fixture(60.0, Duration::ZERO);
    seed_three_people(&fx.service);
    fx.service.train(None).unwrap();

    // Below the scripted detector's 50px gate.
    let small = {
        let img = GrayImage::from_pixel(30, 30, image::Luma([128]));
        let mut buf = Cursor::new(Vec::new());
        image::DynamicImage::ImageLuma8(img)
            .write_to(&mut buf, image::ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    };
    let report = fx.service.recognize_frame(&small).unwrap();
    assert!(!report.detected);
    assert!(report.faces.is_empty());
    assert!(report.primary.is_none());
    assert!(fx.events.all().is_empty());
}

#[test]
fn test_recognize_undecodable_bytes_is_error() {
    let fx = fixture(60.0, Duration::ZERO);
    let err = fx.service.recognize_frame(b"not an image").unwrap_err();
    assert!(matches!(err, ServiceError::Engine(EngineError::Decode(_))));
}

#[test]
fn test_recognize_self_heals_missing_artifact() {
    let fx = fixture(60.0, Duration::ZERO);
    seed_three_people(&fx.service);
    // No explicit train: the cache must train once on first use.
    assert!(!fx.service.model_status().trained);

    let report = fx.service.recognize_frame(&person_image(1, 0)).unwrap();
    assert!(report.detected);
    assert!(fx.service.model_status().trained);
}

#[test]
fn test_recognize_with_empty_dataset_propagates() {
    let fx = fixture(60.0, Duration::ZERO);
    let err = fx.service.recognize_frame(&person_image(0, 0)).unwrap_err();
    assert!(matches!(err, ServiceError::Engine(EngineError::EmptyDataset)));
}

#[test]
fn test_ingest_zero_saved_is_error() {
    let fx = fixture(60.0, Duration::ZERO);
    let err = fx
        .service
        .ingest_faces("Nobody", &[b"junk".to_vec()], false)
        .unwrap_err();
    assert!(matches!(err, ServiceError::NoFacesSaved { attempted: 1 }));
}

#[test]
fn test_ingest_with_retrain_reports_summary() {
    let fx = fixture(60.0, Duration::ZERO);
    let images: Vec<Vec<u8>> = (0..3).map(|v| person_image(2, v)).collect();
    let outcome = fx.service.ingest_faces("Chandra", &images, true).unwrap();
    assert_eq!(outcome.stats.saved, 3);
    let summary = outcome.training.expect("retrain ran");
    assert_eq!(summary.num_classes, 1);
    assert!(outcome.training_error.is_none());
}

#[test]
fn test_worker_source_failure_lands_in_status() {
    let fx = fixture(60.0, Duration::ZERO);
    seed_three_people(&fx.service);
    fx.service.train(None).unwrap();

    fx.service.worker_start(None).unwrap();
    std::thread::sleep(Duration::from_millis(200));
    let status = fx.service.worker_status();
    assert!(!status.running);
    assert!(status.last_error.unwrap().contains("no camera in tests"));
}
