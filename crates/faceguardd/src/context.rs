//! Shared runtime state for all recognition paths.

use crate::db::{EventSink, NewEvent, ResidentDirectory};
use crate::debounce::EventDebouncer;
use crate::snapshots::SnapshotStore;
use faceguard_core::{FaceLocator, GateStatus, ModelCache};
use image::DynamicImage;
use std::sync::Arc;
use std::time::Instant;

/// Everything the worker and the per-frame path share: one detector, one
/// model cache, one debouncer, one event log. Lives in an `Arc` for the
/// whole process.
pub struct RuntimeContext {
    pub locator: FaceLocator,
    pub cache: ModelCache,
    pub debounce: EventDebouncer,
    pub events: Arc<dyn EventSink>,
    pub residents: Arc<dyn ResidentDirectory>,
    pub snapshots: SnapshotStore,
    pub threshold: f64,
}

impl RuntimeContext {
    /// Run a decided identity through the shared debounce gate and, when
    /// due, log it — with a snapshot of the frame iff the visitor was
    /// rejected. Snapshot and log failures degrade to a warning; the
    /// recognition result stands either way.
    pub fn emit_if_due(
        &self,
        frame: &DynamicImage,
        name: &str,
        status: GateStatus,
        confidence: f64,
    ) -> Option<i64> {
        if !self.debounce.should_emit(name, Instant::now()) {
            return None;
        }

        let snapshot = if status == GateStatus::Ditolak {
            match self.snapshots.save(frame, name) {
                Ok(filename) => Some(filename),
                Err(e) => {
                    tracing::warn!(error = %e, "snapshot write failed, logging without it");
                    None
                }
            }
        } else {
            None
        };

        match self.events.append(NewEvent {
            name: name.to_string(),
            status,
            confidence,
            snapshot,
        }) {
            Ok(id) => {
                tracing::info!(event = id, name, %status, confidence, "logged recognition event");
                Some(id)
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to append recognition event");
                None
            }
        }
    }
}
