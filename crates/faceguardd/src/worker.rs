//! Background recognition worker.
//!
//! One dedicated OS thread reads frames from a video source and pushes
//! them through the shared recognition pipeline. Control lives in a small
//! state machine: Idle -> Starting -> Running -> Stopping -> Idle. The
//! source is opened on the worker thread so a dead camera surfaces as a
//! retrievable error instead of blocking the caller.

use crate::context::RuntimeContext;
use faceguard_core::classify;
use faceguard_core::types::beautify_label;
use faceguard_hw::{SourceError, SourceId, VideoSource};
use image::{DynamicImage, GrayImage};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use thiserror::Error;

const LOOP_SLEEP: Duration = Duration::from_millis(50);
const READ_RETRY_SLEEP: Duration = Duration::from_millis(100);
const STOP_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("recognition worker is already running")]
    AlreadyRunning,
    #[error("recognition worker is not running")]
    NotRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkerPhase {
    Idle,
    Starting,
    Running,
    Stopping,
}

/// Non-blocking snapshot of the worker for status queries.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerStatus {
    pub running: bool,
    pub source: String,
    pub last_error: Option<String>,
}

pub type SourceOpener =
    dyn Fn(&SourceId) -> Result<Box<dyn VideoSource>, SourceError> + Send + Sync;

struct WorkerInner {
    phase: WorkerPhase,
    source: SourceId,
    last_error: Option<String>,
    handle: Option<JoinHandle<()>>,
    exit_rx: Option<mpsc::Receiver<()>>,
}

struct WorkerShared {
    inner: Mutex<WorkerInner>,
    cancel: AtomicBool,
}

pub struct RecognitionWorker {
    ctx: Arc<RuntimeContext>,
    shared: Arc<WorkerShared>,
    opener: Arc<SourceOpener>,
}

impl RecognitionWorker {
    pub fn new(ctx: Arc<RuntimeContext>, default_source: SourceId) -> Self {
        Self::with_opener(ctx, default_source, Arc::new(|id: &SourceId| faceguard_hw::open_source(id)))
    }

    /// Inject the source opener; capture tests script frames this way.
    pub fn with_opener(
        ctx: Arc<RuntimeContext>,
        default_source: SourceId,
        opener: Arc<SourceOpener>,
    ) -> Self {
        Self {
            ctx,
            shared: Arc::new(WorkerShared {
                inner: Mutex::new(WorkerInner {
                    phase: WorkerPhase::Idle,
                    source: default_source,
                    last_error: None,
                    handle: None,
                    exit_rx: None,
                }),
                cancel: AtomicBool::new(false),
            }),
            opener,
        }
    }

    /// Start the capture loop. Only legal from Idle; a `source` of `None`
    /// keeps the previous (or configured default) source.
    pub fn start(&self, source: Option<SourceId>) -> Result<(), WorkerError> {
        let mut inner = lock(&self.shared.inner);
        if inner.phase != WorkerPhase::Idle {
            return Err(WorkerError::AlreadyRunning);
        }
        if let Some(source) = source {
            inner.source = source;
        }
        inner.last_error = None;
        inner.phase = WorkerPhase::Starting;
        self.shared.cancel.store(false, Ordering::SeqCst);

        let (exit_tx, exit_rx) = mpsc::channel();
        let ctx = Arc::clone(&self.ctx);
        let shared = Arc::clone(&self.shared);
        let opener = Arc::clone(&self.opener);
        let source = inner.source.clone();

        let handle = std::thread::Builder::new()
            .name("faceguard-worker".into())
            .spawn(move || {
                run_capture_loop(ctx, shared, source, opener, exit_tx);
            })
            .expect("failed to spawn worker thread");

        inner.handle = Some(handle);
        inner.exit_rx = Some(exit_rx);
        tracing::info!(source = %inner.source, "recognition worker starting");
        Ok(())
    }

    /// Request a stop and wait (bounded) for the thread to wind down.
    /// Only legal while Running.
    pub fn stop(&self) -> Result<(), WorkerError> {
        let (exit_rx, handle) = {
            let mut inner = lock(&self.shared.inner);
            if inner.phase != WorkerPhase::Running {
                return Err(WorkerError::NotRunning);
            }
            inner.phase = WorkerPhase::Stopping;
            self.shared.cancel.store(true, Ordering::SeqCst);
            (inner.exit_rx.take(), inner.handle.take())
        };

        // The blocking read may outlive the timeout; if so the thread is
        // leaked and finishes on its own once the read returns.
        let exited = exit_rx
            .map(|rx| rx.recv_timeout(STOP_JOIN_TIMEOUT).is_ok())
            .unwrap_or(false);
        if exited {
            if let Some(handle) = handle {
                let _ = handle.join();
            }
            tracing::info!("recognition worker stopped");
        } else {
            tracing::warn!("worker thread did not exit within the stop timeout");
        }
        Ok(())
    }

    pub fn status(&self) -> WorkerStatus {
        let inner = lock(&self.shared.inner);
        WorkerStatus {
            running: inner.phase == WorkerPhase::Running,
            source: inner.source.to_string(),
            last_error: inner.last_error.clone(),
        }
    }
}

fn lock(m: &Mutex<WorkerInner>) -> std::sync::MutexGuard<'_, WorkerInner> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}

/// The worker thread body. Every exit path parks the state machine back in
/// Idle and signals the exit channel; the source is released by drop.
fn run_capture_loop(
    ctx: Arc<RuntimeContext>,
    shared: Arc<WorkerShared>,
    source: SourceId,
    opener: Arc<SourceOpener>,
    exit_tx: mpsc::Sender<()>,
) {
    let finish = |error: Option<String>| {
        let mut inner = lock(&shared.inner);
        if let Some(e) = error {
            tracing::warn!(error = %e, "worker loop ended with error");
            inner.last_error = Some(e);
        }
        inner.phase = WorkerPhase::Idle;
        drop(inner);
        let _ = exit_tx.send(());
    };

    let mut video = match opener(&source) {
        Ok(v) => v,
        Err(e) => {
            finish(Some(e.to_string()));
            return;
        }
    };

    // Resolve the model once per run; a missing or empty dataset surfaces
    // here instead of failing every frame.
    let model = match ctx.cache.get_or_load(ctx.threshold) {
        Ok(m) => m,
        Err(e) => {
            finish(Some(e.to_string()));
            return;
        }
    };
    let residents = ctx.residents.display_names().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "resident directory unavailable, using raw labels");
        Default::default()
    });

    lock(&shared.inner).phase = WorkerPhase::Running;
    tracing::info!(source = %source, samples = model.lbph.num_samples(), "worker loop running");

    let mut exit_error = None;
    while !shared.cancel.load(Ordering::SeqCst) {
        let frame = match video.read_frame() {
            Ok(frame) => frame,
            Err(SourceError::Transient(e)) => {
                tracing::debug!(error = %e, "transient read failure, retrying");
                std::thread::sleep(READ_RETRY_SLEEP);
                continue;
            }
            Err(e @ SourceError::Unavailable(_)) => {
                exit_error = Some(e.to_string());
                break;
            }
        };

        let Some(gray) = GrayImage::from_raw(frame.width, frame.height, frame.data) else {
            tracing::debug!("frame buffer mismatch, dropping frame");
            continue;
        };

        match ctx.locator.locate_largest(&gray) {
            Ok(Some((face, _rect))) => {
                let decision = classify::classify(&face, &model);
                let name = if decision.is_unknown {
                    decision.name.clone()
                } else {
                    residents
                        .get(&decision.name)
                        .cloned()
                        .unwrap_or_else(|| beautify_label(&decision.name))
                };
                ctx.emit_if_due(
                    &DynamicImage::ImageLuma8(gray),
                    &name,
                    decision.status,
                    decision.confidence,
                );
            }
            Ok(None) => {}
            Err(e) => {
                exit_error = Some(e.to_string());
                break;
            }
        }

        std::thread::sleep(LOOP_SLEEP);
    }

    finish(exit_error);
}
