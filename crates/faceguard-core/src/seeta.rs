//! SeetaFace funnel-cascade detector backend via `rustface`.
//!
//! The rustface detector is stateful and not declared thread-safe, so it
//! lives on its own OS thread; [`SeetaDetector`] is a channel handle that
//! any number of recognition paths can share.

use crate::error::EngineError;
use crate::locator::{DetectParams, DetectorBackend};
use crate::types::FaceRect;
use image::GrayImage;
use rustface::ImageData;
use std::path::Path;
use std::sync::{mpsc, Mutex};

/// rustface walks the pyramid with a shrink factor below 1; the cascade
/// convention expresses the same step as an upscale factor above 1.
fn pyramid_shrink(scale_factor: f32) -> f32 {
    if scale_factor > 1.0 {
        1.0 / scale_factor
    } else {
        0.8
    }
}

struct DetectRequest {
    data: Vec<u8>,
    width: u32,
    height: u32,
    reply: mpsc::Sender<Vec<FaceRect>>,
}

/// Handle to the detector thread.
#[derive(Debug)]
pub struct SeetaDetector {
    requests: Mutex<mpsc::Sender<DetectRequest>>,
}

impl SeetaDetector {
    /// Spawn the detector thread and load the cascade model on it,
    /// failing fast if the model cannot be loaded.
    pub fn from_model_file(path: &Path, params: &DetectParams) -> Result<Self, EngineError> {
        if !path.exists() {
            return Err(EngineError::BackendUnavailable(format!(
                "cascade model not found: {}",
                path.display()
            )));
        }
        let model_path = path
            .to_str()
            .ok_or_else(|| {
                EngineError::BackendUnavailable("cascade model path is not valid UTF-8".into())
            })?
            .to_string();
        let params = *params;

        let (request_tx, request_rx) = mpsc::channel::<DetectRequest>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), String>>();

        std::thread::Builder::new()
            .name("faceguard-detector".into())
            .spawn(move || {
                let mut detector = match rustface::create_detector(&model_path) {
                    Ok(d) => d,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };
                detector.set_min_face_size(params.min_size);
                detector.set_score_thresh(params.min_neighbors as f64);
                detector.set_pyramid_scale_factor(pyramid_shrink(params.scale_factor));
                detector.set_slide_window_step(4, 4);
                let _ = ready_tx.send(Ok(()));

                while let Ok(req) = request_rx.recv() {
                    let mut image = ImageData::new(&req.data, req.width, req.height);
                    let faces = detector
                        .detect(&mut image)
                        .iter()
                        .map(|f| {
                            let b = f.bbox();
                            FaceRect {
                                x: b.x(),
                                y: b.y(),
                                width: b.width(),
                                height: b.height(),
                            }
                        })
                        .collect();
                    let _ = req.reply.send(faces);
                }
            })
            .map_err(|e| EngineError::BackendUnavailable(format!("detector thread: {e}")))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                tracing::info!(model = %path.display(), ?params, "loaded SeetaFace cascade");
                Ok(Self {
                    requests: Mutex::new(request_tx),
                })
            }
            Ok(Err(e)) => Err(EngineError::BackendUnavailable(e)),
            Err(_) => Err(EngineError::BackendUnavailable(
                "detector thread exited during startup".into(),
            )),
        }
    }
}

impl DetectorBackend for SeetaDetector {
    fn detect(&self, gray: &GrayImage) -> Result<Vec<FaceRect>, EngineError> {
        let (reply_tx, reply_rx) = mpsc::channel();
        {
            let requests = self
                .requests
                .lock()
                .map_err(|_| EngineError::BackendUnavailable("detector handle poisoned".into()))?;
            requests
                .send(DetectRequest {
                    data: gray.as_raw().clone(),
                    width: gray.width(),
                    height: gray.height(),
                    reply: reply_tx,
                })
                .map_err(|_| EngineError::BackendUnavailable("detector thread exited".into()))?;
        }
        reply_rx
            .recv()
            .map_err(|_| EngineError::BackendUnavailable("detector thread exited".into()))
    }
}
