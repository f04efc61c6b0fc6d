//! Single-frame recognition for client-submitted images.

use crate::context::RuntimeContext;
use faceguard_core::classify;
use faceguard_core::types::beautify_label;
use faceguard_core::{EngineError, FaceRect, GateStatus};
use serde::Serialize;
use std::sync::Arc;

/// One classified face in a submitted frame.
#[derive(Debug, Clone, Serialize)]
pub struct FaceObservation {
    pub bbox: FaceRect,
    pub name: String,
    pub status: GateStatus,
    pub confidence: f64,
    pub known: bool,
}

/// What a submitted frame contained.
#[derive(Debug, Clone, Serialize)]
pub struct FrameReport {
    pub detected: bool,
    /// Decoded image dimensions.
    pub width: u32,
    pub height: u32,
    pub faces: Vec<FaceObservation>,
    /// The largest face by box area; the one that drives event logging.
    pub primary: Option<FaceObservation>,
}

/// Classifies every face in a pushed frame against the shared model and
/// routes the primary face through the same debounce/snapshot/event path
/// the worker uses.
pub struct FrameRecognizer {
    ctx: Arc<RuntimeContext>,
}

impl FrameRecognizer {
    pub fn new(ctx: Arc<RuntimeContext>) -> Self {
        Self { ctx }
    }

    /// Decode and classify one image. Undecodable bytes are an error; a
    /// decodable frame with no faces is a normal empty report.
    pub fn recognize(&self, image_bytes: &[u8]) -> Result<FrameReport, EngineError> {
        let decoded = image::load_from_memory(image_bytes)?;
        let (width, height) = (decoded.width(), decoded.height());
        let gray = decoded.to_luma8();

        let located = self.ctx.locator.locate_all(&gray)?;
        if located.is_empty() {
            return Ok(FrameReport {
                detected: false,
                width,
                height,
                faces: Vec::new(),
                primary: None,
            });
        }

        let model = self.ctx.cache.get_or_load(self.ctx.threshold)?;
        let residents = self.ctx.residents.display_names().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "resident directory unavailable, using raw labels");
            Default::default()
        });

        let mut faces = Vec::with_capacity(located.len());
        let mut primary_idx = 0usize;
        for (i, (face, rect)) in located.iter().enumerate() {
            let decision = classify::classify(face, &model);
            let name = if decision.is_unknown {
                decision.name.clone()
            } else {
                residents
                    .get(&decision.name)
                    .cloned()
                    .unwrap_or_else(|| beautify_label(&decision.name))
            };
            faces.push(FaceObservation {
                bbox: *rect,
                name,
                status: decision.status,
                confidence: decision.confidence,
                known: !decision.is_unknown,
            });
            // Strict greater-than keeps the first of equal-area boxes.
            if rect.area() > located[primary_idx].1.area() {
                primary_idx = i;
            }
        }

        let primary = faces[primary_idx].clone();
        self.ctx.emit_if_due(&decoded, &primary.name, primary.status, primary.confidence);

        Ok(FrameReport {
            detected: true,
            width,
            height,
            faces,
            primary: Some(primary),
        })
    }
}
