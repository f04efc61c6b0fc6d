//! The accept/reject decision over an LBPH prediction.

use crate::cache::LoadedModel;
use crate::types::{GateStatus, RecognitionDecision, UNKNOWN_LABEL};
use image::GrayImage;
use std::collections::HashMap;

/// Classify one normalized face against a loaded model.
pub fn classify(face: &GrayImage, model: &LoadedModel) -> RecognitionDecision {
    decide(model.lbph.predict(face), model.threshold, &model.id_to_label)
}

/// Turn a raw prediction into a gate decision.
///
/// Checked in order: a distance at or above the threshold is rejected (the
/// threshold is a ceiling, smaller distances are better matches); a class
/// id the label map does not know is rejected the same way (stale or
/// corrupt artifact pair); anything else is accepted under the mapped
/// label. `None` means the model holds no samples and is rejected too.
pub fn decide(
    prediction: Option<(u32, f64)>,
    threshold: f64,
    id_to_label: &HashMap<u32, String>,
) -> RecognitionDecision {
    let unknown = |confidence: f64| RecognitionDecision {
        name: UNKNOWN_LABEL.to_string(),
        status: GateStatus::Ditolak,
        confidence,
        is_unknown: true,
    };

    let (raw_id, distance) = match prediction {
        Some(p) => p,
        None => return unknown(f64::INFINITY),
    };
    if distance >= threshold {
        return unknown(distance);
    }
    match id_to_label.get(&raw_id) {
        Some(label) => RecognitionDecision {
            name: label.clone(),
            status: GateStatus::Masuk,
            confidence: distance,
            is_unknown: false,
        },
        None => {
            tracing::warn!(raw_id, "predicted class id missing from label map");
            unknown(distance)
        }
    }
}
