//! Shared recognition types and label normalization.

use serde::{Deserialize, Serialize};

/// Side length of a normalized face sample in pixels.
pub const FACE_SIZE: u32 = 200;

/// A face bounding box in source-image pixel coordinates.
///
/// `x`/`y` may be negative when the detector extrapolates a box that
/// extends past the frame edge; cropping clamps to the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl FaceRect {
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Gate outcome attached to every logged recognition event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GateStatus {
    /// Accepted: a known resident was recognized.
    Masuk,
    /// Rejected: nobody recognized, or the match was too weak.
    Ditolak,
}

impl std::fmt::Display for GateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GateStatus::Masuk => f.write_str("MASUK"),
            GateStatus::Ditolak => f.write_str("DITOLAK"),
        }
    }
}

impl std::str::FromStr for GateStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MASUK" => Ok(GateStatus::Masuk),
            "DITOLAK" => Ok(GateStatus::Ditolak),
            other => Err(format!("unknown gate status: {other}")),
        }
    }
}

/// Identity label for unrecognized faces.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Outcome of classifying a single normalized face.
#[derive(Debug, Clone, Serialize)]
pub struct RecognitionDecision {
    /// Dataset label of the match, or [`UNKNOWN_LABEL`].
    pub name: String,
    pub status: GateStatus,
    /// LBPH chi-square distance of the nearest neighbor. Smaller is better.
    pub confidence: f64,
    pub is_unknown: bool,
}

/// Normalize a person's display name into a filesystem-safe dataset label.
///
/// Keeps ASCII alphanumerics and hyphens, drops all other punctuation, and
/// collapses whitespace runs into single underscores. Case is preserved.
/// `"Budi Santoso"` becomes `"Budi_Santoso"`, `"A.B.  C"` becomes `"AB_C"`.
pub fn safe_label(display_name: &str) -> String {
    let cleaned: String = display_name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_' || c.is_whitespace())
        .map(|c| if c == '_' { ' ' } else { c })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join("_")
}

/// Cosmetic fallback for labels with no resident-directory entry:
/// underscores back to spaces.
pub fn beautify_label(label: &str) -> String {
    label.replace('_', " ")
}
