//! Face location and normalization.
//!
//! Detection runs behind [`DetectorBackend`] so the cascade stays a black
//! box to the rest of the pipeline; every located face is cropped, clamped
//! to the frame, resized to [`FACE_SIZE`] square and histogram-equalized
//! before it reaches the classifier or the dataset tree.

use crate::error::EngineError;
use crate::types::{FaceRect, FACE_SIZE};
use image::imageops::{self, FilterType};
use image::GrayImage;

/// Detector tuning knobs, carried over from the cascade configuration.
#[derive(Debug, Clone, Copy)]
pub struct DetectParams {
    /// Image pyramid scale step between detection passes.
    pub scale_factor: f32,
    /// Cascade strictness: higher rejects more marginal candidates.
    pub min_neighbors: u32,
    /// Minimum face side in pixels; applied to multi-face results.
    pub min_size: u32,
}

impl Default for DetectParams {
    fn default() -> Self {
        Self {
            scale_factor: 1.3,
            min_neighbors: 5,
            min_size: 60,
        }
    }
}

/// A face detector. Returns raw boxes in frame coordinates, in whatever
/// order the backend produces them.
pub trait DetectorBackend: Send + Sync {
    fn detect(&self, gray: &GrayImage) -> Result<Vec<FaceRect>, EngineError>;
}

/// Locates faces and yields classifier-ready normalized crops.
pub struct FaceLocator {
    backend: Box<dyn DetectorBackend>,
    min_size: u32,
}

impl FaceLocator {
    pub fn new(backend: Box<dyn DetectorBackend>, params: &DetectParams) -> Self {
        Self {
            backend,
            min_size: params.min_size,
        }
    }

    /// The single largest face by box area, normalized, or `None` when the
    /// frame holds no face. Ties between equal-area boxes go to whichever
    /// the backend listed first.
    pub fn locate_largest(
        &self,
        gray: &GrayImage,
    ) -> Result<Option<(GrayImage, FaceRect)>, EngineError> {
        let rects = self.backend.detect(gray)?;
        let largest = rects.into_iter().max_by(|a, b| {
            match a.area().cmp(&b.area()) {
                // max_by returns the *last* maximal element; invert ties so
                // the first detection wins.
                std::cmp::Ordering::Equal => std::cmp::Ordering::Greater,
                other => other,
            }
        });
        match largest {
            Some(rect) => Ok(normalize_face(gray, &rect).map(|face| (face, rect))),
            None => Ok(None),
        }
    }

    /// All faces at least `min_size` on a side, normalized. Zero-area crops
    /// (boxes fully outside the frame) are dropped. Order follows the
    /// backend.
    pub fn locate_all(&self, gray: &GrayImage) -> Result<Vec<(GrayImage, FaceRect)>, EngineError> {
        let rects = self.backend.detect(gray)?;
        Ok(rects
            .into_iter()
            .filter(|r| r.width >= self.min_size && r.height >= self.min_size)
            .filter_map(|rect| normalize_face(gray, &rect).map(|face| (face, rect)))
            .collect())
    }
}

/// Crop a detection box out of the frame, clamped to the frame bounds, and
/// normalize it to an equalized [`FACE_SIZE`] square. `None` when the
/// clamped crop has zero area.
pub fn normalize_face(gray: &GrayImage, rect: &FaceRect) -> Option<GrayImage> {
    let (img_w, img_h) = gray.dimensions();
    let x0 = rect.x.max(0) as u32;
    let y0 = rect.y.max(0) as u32;
    if x0 >= img_w || y0 >= img_h {
        return None;
    }
    // The box may start left/above the frame; the visible width shrinks by
    // the clipped amount.
    let clip_x = (x0 as i64 - rect.x as i64) as u64;
    let clip_y = (y0 as i64 - rect.y as i64) as u64;
    let w = (rect.width as u64).saturating_sub(clip_x).min((img_w - x0) as u64) as u32;
    let h = (rect.height as u64).saturating_sub(clip_y).min((img_h - y0) as u64) as u32;
    if w == 0 || h == 0 {
        return None;
    }

    let crop = imageops::crop_imm(gray, x0, y0, w, h).to_image();
    let mut face = imageops::resize(&crop, FACE_SIZE, FACE_SIZE, FilterType::Triangle);
    equalize_hist(&mut face);
    Some(face)
}

/// In-place global histogram equalization over a grayscale image.
pub fn equalize_hist(img: &mut GrayImage) {
    let total = img.len() as u64;
    if total == 0 {
        return;
    }
    let mut counts = [0u64; 256];
    for p in img.pixels() {
        counts[p[0] as usize] += 1;
    }

    // CDF remap anchored at the first occupied bin, the standard formula.
    let cdf_min = counts
        .iter()
        .scan(0u64, |acc, &c| {
            *acc += c;
            Some(*acc)
        })
        .find(|&c| c > 0)
        .unwrap_or(0);
    if cdf_min == total {
        // Uniform image, nothing to stretch.
        return;
    }

    let mut lut = [0u8; 256];
    let mut cdf = 0u64;
    for (v, &count) in counts.iter().enumerate() {
        cdf += count;
        if cdf >= cdf_min {
            let scaled = (cdf - cdf_min) as f64 / (total - cdf_min) as f64 * 255.0;
            lut[v] = scaled.round() as u8;
        }
    }
    for p in img.pixels_mut() {
        p[0] = lut[p[0] as usize];
    }
}
