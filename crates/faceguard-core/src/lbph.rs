//! Local Binary Pattern Histogram face recognizer.
//!
//! Classic LBPH: each normalized face is encoded as a grid of per-region
//! histograms over 8-neighbor local binary pattern codes, and prediction is
//! a chi-square nearest-neighbor search over the stored training samples.
//! The returned distance is a dissimilarity; smaller means a closer match,
//! and callers gate acceptance with a rejection ceiling.

use image::GrayImage;
use serde::{Deserialize, Serialize};

// --- Named constants (no magic numbers) ---
const LBP_GRID: usize = 8;
const LBP_BINS: usize = 256;
/// Chi-square bins with less mass than this are skipped to avoid
/// division blow-up on near-empty bins.
const CHI_SQUARE_EPSILON: f64 = 1e-10;

/// Trained LBPH model: one spatial histogram per training sample, tagged
/// with its class id. Serialized as the on-disk artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LbphModel {
    grid: usize,
    histograms: Vec<Vec<f32>>,
    ids: Vec<u32>,
}

impl LbphModel {
    /// Build a model from normalized grayscale samples and their class ids.
    ///
    /// `samples` and `ids` are parallel; the model keeps every histogram
    /// (no averaging), matching the nearest-sample prediction rule.
    pub fn train(samples: &[GrayImage], ids: &[u32]) -> Self {
        debug_assert_eq!(samples.len(), ids.len());
        let histograms = samples.iter().map(spatial_histogram).collect();
        Self {
            grid: LBP_GRID,
            histograms,
            ids: ids.to_vec(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.histograms.is_empty()
    }

    pub fn num_samples(&self) -> usize {
        self.histograms.len()
    }

    /// Nearest-neighbor prediction: `(class_id, chi_square_distance)` of the
    /// closest stored sample, or `None` for an empty model.
    pub fn predict(&self, face: &GrayImage) -> Option<(u32, f64)> {
        let probe = spatial_histogram(face);
        let mut best: Option<(u32, f64)> = None;
        for (hist, &id) in self.histograms.iter().zip(&self.ids) {
            let dist = chi_square(&probe, hist);
            match best {
                Some((_, best_dist)) if dist >= best_dist => {}
                _ => best = Some((id, dist)),
            }
        }
        best
    }
}

/// 8-neighbor LBP code map. The one-pixel border is skipped, so the map is
/// `(w-2) x (h-2)`; empty for images narrower than 3 pixels.
fn lbp_map(img: &GrayImage) -> (Vec<u8>, u32, u32) {
    let (w, h) = img.dimensions();
    if w < 3 || h < 3 {
        return (Vec::new(), 0, 0);
    }
    let (mw, mh) = (w - 2, h - 2);
    let mut map = vec![0u8; (mw * mh) as usize];

    // Clockwise from the top-left neighbor.
    const OFFSETS: [(i32, i32); 8] = [
        (-1, -1), (0, -1), (1, -1), (1, 0), (1, 1), (0, 1), (-1, 1), (-1, 0),
    ];

    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let center = img.get_pixel(x, y)[0];
            let mut code = 0u8;
            for (bit, (dx, dy)) in OFFSETS.iter().enumerate() {
                let nx = (x as i32 + dx) as u32;
                let ny = (y as i32 + dy) as u32;
                if img.get_pixel(nx, ny)[0] >= center {
                    code |= 1 << bit;
                }
            }
            map[((y - 1) * mw + (x - 1)) as usize] = code;
        }
    }
    (map, mw, mh)
}

/// Spatial histogram: the LBP map split into an `LBP_GRID` x `LBP_GRID`
/// grid, one 256-bin histogram per region, each normalized by its region's
/// pixel count. Length is always `LBP_GRID * LBP_GRID * LBP_BINS`.
pub fn spatial_histogram(img: &GrayImage) -> Vec<f32> {
    let (map, mw, mh) = lbp_map(img);
    let mut hist = vec![0.0f32; LBP_GRID * LBP_GRID * LBP_BINS];
    if map.is_empty() {
        return hist;
    }

    let mut region_counts = [0u32; LBP_GRID * LBP_GRID];
    for y in 0..mh {
        let ry = ((y as usize * LBP_GRID) / mh as usize).min(LBP_GRID - 1);
        for x in 0..mw {
            let rx = ((x as usize * LBP_GRID) / mw as usize).min(LBP_GRID - 1);
            let region = ry * LBP_GRID + rx;
            let code = map[(y * mw + x) as usize] as usize;
            hist[region * LBP_BINS + code] += 1.0;
            region_counts[region] += 1;
        }
    }

    for (region, &count) in region_counts.iter().enumerate() {
        if count == 0 {
            continue;
        }
        let inv = 1.0 / count as f32;
        for bin in &mut hist[region * LBP_BINS..(region + 1) * LBP_BINS] {
            *bin *= inv;
        }
    }
    hist
}

/// Chi-square distance between two histograms of equal length.
pub fn chi_square(a: &[f32], b: &[f32]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    let mut sum = 0.0f64;
    for (&pa, &pb) in a.iter().zip(b) {
        let (pa, pb) = (pa as f64, pb as f64);
        let denom = pa + pb;
        if denom > CHI_SQUARE_EPSILON {
            let diff = pa - pb;
            sum += diff * diff / denom;
        }
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_face(offset: u8) -> GrayImage {
        GrayImage::from_fn(64, 64, |_, y| {
            image::Luma([(y as u32 * 3 + offset as u32).min(255) as u8])
        })
    }

    fn checker_face() -> GrayImage {
        GrayImage::from_fn(64, 64, |x, y| {
            if (x / 8 + y / 8) % 2 == 0 {
                image::Luma([230])
            } else {
                image::Luma([20])
            }
        })
    }

    #[test]
    fn test_histogram_length_fixed() {
        let hist = spatial_histogram(&gradient_face(0));
        assert_eq!(hist.len(), LBP_GRID * LBP_GRID * LBP_BINS);
    }

    #[test]
    fn test_identical_images_distance_zero() {
        let a = spatial_histogram(&checker_face());
        assert!(chi_square(&a, &a) < 1e-9);
    }

    #[test]
    fn test_distinct_patterns_distance_positive() {
        let a = spatial_histogram(&gradient_face(0));
        let b = spatial_histogram(&checker_face());
        assert!(chi_square(&a, &b) > 1.0);
    }

    #[test]
    fn test_predict_nearest_class() {
        let samples = vec![gradient_face(0), gradient_face(4), checker_face()];
        let ids = vec![0, 0, 1];
        let model = LbphModel::train(&samples, &ids);

        let (id, dist) = model.predict(&gradient_face(2)).unwrap();
        assert_eq!(id, 0);
        let (id, _) = model.predict(&checker_face()).unwrap();
        assert_eq!(id, 1);
        assert!(dist >= 0.0);
    }

    #[test]
    fn test_predict_exact_sample_is_near_zero() {
        let probe = checker_face();
        let model = LbphModel::train(&[gradient_face(0), probe.clone()], &[0, 3]);
        let (id, dist) = model.predict(&probe).unwrap();
        assert_eq!(id, 3);
        assert!(dist < 1e-9);
    }

    #[test]
    fn test_empty_model_predicts_none() {
        let model = LbphModel::train(&[], &[]);
        assert!(model.is_empty());
        assert!(model.predict(&gradient_face(0)).is_none());
    }

    #[test]
    fn test_artifact_roundtrip() {
        let model = LbphModel::train(&[checker_face()], &[7]);
        let json = serde_json::to_string(&model).unwrap();
        let back: LbphModel = serde_json::from_str(&json).unwrap();
        assert_eq!(back.num_samples(), 1);
        let (id, dist) = back.predict(&checker_face()).unwrap();
        assert_eq!(id, 7);
        assert!(dist < 1e-9);
    }

    #[test]
    fn test_tiny_image_does_not_panic() {
        let tiny = GrayImage::from_pixel(2, 2, image::Luma([10]));
        let hist = spatial_histogram(&tiny);
        assert!(hist.iter().all(|&v| v == 0.0));
    }
}
