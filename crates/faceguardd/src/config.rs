use faceguard_core::DetectParams;
use faceguard_hw::SourceId;
use std::path::PathBuf;

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// Root of the dataset tree (faces/, models/, snapshots/).
    pub data_dir: PathBuf,
    /// Path to the SQLite database (events + residents).
    pub db_path: PathBuf,
    /// SeetaFace cascade model file.
    pub detector_model: PathBuf,
    /// LBPH rejection ceiling: matches at or above this distance are
    /// rejected as Unknown.
    pub threshold: f64,
    /// Default per-person sample cap for training.
    pub max_train_images: usize,
    /// Minimum seconds between repeated events for the same identity.
    pub min_log_interval_secs: f64,
    /// Default worker video source.
    pub source: SourceId,
    /// Detector tuning.
    pub detect_params: DetectParams,
}

impl Config {
    /// Load configuration from `FACEGUARD_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("FACEGUARD_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".local/share/faceguard")
            });

        let db_path = std::env::var("FACEGUARD_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("residents.db"));

        let detector_model = std::env::var("FACEGUARD_DETECTOR_MODEL")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("models/seeta_fd.bin"));

        Self {
            data_dir,
            db_path,
            detector_model,
            threshold: env_f64("FACEGUARD_THRESHOLD", 60.0),
            max_train_images: env_usize("FACEGUARD_MAX_TRAIN_IMAGES", 200),
            // Negative intervals would panic in Duration::from_secs_f64.
            min_log_interval_secs: env_f64("FACEGUARD_MIN_LOG_INTERVAL_SECS", 3.0).max(0.0),
            source: SourceId::parse(
                &std::env::var("FACEGUARD_SOURCE").unwrap_or_else(|_| "0".to_string()),
            ),
            detect_params: DetectParams {
                scale_factor: env_f32("FACEGUARD_SCALE_FACTOR", 1.3),
                min_neighbors: env_u32("FACEGUARD_MIN_NEIGHBORS", 5),
                min_size: env_u32("FACEGUARD_MIN_FACE_SIZE", 60),
            },
        }
    }
}

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
