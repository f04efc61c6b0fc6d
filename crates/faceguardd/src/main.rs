use anyhow::{Context, Result};
use faceguard_core::seeta::SeetaDetector;
use faceguard_core::{DataLayout, FaceLocator, ModelCache};
use faceguardd::config::Config;
use faceguardd::context::RuntimeContext;
use faceguardd::db::Database;
use faceguardd::dbus_interface::FaceGuardService;
use faceguardd::debounce::EventDebouncer;
use faceguardd::service::Service;
use faceguardd::snapshots::SnapshotStore;
use faceguardd::worker::RecognitionWorker;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("faceguardd starting");

    let cfg = Config::from_env();
    let layout = DataLayout::new(&cfg.data_dir);
    layout
        .ensure_dirs()
        .with_context(|| format!("preparing dataset tree at {}", cfg.data_dir.display()))?;

    // Fail fast: without a detector nothing downstream can work.
    let detector = SeetaDetector::from_model_file(&cfg.detector_model, &cfg.detect_params)
        .context("loading face detector")?;

    let db = Arc::new(Database::open(&cfg.db_path).context("opening database")?);

    let ctx = Arc::new(RuntimeContext {
        locator: FaceLocator::new(Box::new(detector), &cfg.detect_params),
        cache: ModelCache::new(layout.clone(), cfg.max_train_images),
        debounce: EventDebouncer::new(Duration::from_secs_f64(cfg.min_log_interval_secs)),
        events: db.clone(),
        residents: db,
        snapshots: SnapshotStore::new(layout.snapshots_dir()),
        threshold: cfg.threshold,
    });

    let worker = RecognitionWorker::new(Arc::clone(&ctx), cfg.source.clone());
    let service = Arc::new(Service::new(
        Arc::clone(&ctx),
        layout,
        worker,
        cfg.max_train_images,
    ));

    let _conn = zbus::connection::Builder::session()
        .context("connecting to session bus")?
        .name("org.faceguard.FaceGuard1")?
        .serve_at(
            "/org/faceguard/FaceGuard1",
            FaceGuardService::new(Arc::clone(&service)),
        )?
        .build()
        .await
        .context("registering D-Bus interface")?;

    tracing::info!(
        data_dir = %cfg.data_dir.display(),
        threshold = cfg.threshold,
        source = %cfg.source,
        "faceguardd ready"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("faceguardd shutting down");

    // Best effort: a stopped or never-started worker is fine.
    let _ = service.worker_stop();

    Ok(())
}
