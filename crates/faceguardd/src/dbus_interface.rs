use crate::service::Service;
use faceguard_hw::SourceId;
use std::sync::Arc;
use zbus::interface;

/// D-Bus interface for the faceguard daemon.
///
/// Bus name: org.faceguard.FaceGuard1
/// Object path: /org/faceguard/FaceGuard1
///
/// Results are JSON strings; binary image payloads come in as byte arrays.
pub struct FaceGuardService {
    service: Arc<Service>,
}

impl FaceGuardService {
    pub fn new(service: Arc<Service>) -> Self {
        Self { service }
    }
}

fn failed(e: impl std::fmt::Display) -> zbus::fdo::Error {
    zbus::fdo::Error::Failed(e.to_string())
}

fn to_json<T: serde::Serialize>(value: &T) -> zbus::fdo::Result<String> {
    serde_json::to_string(value).map_err(failed)
}

/// Run a blocking recognition/training call off the async executor.
async fn blocking<T, F>(f: F) -> zbus::fdo::Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> zbus::fdo::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| failed(format!("task failed: {e}")))?
}

#[interface(name = "org.faceguard.FaceGuard1")]
impl FaceGuardService {
    /// Retrain the model. `max_images_per_person` of 0 uses the default.
    async fn train(&self, max_images_per_person: u32) -> zbus::fdo::Result<String> {
        tracing::info!(max_images_per_person, "train requested");
        let service = Arc::clone(&self.service);
        let max = (max_images_per_person > 0).then_some(max_images_per_person as usize);
        blocking(move || {
            let summary = service.train(max).map_err(failed)?;
            to_json(&summary)
        })
        .await
    }

    /// Current model artifact state.
    async fn model_status(&self) -> zbus::fdo::Result<String> {
        to_json(&self.service.model_status())
    }

    /// Save face samples for a person; `retrain` runs training afterwards.
    async fn ingest_faces(
        &self,
        name: String,
        images: Vec<Vec<u8>>,
        retrain: bool,
    ) -> zbus::fdo::Result<String> {
        tracing::info!(name, count = images.len(), retrain, "ingest requested");
        let service = Arc::clone(&self.service);
        blocking(move || {
            let outcome = service.ingest_faces(&name, &images, retrain).map_err(failed)?;
            to_json(&outcome)
        })
        .await
    }

    /// Classify one submitted frame.
    async fn recognize_frame(&self, image: Vec<u8>) -> zbus::fdo::Result<String> {
        let service = Arc::clone(&self.service);
        blocking(move || {
            let report = service.recognize_frame(&image).map_err(failed)?;
            to_json(&report)
        })
        .await
    }

    /// Start the background worker. An empty `source` keeps the current one.
    async fn start_worker(&self, source: String) -> zbus::fdo::Result<String> {
        let source = match source.trim() {
            "" => None,
            raw => Some(SourceId::parse(raw)),
        };
        let status = self.service.worker_start(source).map_err(failed)?;
        to_json(&status)
    }

    async fn stop_worker(&self) -> zbus::fdo::Result<String> {
        let status = self.service.worker_stop().map_err(failed)?;
        to_json(&status)
    }

    async fn worker_status(&self) -> zbus::fdo::Result<String> {
        to_json(&self.service.worker_status())
    }

    /// Most recent events, newest first.
    async fn recent_events(&self, limit: u32) -> zbus::fdo::Result<String> {
        let events = self.service.recent_events(limit as usize).map_err(failed)?;
        to_json(&events)
    }

    /// One event by id.
    async fn event(&self, id: i64) -> zbus::fdo::Result<String> {
        match self.service.event_by_id(id).map_err(failed)? {
            Some(record) => to_json(&record),
            None => Err(zbus::fdo::Error::Failed(format!("no event with id {id}"))),
        }
    }

    /// Daemon identification for health checks.
    async fn status(&self) -> zbus::fdo::Result<String> {
        Ok(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "worker": self.service.worker_status(),
        })
        .to_string())
    }
}
