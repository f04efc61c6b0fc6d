use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "faceguard", about = "faceguard resident recognition CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Retrain the recognition model from the dataset
    Train {
        /// Max samples per person (0 = daemon default)
        #[arg(short, long, default_value_t = 0)]
        max: u32,
    },
    /// Show daemon, model and worker status
    Status,
    /// Start the background recognition worker
    Start {
        /// Video source: device index or URI (empty = daemon default)
        #[arg(short, long, default_value = "")]
        source: String,
    },
    /// Stop the background recognition worker
    Stop,
    /// Recognize faces in an image file
    Recognize {
        /// Path to a JPEG/PNG image
        image: PathBuf,
    },
    /// Upload face samples for a person
    Ingest {
        /// Person's display name
        #[arg(short, long)]
        name: String,
        /// Retrain after a successful upload
        #[arg(long)]
        retrain: bool,
        /// Image files to ingest
        images: Vec<PathBuf>,
    },
    /// Show recent recognition events
    Events {
        #[arg(short, long, default_value_t = 20)]
        limit: u32,
    },
}

#[zbus::proxy(
    interface = "org.faceguard.FaceGuard1",
    default_service = "org.faceguard.FaceGuard1",
    default_path = "/org/faceguard/FaceGuard1"
)]
trait FaceGuard {
    async fn train(&self, max_images_per_person: u32) -> zbus::Result<String>;
    async fn model_status(&self) -> zbus::Result<String>;
    async fn ingest_faces(
        &self,
        name: String,
        images: Vec<Vec<u8>>,
        retrain: bool,
    ) -> zbus::Result<String>;
    async fn recognize_frame(&self, image: Vec<u8>) -> zbus::Result<String>;
    async fn start_worker(&self, source: String) -> zbus::Result<String>;
    async fn stop_worker(&self) -> zbus::Result<String>;
    async fn worker_status(&self) -> zbus::Result<String>;
    async fn recent_events(&self, limit: u32) -> zbus::Result<String>;
    async fn status(&self) -> zbus::Result<String>;
}

/// Re-indent a JSON payload for the terminal; passes non-JSON through.
fn print_json(payload: &str) {
    match serde_json::from_str::<serde_json::Value>(payload) {
        Ok(value) => match serde_json::to_string_pretty(&value) {
            Ok(pretty) => println!("{pretty}"),
            Err(_) => println!("{payload}"),
        },
        Err(_) => println!("{payload}"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let conn = zbus::Connection::session()
        .await
        .context("connecting to session bus (is faceguardd running?)")?;
    let proxy = FaceGuardProxy::new(&conn).await?;

    match cli.command {
        Commands::Train { max } => {
            print_json(&proxy.train(max).await?);
        }
        Commands::Status => {
            print_json(&proxy.status().await?);
            print_json(&proxy.model_status().await?);
        }
        Commands::Start { source } => {
            print_json(&proxy.start_worker(source).await?);
        }
        Commands::Stop => {
            print_json(&proxy.stop_worker().await?);
        }
        Commands::Recognize { image } => {
            let bytes = std::fs::read(&image)
                .with_context(|| format!("reading {}", image.display()))?;
            print_json(&proxy.recognize_frame(bytes).await?);
        }
        Commands::Ingest {
            name,
            retrain,
            images,
        } => {
            anyhow::ensure!(!images.is_empty(), "no image files given");
            let mut payloads = Vec::with_capacity(images.len());
            for path in &images {
                payloads.push(
                    std::fs::read(path).with_context(|| format!("reading {}", path.display()))?,
                );
            }
            print_json(&proxy.ingest_faces(name, payloads, retrain).await?);
        }
        Commands::Events { limit } => {
            print_json(&proxy.recent_events(limit).await?);
        }
    }

    Ok(())
}
