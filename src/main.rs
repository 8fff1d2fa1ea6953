//! Server binary: wires the configured object store, the ffmpeg transcoder and the HTTP API.

use hlsdrop::adapters::http::{router, AppState};
use hlsdrop::adapters::local::{FfmpegTranscoder, FsStore};
use hlsdrop::application::catalog::Catalog;
use hlsdrop::application::gateway::StreamGateway;
use hlsdrop::application::pipeline::PackagingService;
use hlsdrop::config::{AppConfig, StorageSettings};
use hlsdrop::ports::storage::ObjectStore;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match AppConfig::from_env() {
        Ok(config) => Arc::new(config),
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };

    // 1. Adapters
    let store = match build_store(&config.storage).await {
        Ok(store) => store,
        Err(message) => {
            tracing::error!(error = %message, "Object store unavailable");
            std::process::exit(1);
        }
    };
    let transcoder = Arc::new(FfmpegTranscoder::new(config.ffmpeg_bin.clone()));

    // 2. Namespaces uploaded by earlier runs
    let catalog = Arc::new(Catalog::default());
    if let Err(e) = catalog.hydrate(store.as_ref(), &config.collection_root).await {
        tracing::warn!(error = %e, "Catalog hydration failed, starting empty");
    }

    // 3. Application services
    let pipeline = PackagingService::new(
        config.clone(),
        transcoder,
        store.clone(),
        catalog.clone(),
    );
    let gateway = StreamGateway::new(store, catalog, config.collection_root.clone());

    let app = router(Arc::new(AppState {
        config: config.clone(),
        pipeline,
        gateway,
    }));

    // 4. Start Server
    let address = format!("{}:{}", config.addr, config.port);
    let listener = match tokio::net::TcpListener::bind(&address).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(address = %address, error = %e, "Failed to bind TCP listener");
            std::process::exit(1);
        }
    };
    tracing::info!(address = %address, "Listening");

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }
}

async fn build_store(settings: &StorageSettings) -> Result<Arc<dyn ObjectStore>, String> {
    match settings {
        #[cfg(feature = "s3")]
        StorageSettings::S3(s3) => Ok(Arc::new(hlsdrop::adapters::aws::S3Store::connect(s3).await)),
        #[cfg(not(feature = "s3"))]
        StorageSettings::S3(_) => Err("built without the `s3` feature".to_string()),
        StorageSettings::Local { root } => {
            tracing::info!(root = %root.display(), "Using local object store");
            Ok(Arc::new(FsStore::new(root)))
        }
    }
}
