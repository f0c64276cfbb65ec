// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::application::metadata_resolver::{MetadataResolver, NullMetadataResolver};
use crate::application::monitor_service::MonitorService;
use crate::application::persistence_gateway::PersistenceGateway;
use crate::infrastructure::config::{load_monitor_config, MonitorConfig};
use crate::infrastructure::file_persistence::FilePersistence;
use crate::infrastructure::http_metadata::HttpMetadataResolver;
use crate::infrastructure::memory_persistence::InMemoryPersistence;
use crate::presentation::app_state::AppState;
use crate::presentation::router::build_router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = load_monitor_config()?;
    let addr = config.bind_addr()?;

    // Infrastructure layer
    let gateway = persistence_gateway(&config);
    let resolver = metadata_resolver(&config)?;

    // Application layer
    let monitor = MonitorService::start(config.monitor_settings(), gateway, resolver).await;

    // Presentation layer
    let router = build_router(Arc::new(AppState { monitor }));

    tracing::info!(%addr, "Starting fleet-telemetry service");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

fn persistence_gateway(config: &MonitorConfig) -> Arc<dyn PersistenceGateway> {
    if config.persistence.enabled {
        tracing::info!(dir = %config.persistence.dir, "Mirroring stores to disk");
        Arc::new(FilePersistence::new(&config.persistence.dir))
    } else {
        tracing::info!("Persistence disabled, stores are kept in memory only");
        Arc::new(InMemoryPersistence::default())
    }
}

fn metadata_resolver(config: &MonitorConfig) -> anyhow::Result<Arc<dyn MetadataResolver>> {
    match &config.metadata.base_url {
        Some(base_url) => {
            tracing::info!(%base_url, "Resolving device metadata over HTTP");
            Ok(Arc::new(HttpMetadataResolver::new(
                base_url,
                config.metadata.token.clone(),
                config.metadata_timeout(),
            )?))
        }
        None => Ok(Arc::new(NullMetadataResolver)),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
