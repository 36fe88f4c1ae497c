//! downtrack - Service Downtime Incident & SLA Reporting
//!
//! Reconstructs downtime incidents from trigger state-change events and
//! serves rolling-window SLA reports over a small JSON API.

mod config;
mod db;
mod report;
mod web;

use config::ServerConfig;
use db::{Service, ServiceKind, SlaConfig, Store};
use web::Server;

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("downtrack=info".parse()?))
        .init();

    // Load configuration
    let cfg = ServerConfig::load();
    tracing::info!("Starting downtrack on port {}...", cfg.http_port);
    tracing::info!("Using database at {}", cfg.db_path);

    // Initialize database
    let store = Arc::new(Store::new(&cfg.db_path)?);
    tracing::info!("Database initialized successfully");

    // Register the standard service kinds if none exist
    let services = store.get_services()?;
    if services.is_empty() {
        tracing::info!("Registering default services");
        for (object_id, kind, interval, threshold) in [
            (1, ServiceKind::Dns, 60, 240),
            (2, ServiceKind::Dnssec, 60, 240),
            (3, ServiceKind::Rdds, 300, 864),
            (4, ServiceKind::Epp, 300, 864),
        ] {
            store.upsert_service(&Service {
                kind,
                object_id,
                sla: Some(SlaConfig {
                    measurement_interval_seconds: interval,
                    sla_threshold_minutes: threshold,
                }),
            })?;
        }
    }

    // Start web server
    let server = Server::new(cfg, store);
    server.start().await?;

    Ok(())
}
