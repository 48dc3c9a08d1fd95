/// sitetrack - construction site photo service
///
/// Receives site photos over HTTP, compresses them to a size budget and
/// files them on the configured storage backends, with task-scoped
/// organization and automatic fallback when the primary store is down.

mod api;
mod blob_store;
mod compress;
mod config;
mod context;
mod db;
mod error;
mod jobs;
mod photos;
mod server;
mod tasks;

use config::ServerConfig;
use context::AppContext;
use error::SiteResult;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> SiteResult<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sitetrack=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;

    let ctx = Arc::new(AppContext::new(config).await?);

    let scheduler = Arc::new(jobs::JobScheduler::new(Arc::clone(&ctx)));
    scheduler.start();

    server::serve((*ctx).clone()).await?;

    Ok(())
}
