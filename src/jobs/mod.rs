use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{error, info};

pub mod tasks;

/// Job scheduler for background tasks
pub struct JobScheduler {
    context: Arc<crate::context::AppContext>,
}

impl JobScheduler {
    pub fn new(context: Arc<crate::context::AppContext>) -> Self {
        Self { context }
    }

    /// Start all background jobs
    pub fn start(self: Arc<Self>) {
        info!("Starting background job scheduler");
        tokio::spawn(Self::photo_resync_job(Arc::clone(&self)));
    }

    /// Re-attempt primary storage writes for photos stuck on the fallback
    async fn photo_resync_job(scheduler: Arc<Self>) {
        let period = scheduler.context.config.jobs.resync_interval_secs;
        let mut interval = interval(Duration::from_secs(period));

        loop {
            interval.tick().await;

            match tasks::resync_pending_photos(&scheduler.context).await {
                Ok(0) => {}
                Ok(count) => info!("Re-synced {} photo(s) to primary storage", count),
                Err(e) => error!("Photo re-sync run failed: {}", e),
            }
        }
    }
}
