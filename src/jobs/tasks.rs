/// Background job implementations
use crate::{context::AppContext, error::SiteResult};

/// Drain one batch of the needs-sync queue
pub async fn resync_pending_photos(ctx: &AppContext) -> SiteResult<usize> {
    ctx.photos.sync_pending().await
}
