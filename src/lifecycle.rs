use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::cache::OffsetCache;

/// Stops the process in dependency order.
///
/// The cache drains first while `/metrics` keeps answering, then the endpoint
/// is cancelled and awaited. The caller must already have dropped (or be about
/// to drop) every input sender, otherwise the drain never completes.
pub async fn shutdown(cache: OffsetCache, endpoint: CancellationToken, server_task: JoinHandle<()>) {
    cache.shutdown().await;
    info!("offset cache drained");

    endpoint.cancel();
    if let Err(e) = server_task.await {
        error!(error = %e, "metrics endpoint task panicked");
    }
}
