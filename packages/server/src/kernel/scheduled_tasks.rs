//! Scheduled background tasks using tokio-cron-scheduler.
//!
//! The delivery scanner runs on a fixed interval. The tick itself is
//! single-flight, so a slow batch simply causes the next firing to be
//! skipped rather than overlapping.
//!
//! ```text
//! Scheduler (every OUTBOUND_DELIVERY_INTERVAL_SECS)
//!     │
//!     └─► DeliveryScanner.tick()
//!             └─► select eligible → dispatch → settle
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::config::Config;
use crate::kernel::outbound::DeliveryScanner;

/// Start the delivery tick schedule.
///
/// Returns `None` without starting anything when delivery is disabled, so a
/// deploy can ship the engine dark.
pub async fn start_scheduler(
    scanner: Arc<DeliveryScanner>,
    config: &Config,
) -> Result<Option<JobScheduler>> {
    if !config.delivery_enabled {
        tracing::info!("outbound delivery disabled; scanner will not run");
        return Ok(None);
    }

    let scheduler = JobScheduler::new().await?;

    let interval = Duration::from_secs(config.delivery_interval_secs.max(1));
    let tick_scanner = scanner.clone();
    let tick_job = Job::new_repeated_async(interval, move |_uuid, _lock| {
        let scanner = tick_scanner.clone();
        Box::pin(async move {
            if let Err(e) = scanner.tick().await {
                tracing::error!("Delivery tick failed: {}", e);
            }
        })
    })?;

    scheduler.add(tick_job).await?;
    scheduler.start().await?;

    tracing::info!(
        "Scheduled tasks started (delivery tick every {}s)",
        config.delivery_interval_secs
    );
    Ok(Some(scheduler))
}
