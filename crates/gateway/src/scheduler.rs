//! Recurring background runs
//!
//! Fires every job once per interval, first after one full interval has
//! passed. Late ticks are skipped rather than bursted.

use followrank_common::config::ScheduleConfig;
use followrank_ranker::Jobs;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::info;

/// Spawn the scheduler loop, or nothing if scheduling is disabled
pub fn spawn(jobs: Jobs, config: &ScheduleConfig, shutdown: watch::Receiver<bool>) -> Option<JoinHandle<()>> {
    if !config.enabled {
        info!("Scheduler disabled");
        return None;
    }

    let period = Duration::from_secs(config.interval_secs.max(1));
    Some(tokio::spawn(run(jobs, period, shutdown)))
}

async fn run(jobs: Jobs, period: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(interval_secs = period.as_secs_f64(), "Scheduler started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                info!("Scheduled run starting");
                jobs.run_all().await;
            }
            changed = shutdown.changed() => {
                // A dropped sender also means shutdown
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    info!("Scheduler stopped");
}
