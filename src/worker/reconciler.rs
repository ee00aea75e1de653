//! Periodic requeue of stale pending jobs.
//!
//! The database is the source of truth: a job that was committed but
//! whose queue push was lost stays `pending` forever unless something
//! re-announces it. This sweep finds pending jobs untouched past a
//! threshold and pushes their references again. Duplicate messages are
//! harmless because the claim is atomic.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::queue::JobQueue;
use crate::store::JobStore;

const SWEEP_BATCH: u64 = 100;

pub struct Reconciler {
    store: JobStore,
    queue: Arc<dyn JobQueue>,
    interval: Duration,
    stale_after_secs: i64,
}

impl Reconciler {
    pub fn new(
        store: JobStore,
        queue: Arc<dyn JobQueue>,
        interval: Duration,
        stale_after_secs: i64,
    ) -> Self {
        Self {
            store,
            queue,
            interval,
            stale_after_secs,
        }
    }

    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs(),
            stale_after_secs = self.stale_after_secs,
            "reconciler started"
        );

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
            if *shutdown.borrow() {
                break;
            }
            self.sweep().await;
        }

        info!("reconciler stopped");
    }

    async fn sweep(&self) {
        let stale = match self
            .store
            .list_stale_pending(self.stale_after_secs, SWEEP_BATCH)
            .await
        {
            Ok(jobs) => jobs,
            Err(e) => {
                warn!(error = %e, "stale job scan failed");
                return;
            }
        };

        if stale.is_empty() {
            return;
        }

        let mut pushed = 0usize;
        for job in &stale {
            match self.queue.push(&job.id).await {
                Ok(()) => pushed += 1,
                Err(e) => {
                    warn!(job_id = %job.id, error = %e, "requeue push failed");
                    break;
                }
            }
        }

        info!(stale = stale.len(), pushed, "requeued stale pending jobs");
    }
}
