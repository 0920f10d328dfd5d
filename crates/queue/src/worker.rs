use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use tokio::task::JoinSet;
use tracing::*;

use tonsync_tasks::ShutdownGuard;

use crate::client::{retry_backoff, Job, QueueClient, QueueError};

const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// How long a claimed job stays invisible to other pollers. A worker that
/// dies mid-job loses the lease and the job is re-delivered.
const LOCK_LEASE: Duration = Duration::from_secs(300);

#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: Job, shutdown: ShutdownGuard) -> anyhow::Result<()>;
}

pub type WorkMap = HashMap<String, Arc<dyn JobHandler>>;

/// Pool of pollers dispatching claimed jobs to registered handlers.
pub struct WorkerPool {
    client: QueueClient,
    handlers: Arc<WorkMap>,
    size: usize,
}

impl WorkerPool {
    pub fn new(client: QueueClient, handlers: WorkMap, size: usize) -> Self {
        Self {
            client,
            handlers: Arc::new(handlers),
            size,
        }
    }

    /// Runs until shutdown; resolves once every poller has drained.
    pub async fn run(&self, shutdown: ShutdownGuard) -> Result<(), QueueError> {
        let mut workers = JoinSet::new();
        for idx in 0..self.size {
            let client = self.client.clone();
            let handlers = self.handlers.clone();
            let guard = shutdown.clone();
            workers.spawn(worker_loop(idx, client, handlers, guard));
        }

        while workers.join_next().await.is_some() {}
        Ok(())
    }
}

async fn worker_loop(
    idx: usize,
    client: QueueClient,
    handlers: Arc<WorkMap>,
    mut shutdown: ShutdownGuard,
) {
    debug!(worker = idx, "queue worker started");
    let mut poll = tokio::time::interval(POLL_INTERVAL);
    poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = poll.tick() => {}
            _ = shutdown.wait() => break,
        }

        // drain everything due before going back to sleep
        while !shutdown.is_triggered() {
            let lease_expired_before = Utc::now()
                - chrono::Duration::from_std(LOCK_LEASE).expect("lock lease in range");
            match client.claim_next(Utc::now(), lease_expired_before).await {
                Ok(Some(job)) => {
                    process_job(&client, &handlers, job, shutdown.clone()).await;
                }
                Ok(None) => break,
                Err(err) => {
                    error!(worker = idx, %err, "claiming next job failed");
                    break;
                }
            }
        }
    }

    debug!(worker = idx, "queue worker stopped");
}

async fn process_job(
    client: &QueueClient,
    handlers: &WorkMap,
    job: Job,
    shutdown: ShutdownGuard,
) {
    let job_id = job.id;
    let job_type = job.job_type.clone();
    let error_count = job.error_count;

    let Some(handler) = handlers.get(&job_type) else {
        warn!(job_id, %job_type, "no handler registered for job type");
        let retry_at = Utc::now() + retry_backoff(error_count);
        if let Err(err) = client.fail(job_id, "no handler registered", retry_at).await {
            error!(job_id, %err, "could not reschedule unhandled job");
        }
        return;
    };

    match handler.handle(job, shutdown).await {
        Ok(()) => {
            if let Err(err) = client.complete(job_id).await {
                error!(job_id, %err, "could not delete finished job");
            }
        }
        Err(handler_err) => {
            let retry_at = Utc::now() + retry_backoff(error_count);
            warn!(job_id, %job_type, err = %handler_err, %retry_at, "job failed, rescheduled");
            if let Err(err) = client.fail(job_id, &handler_err.to_string(), retry_at).await {
                error!(job_id, %err, "could not reschedule failed job");
            }
        }
    }
}
