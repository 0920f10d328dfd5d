use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use tonsync_queue::{Enqueuer, Job, JobHandler};
use tonsync_storage::SyncStore;
use tonsync_tasks::ShutdownGuard;
use tonsync_tonio::{TonAddress, TonClient, TonProvider};
use tracing::*;

use crate::{
    encode_tx_hash,
    errors::SyncError,
    job::UpdateJobArgs,
    normalize::normalize_transactions,
    Syncer,
};

/// Transactions fetched per pagination step.
const PAGE_SIZE: u32 = 100;

/// Crude hold-off before a failed job goes back to the queue.
const ERROR_BACKOFF: Duration = Duration::from_secs(3600);

/// Queue-facing adapter around [`Syncer::run_update_job`].
pub(crate) struct UpdateHandler<S, P, Q> {
    syncer: Arc<Syncer<S, P, Q>>,
}

impl<S, P, Q> UpdateHandler<S, P, Q> {
    pub(crate) fn new(syncer: Arc<Syncer<S, P, Q>>) -> Self {
        Self { syncer }
    }
}

#[async_trait]
impl<S, P, Q> JobHandler for UpdateHandler<S, P, Q>
where
    S: SyncStore + 'static,
    P: TonProvider,
    Q: Enqueuer + 'static,
{
    async fn handle(&self, job: Job, shutdown: ShutdownGuard) -> anyhow::Result<()> {
        self.syncer.run_update_job(job, shutdown).await
    }
}

impl<S, P, Q> Syncer<S, P, Q>
where
    S: SyncStore + 'static,
    P: TonProvider,
    Q: Enqueuer + 'static,
{
    /// Handles one update job from the queue.
    ///
    /// On success the account's end-sync time is stamped; a failure there
    /// is only logged, since the stale-lease rule will surface the account
    /// again. On any other failure the handler holds the job for a while
    /// before giving it back so a broken account does not spin the queue.
    pub(crate) async fn run_update_job(
        &self,
        job: Job,
        mut shutdown: ShutdownGuard,
    ) -> anyhow::Result<()> {
        // a payload that cannot be decoded will never succeed, hand it
        // straight back to the queue's retry accounting
        let args: UpdateJobArgs = serde_json::from_value(job.args)?;

        match self.update(&args).await {
            Ok(()) => {
                if let Err(err) = self
                    .store
                    .mark_account_completed(args.account_id, Utc::now())
                    .await
                {
                    error!(
                        account_id = args.account_id,
                        %err,
                        "failed to stamp end-sync time after update"
                    );
                }
                Ok(())
            }
            Err(err) => {
                error!(
                    account_id = args.account_id,
                    %err,
                    "update job failed, holding it before retry"
                );
                tokio::select! {
                    _ = tokio::time::sleep(ERROR_BACKOFF) => {}
                    _ = shutdown.wait() => {}
                }
                Err(err.into())
            }
        }
    }

    async fn update(&self, args: &UpdateJobArgs) -> Result<(), SyncError> {
        // the cursor may have walked into history that is already stored
        let cursor_hash = encode_tx_hash(&args.tx_hash);
        if self
            .store
            .transaction_exists(args.account_id, &cursor_hash)
            .await?
        {
            debug!(
                account_id = args.account_id,
                tx_hash = %cursor_hash,
                "cursor reached stored history, account is up to date"
            );
            return Ok(());
        }

        let addr: TonAddress = args.addr.parse()?;

        // one backend for the whole walk so the (lt, hash) cursor pages
        // over a consistent history
        let ton = self.ton.pinned();
        let page = ton
            .list_transactions(&addr, PAGE_SIZE, args.tx_lt, &args.tx_hash)
            .await?;

        // the page is newest first, so its tail is the pagination edge
        let Some(oldest) = page.last() else {
            return Ok(());
        };

        let rows = normalize_transactions(&page, args.account_id, self.cfg.updater_asset_id)?;
        self.store.insert_transactions(&rows).await?;

        // enqueue strictly after a successful insert, otherwise a failing
        // page would chase its own tail forever
        if oldest.prev_tx_lt != 0 {
            self.enqueue_update(
                &args.addr,
                args.account_id,
                &oldest.prev_tx_hash,
                oldest.prev_tx_lt,
            )
            .await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::Ordering;

    use tonsync_tasks::ShutdownSignal;

    use super::*;
    use crate::testutil::*;

    fn update_job(account_id: i64, tx_lt: u64) -> Job {
        let args = UpdateJobArgs {
            addr: test_address().to_string(),
            account_id,
            tx_hash: lt_hash(tx_lt),
            tx_lt,
        };
        Job {
            id: 1,
            job_type: crate::JOB_TYPE_UPDATE.to_string(),
            args: serde_json::to_value(&args).unwrap(),
            error_count: 0,
        }
    }

    fn guard() -> ShutdownGuard {
        ShutdownSignal::new().subscribe()
    }

    #[tokio::test]
    async fn single_page_inserts_rows_and_chains_a_continuation() {
        let client = TestTonClient::default().with_page(
            100,
            vec![chain_tx(100, 80), chain_tx(80, 60), chain_tx(60, 40)],
        );
        let (syncer, store, _client, queue) =
            test_syncer(TestStore::default(), client, TestQueue::default());

        syncer.run_update_job(update_job(1, 100), guard()).await.unwrap();

        let lts: Vec<_> = store
            .inserted
            .lock()
            .unwrap()
            .iter()
            .filter_map(|row| row.crypto_ton_lt)
            .collect();
        assert_eq!(lts, vec![60, 80, 100], "rows land in ascending lt order");

        let jobs = queue.enqueued_args();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].account_id, 1);
        assert_eq!(jobs[0].tx_lt, 40);
        assert_eq!(jobs[0].tx_hash, lt_hash(40));

        assert_eq!(*store.completed.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn exhausted_history_terminates_the_chain() {
        let client = TestTonClient::default()
            .with_page(100, vec![chain_tx(100, 80), chain_tx(80, 0)]);
        let (syncer, store, _client, queue) =
            test_syncer(TestStore::default(), client, TestQueue::default());

        syncer.run_update_job(update_job(1, 100), guard()).await.unwrap();

        assert_eq!(store.inserted.lock().unwrap().len(), 2);
        assert!(queue.jobs.lock().unwrap().is_empty(), "no continuation at genesis");
        assert_eq!(*store.completed.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn stored_cursor_short_circuits_without_fetching() {
        let cursor_hash = crate::encode_tx_hash(&lt_hash(100));
        let store = TestStore::default().with_existing(1, &cursor_hash);
        let client = TestTonClient::default().with_page(100, vec![chain_tx(100, 80)]);
        let (syncer, store, client, queue) = test_syncer(store, client, TestQueue::default());

        syncer.run_update_job(update_job(1, 100), guard()).await.unwrap();

        assert_eq!(client.list_calls.load(Ordering::SeqCst), 0);
        assert!(store.inserted.lock().unwrap().is_empty());
        assert!(queue.jobs.lock().unwrap().is_empty());
        assert_eq!(*store.completed.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn undecodable_payload_fails_without_completion() {
        let (syncer, store, _client, _queue) = test_syncer(
            TestStore::default(),
            TestTonClient::default(),
            TestQueue::default(),
        );

        let job = Job {
            id: 9,
            job_type: crate::JOB_TYPE_UPDATE.to_string(),
            args: serde_json::json!({"addr": 13}),
            error_count: 0,
        };

        assert!(syncer.run_update_job(job, guard()).await.is_err());
        assert!(store.completed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_insert_skips_continuation_and_backoff_is_cancellable() {
        let store = TestStore::default();
        store.fail_inserts.store(true, Ordering::SeqCst);
        let client = TestTonClient::default().with_page(100, vec![chain_tx(100, 80)]);
        let (syncer, store, _client, queue) = test_syncer(store, client, TestQueue::default());

        // with shutdown already triggered the hour-long hold returns at once
        let signal = ShutdownSignal::new();
        signal.trigger();

        let res = syncer
            .run_update_job(update_job(1, 100), signal.subscribe())
            .await;

        assert!(res.is_err());
        assert!(queue.jobs.lock().unwrap().is_empty());
        assert!(store.completed.lock().unwrap().is_empty());
    }
}
