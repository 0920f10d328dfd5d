//! Keeps tracked accounts in sync with the TON ledger.
//!
//! Two cooperating stages share the accounts sync-time lock: actualizers
//! claim the account most overdue for a sync and enqueue an update job when
//! the chain has moved past stored history; updaters consume those jobs,
//! paginate the account's transaction list backwards and persist it as
//! ledger rows, chaining continuation jobs until the cursor meets history
//! that is already stored.

mod actualizer;
mod config;
mod errors;
mod job;
mod normalize;
mod updater;

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use tokio::task::JoinSet;
use tonsync_queue::{Enqueuer, JobHandler, QueueClient, WorkMap, WorkerPool};
use tonsync_storage::SyncStore;
use tonsync_tasks::ShutdownGuard;
use tonsync_tonio::TonProvider;
use tracing::*;

pub use config::SyncerConfig;
pub use errors::SyncError;
pub use job::{UpdateJobArgs, JOB_TYPE_UPDATE};

use updater::UpdateHandler;

/// The sync pipeline: shared state of the actualizer and updater stages.
pub struct Syncer<S, P, Q> {
    store: Arc<S>,
    ton: Arc<P>,
    queue: Arc<Q>,
    cfg: SyncerConfig,
    sync_interval: chrono::Duration,
    lock_timeout: chrono::Duration,
}

impl<S, P, Q> Syncer<S, P, Q>
where
    S: SyncStore + 'static,
    P: TonProvider,
    Q: Enqueuer + 'static,
{
    pub fn new(store: Arc<S>, ton: Arc<P>, queue: Arc<Q>, cfg: SyncerConfig) -> Self {
        let sync_interval = chrono::Duration::from_std(cfg.account_sync_interval)
            .expect("init: account sync interval in range");
        let lock_timeout = chrono::Duration::from_std(cfg.updater_lock_timeout)
            .expect("init: updater lock timeout in range");

        Self {
            store,
            ton,
            queue,
            cfg,
            sync_interval,
            lock_timeout,
        }
    }

    /// Runs one actualizer pool and one queue-bound updater pool until
    /// shutdown. Returns as soon as either pool drains so the supervisor
    /// can cancel the sibling.
    pub async fn run(
        self: Arc<Self>,
        queue: &QueueClient,
        shutdown: ShutdownGuard,
    ) -> anyhow::Result<()> {
        let mut actualizers = JoinSet::new();
        for idx in 0..self.cfg.worker_pool_size {
            let me = self.clone();
            let guard = shutdown.clone();
            actualizers.spawn(async move { me.actualizer(idx, guard).await });
        }

        let mut handlers = WorkMap::new();
        handlers.insert(
            JOB_TYPE_UPDATE.to_string(),
            Arc::new(UpdateHandler::new(self.clone())) as Arc<dyn JobHandler>,
        );
        let updaters = WorkerPool::new(queue.clone(), handlers, self.cfg.worker_pool_size);

        info!(
            pool_size = self.cfg.worker_pool_size,
            "syncer has started"
        );

        tokio::select! {
            _ = async { while actualizers.join_next().await.is_some() {} } => {}
            res = updaters.run(shutdown.clone()) => res?,
        }

        Ok(())
    }

    pub(crate) async fn enqueue_update(
        &self,
        addr: &str,
        account_id: i64,
        tx_hash: &[u8],
        tx_lt: u64,
    ) -> Result<(), SyncError> {
        let args = UpdateJobArgs {
            addr: addr.to_string(),
            account_id,
            tx_hash: tx_hash.to_vec(),
            tx_lt,
        };
        let payload = serde_json::to_value(&args)?;
        self.queue.enqueue(JOB_TYPE_UPDATE, payload).await?;
        Ok(())
    }
}

/// Chain hashes are stored and compared in their base64 form.
pub(crate) fn encode_tx_hash(hash: &[u8]) -> String {
    STANDARD.encode(hash)
}

#[cfg(test)]
pub(crate) mod testutil {
    use std::{
        collections::{HashMap, HashSet},
        sync::{
            atomic::{AtomicBool, AtomicUsize, Ordering},
            Arc, Mutex,
        },
    };

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use tonsync_primitives::{Account, LedgerTransaction};
    use tonsync_queue::{Enqueuer, QueueError};
    use tonsync_storage::{DbError, SyncStore};
    use tonsync_tonio::{
        AccountState, BlockId, MsgKind, TonAccount, TonAddress, TonClient, TonError, TonMessage,
        TonProvider, TonTransaction,
    };

    use super::*;

    pub fn test_address() -> TonAddress {
        TonAddress::new(0, [7u8; 32])
    }

    pub fn test_account(id: i64) -> Account {
        Account {
            id,
            user_id: 10,
            name: "checking".to_string(),
            main_asset_id: 0,
            crypto_address: Some(test_address().to_string()),
            crypto_blockchain_id: Some(1),
        }
    }

    pub fn lt_hash(lt: u64) -> Vec<u8> {
        vec![lt as u8; 32]
    }

    pub fn chain_tx(lt: u64, prev_tx_lt: u64) -> TonTransaction {
        TonTransaction {
            hash: lt_hash(lt),
            lt,
            now: 1_700_000_000,
            total_fees: 0,
            in_msg: Some(TonMessage {
                kind: MsgKind::Internal,
                src: "EQsender".to_string(),
                dest: test_address().to_string(),
                amount: 1_000_000_000,
                ihr_fee: 0,
                fwd_fee: 0,
                comment: String::new(),
            }),
            out_msgs: vec![],
            prev_tx_hash: if prev_tx_lt == 0 {
                vec![]
            } else {
                lt_hash(prev_tx_lt)
            },
            prev_tx_lt,
        }
    }

    #[derive(Default)]
    pub struct TestStore {
        pub claimable: Mutex<Vec<Account>>,
        pub existing: Mutex<HashSet<(i64, String)>>,
        pub inserted: Mutex<Vec<LedgerTransaction>>,
        pub completed: Mutex<Vec<i64>>,
        pub fail_inserts: AtomicBool,
    }

    impl TestStore {
        pub fn with_existing(self, account_id: i64, hash: &str) -> Self {
            self.existing
                .lock()
                .unwrap()
                .insert((account_id, hash.to_string()));
            self
        }
    }

    #[async_trait]
    impl SyncStore for TestStore {
        async fn claim_next_account(
            &self,
            _now: DateTime<Utc>,
            _stale_before: DateTime<Utc>,
            _completed_before: DateTime<Utc>,
        ) -> Result<Option<Account>, DbError> {
            let mut claimable = self.claimable.lock().unwrap();
            if claimable.is_empty() {
                Ok(None)
            } else {
                Ok(Some(claimable.remove(0)))
            }
        }

        async fn mark_account_completed(
            &self,
            account_id: i64,
            _at: DateTime<Utc>,
        ) -> Result<(), DbError> {
            self.completed.lock().unwrap().push(account_id);
            Ok(())
        }

        async fn transaction_exists(
            &self,
            account_id: i64,
            crypto_hash: &str,
        ) -> Result<bool, DbError> {
            Ok(self
                .existing
                .lock()
                .unwrap()
                .contains(&(account_id, crypto_hash.to_string())))
        }

        async fn insert_transactions(&self, txs: &[LedgerTransaction]) -> Result<(), DbError> {
            if self.fail_inserts.load(Ordering::SeqCst) {
                return Err(DbError::Sqlx(sqlx::Error::PoolClosed));
            }
            self.inserted.lock().unwrap().extend_from_slice(txs);
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct TestTonClient {
        pub account: Mutex<Option<TonAccount>>,
        /// Pages keyed by the `lt` cursor a fetch starts from.
        pub pages: Mutex<HashMap<u64, Vec<TonTransaction>>>,
        pub list_calls: AtomicUsize,
    }

    impl TestTonClient {
        pub fn with_initialized_account(self, last_tx_lt: u64) -> Self {
            *self.account.lock().unwrap() = Some(TonAccount {
                state: Some(AccountState {
                    address: test_address(),
                }),
                last_tx_hash: lt_hash(last_tx_lt),
                last_tx_lt,
            });
            self
        }

        pub fn with_uninitialized_account(self) -> Self {
            *self.account.lock().unwrap() = Some(TonAccount {
                state: None,
                last_tx_hash: vec![],
                last_tx_lt: 0,
            });
            self
        }

        pub fn with_page(self, from_lt: u64, page: Vec<TonTransaction>) -> Self {
            self.pages.lock().unwrap().insert(from_lt, page);
            self
        }
    }

    #[async_trait]
    impl TonClient for TestTonClient {
        async fn get_masterchain_info(&self) -> Result<BlockId, TonError> {
            Ok(BlockId {
                workchain: -1,
                shard: i64::MIN,
                seqno: 1000,
            })
        }

        async fn get_account(
            &self,
            _block: &BlockId,
            _addr: &TonAddress,
        ) -> Result<TonAccount, TonError> {
            self.account
                .lock()
                .unwrap()
                .clone()
                .ok_or(TonError::MissingResult)
        }

        async fn list_transactions(
            &self,
            _addr: &TonAddress,
            _limit: u32,
            lt: u64,
            _hash: &[u8],
        ) -> Result<Vec<TonTransaction>, TonError> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.pages.lock().unwrap().get(&lt).cloned().unwrap_or_default())
        }
    }

    pub struct TestProvider(pub Arc<TestTonClient>);

    impl TonProvider for TestProvider {
        type Client = TestTonClient;

        fn client(&self) -> Arc<TestTonClient> {
            self.0.clone()
        }

        fn pinned(&self) -> Arc<TestTonClient> {
            self.0.clone()
        }
    }

    #[derive(Default)]
    pub struct TestQueue {
        pub jobs: Mutex<Vec<(String, serde_json::Value)>>,
    }

    impl TestQueue {
        pub fn enqueued_args(&self) -> Vec<UpdateJobArgs> {
            self.jobs
                .lock()
                .unwrap()
                .iter()
                .map(|(_, payload)| serde_json::from_value(payload.clone()).unwrap())
                .collect()
        }
    }

    #[async_trait]
    impl Enqueuer for TestQueue {
        async fn enqueue(
            &self,
            job_type: &str,
            args: serde_json::Value,
        ) -> Result<(), QueueError> {
            self.jobs
                .lock()
                .unwrap()
                .push((job_type.to_string(), args));
            Ok(())
        }
    }

    pub type TestSyncer = Syncer<TestStore, TestProvider, TestQueue>;

    pub fn test_syncer(
        store: TestStore,
        client: TestTonClient,
        queue: TestQueue,
    ) -> (Arc<TestSyncer>, Arc<TestStore>, Arc<TestTonClient>, Arc<TestQueue>) {
        let store = Arc::new(store);
        let client = Arc::new(client);
        let queue = Arc::new(queue);
        let cfg: SyncerConfig = serde_json::from_value(serde_json::json!({})).unwrap();
        let syncer = Arc::new(Syncer::new(
            store.clone(),
            Arc::new(TestProvider(client.clone())),
            queue.clone(),
            cfg,
        ));
        (syncer, store, client, queue)
    }
}
