use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tonsync_primitives::{Account, LedgerTransaction};

use crate::errors::DbError;

/// Persistence operations the sync pipeline needs.
#[async_trait]
pub trait SyncStore: Send + Sync {
    /// Atomically picks the account most overdue for a sync and stamps its
    /// start-sync time with `now`, claiming it for the caller.
    ///
    /// Eligible accounts are in scope (`crypto_blockchain_id` set), were
    /// last completed at or before `completed_before` (or never), and are
    /// not currently claimed: a start-sync time newer than `stale_before`
    /// counts as a live lease held by another worker. Among eligible rows
    /// the oldest claim wins, never-claimed accounts first. Returns `None`
    /// when every account is either current or being worked on.
    async fn claim_next_account(
        &self,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
        completed_before: DateTime<Utc>,
    ) -> Result<Option<Account>, DbError>;

    /// Stamps the account's end-sync time. Idempotent; missing rows are a
    /// no-op.
    async fn mark_account_completed(
        &self,
        account_id: i64,
        at: DateTime<Utc>,
    ) -> Result<(), DbError>;

    /// Whether the account already has a ledger row for this chain hash.
    async fn transaction_exists(&self, account_id: i64, crypto_hash: &str)
        -> Result<bool, DbError>;

    /// Inserts the batch in one statement, silently skipping rows that
    /// collide on `(account_id, crypto_hash)`.
    async fn insert_transactions(&self, txs: &[LedgerTransaction]) -> Result<(), DbError>;
}
