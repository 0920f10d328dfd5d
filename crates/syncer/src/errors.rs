use thiserror::Error;
use tonsync_queue::QueueError;
use tonsync_storage::DbError;
use tonsync_tonio::TonError;

#[derive(Debug, Error)]
pub enum SyncError {
    /// The claim predicate only requires a blockchain id, so a row without
    /// an address slipping through means the accounts data is inconsistent.
    #[error("account {0} is in sync scope but has no crypto address")]
    AccountWithoutAddress(i64),

    #[error("store: {0}")]
    Store(#[from] DbError),

    #[error("ton: {0}")]
    Ton(#[from] TonError),

    #[error("queue: {0}")]
    Queue(#[from] QueueError),

    #[error("encode job payload: {0}")]
    EncodeJob(#[from] serde_json::Error),

    #[error("transaction timestamp {0} out of range")]
    Timestamp(u64),
}
