use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    address::TonAddress,
    errors::TonError,
    types::{BlockId, TonAccount, TonTransaction},
};

/// Read operations the sync pipeline performs against a TON node.
#[async_trait]
pub trait TonClient: Send + Sync + 'static {
    /// The most recently finalized masterchain block.
    async fn get_masterchain_info(&self) -> Result<BlockId, TonError>;

    /// Account snapshot anchored at the given block.
    async fn get_account(
        &self,
        block: &BlockId,
        addr: &TonAddress,
    ) -> Result<TonAccount, TonError>;

    /// Up to `limit` transactions ending at `(lt, hash)`, newest first.
    async fn list_transactions(
        &self,
        addr: &TonAddress,
        limit: u32,
        lt: u64,
        hash: &[u8],
    ) -> Result<Vec<TonTransaction>, TonError>;
}

/// Vends client handles from a shared set of endpoints.
///
/// `client` may rotate between backends; `pinned` returns a handle whose
/// calls all hit one backend, which paginating callers hold for the whole
/// walk so the `(lt, hash)` cursor sees a consistent history.
pub trait TonProvider: Send + Sync + 'static {
    type Client: TonClient;

    fn client(&self) -> Arc<Self::Client>;

    fn pinned(&self) -> Arc<Self::Client>;
}
