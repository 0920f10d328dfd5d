use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// A user-owned account row as seen by the sync pipeline.
///
/// Most columns are owned by other services; the pipeline only ever writes
/// the two sync-time columns, and those are managed inside the store rather
/// than through this struct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub main_asset_id: i64,
    /// On-chain address in friendly form. Accounts without one cannot be
    /// synced even when they are in scope.
    pub crypto_address: Option<String>,
    /// Present iff the account participates in chain sync at all.
    pub crypto_blockchain_id: Option<i64>,
}

/// One normalized ledger row derived from an on-chain transaction.
///
/// A single chain transaction may produce two of these: a principal row for
/// the transferred value and a fee row carrying the negated total fees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerTransaction {
    pub account_id: i64,
    pub asset_id: i64,
    pub category_id: i64,
    pub merchant: String,
    pub amount: Decimal,
    pub comment: String,
    pub crypto_hash: Option<String>,
    pub crypto_ton_lt: Option<u64>,
    pub effective_at: DateTime<Utc>,
}
