use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{
    migrate::Migrator,
    postgres::{PgPool, PgPoolOptions, PgRow},
    QueryBuilder, Row,
};
use tonsync_primitives::{Account, LedgerTransaction};
use tracing::*;

use crate::{errors::DbError, traits::SyncStore};

pub const PG_MAX_CONNS: u32 = 500;

#[derive(Debug, Clone, Deserialize)]
pub struct DbConfig {
    pub url: String,
    #[serde(default = "default_migrations_path")]
    pub migrations_path: String,
}

fn default_migrations_path() -> String {
    "file://./migrations".to_string()
}

pub async fn connect(cfg: &DbConfig) -> Result<PgPool, DbError> {
    let pool = PgPoolOptions::new()
        .max_connections(PG_MAX_CONNS)
        .connect(&cfg.url)
        .await?;
    Ok(pool)
}

/// Applies pending migrations from the configured directory. The path may
/// carry a `file://` prefix.
pub async fn run_migrations(pool: &PgPool, migrations_path: &str) -> Result<(), DbError> {
    let path = migrations_path
        .strip_prefix("file://")
        .unwrap_or(migrations_path);
    let migrator = Migrator::new(PathBuf::from(path)).await?;
    migrator.run(pool).await?;
    Ok(())
}

/// [`SyncStore`] backed by Postgres.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// The inner select and the update run as one statement, so row locks taken
// by the select cover the write. SKIP LOCKED keeps concurrent claimers from
// queueing up on the same row; they move on to the next candidate instead.
const CLAIM_NEXT_ACCOUNT_SQL: &str = r#"
    UPDATE accounts
    SET crypto_start_sync_time = $1
    FROM (
        SELECT id FROM accounts
        WHERE crypto_blockchain_id IS NOT NULL
          AND (crypto_end_sync_time IS NULL OR crypto_end_sync_time <= $2)
          AND (crypto_start_sync_time IS NULL OR crypto_start_sync_time <= $3)
        ORDER BY crypto_start_sync_time ASC NULLS FIRST
        LIMIT 1
        FOR UPDATE SKIP LOCKED
    ) AS due
    WHERE accounts.id = due.id
    RETURNING accounts.id, accounts.user_id, accounts.name, accounts.main_asset_id,
              accounts.crypto_address, accounts.crypto_blockchain_id
"#;

#[async_trait]
impl SyncStore for PgStore {
    async fn claim_next_account(
        &self,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
        completed_before: DateTime<Utc>,
    ) -> Result<Option<Account>, DbError> {
        let row = sqlx::query(CLAIM_NEXT_ACCOUNT_SQL)
            .bind(now)
            .bind(completed_before)
            .bind(stale_before)
            .fetch_optional(&self.pool)
            .await?;

        row.map(account_from_row).transpose()
    }

    async fn mark_account_completed(
        &self,
        account_id: i64,
        at: DateTime<Utc>,
    ) -> Result<(), DbError> {
        sqlx::query("UPDATE accounts SET crypto_end_sync_time = $2 WHERE id = $1")
            .bind(account_id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn transaction_exists(
        &self,
        account_id: i64,
        crypto_hash: &str,
    ) -> Result<bool, DbError> {
        let row = sqlx::query(
            "SELECT EXISTS(SELECT 1 FROM transactions WHERE account_id = $1 AND crypto_hash = $2)",
        )
        .bind(account_id)
        .bind(crypto_hash)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get::<bool, _>(0)?)
    }

    async fn insert_transactions(&self, txs: &[LedgerTransaction]) -> Result<(), DbError> {
        if txs.is_empty() {
            return Ok(());
        }

        let mut qb: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
            "INSERT INTO transactions (account_id, asset_id, category_id, merchant, amount, \
             comment, crypto_hash, crypto_ton_lt, effective_at) ",
        );
        qb.push_values(txs, |mut b, tx| {
            b.push_bind(tx.account_id)
                .push_bind(tx.asset_id)
                .push_bind(tx.category_id)
                .push_bind(&tx.merchant)
                .push_bind(tx.amount)
                .push_bind(&tx.comment)
                .push_bind(&tx.crypto_hash)
                .push_bind(tx.crypto_ton_lt.map(|lt| lt as i64))
                .push_bind(tx.effective_at);
        });
        qb.push(" ON CONFLICT DO NOTHING");

        let result = qb.build().execute(&self.pool).await?;
        debug!(
            batch = txs.len(),
            inserted = result.rows_affected(),
            "inserted ledger rows"
        );

        Ok(())
    }
}

fn account_from_row(row: PgRow) -> Result<Account, DbError> {
    Ok(Account {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        name: row.try_get("name")?,
        main_asset_id: row.try_get("main_asset_id")?,
        crypto_address: row.try_get("crypto_address")?,
        crypto_blockchain_id: row.try_get("crypto_blockchain_id")?,
    })
}
