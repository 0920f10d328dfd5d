//! Postgres persistence for the sync pipeline: the accounts sync-time
//! state machine and idempotent ledger-row inserts.

mod errors;
mod pg;
mod traits;

pub use errors::DbError;
pub use pg::{connect, run_migrations, DbConfig, PgStore, PG_MAX_CONNS};
pub use traits::SyncStore;
