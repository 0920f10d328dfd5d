//! Domain types shared between the storage layer and the sync pipeline.

mod types;

pub use types::{Account, LedgerTransaction};
