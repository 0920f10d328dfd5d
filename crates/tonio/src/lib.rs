//! TON RPC layer: typed chain models, an HTTP JSON-RPC client, global
//! config node discovery and the endpoint pool the sync workers share.

pub mod address;
pub mod client;
pub mod config;
pub mod errors;
pub mod pool;
pub mod traits;
pub mod types;

pub use address::TonAddress;
pub use client::HttpTonClient;
pub use config::{fetch_global_config, find_archive_node, GlobalConfig, GLOBAL_CONFIG_URL};
pub use errors::TonError;
pub use pool::TonPool;
pub use traits::{TonClient, TonProvider};
pub use types::{AccountState, BlockId, MsgKind, TonAccount, TonMessage, TonTransaction};
