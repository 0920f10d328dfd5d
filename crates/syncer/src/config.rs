use std::time::Duration;

use serde::Deserialize;

/// Syncer tuning, loaded from `SYNCER_`-prefixed environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncerConfig {
    /// How many actualizers and updaters to spawn.
    #[serde(default = "default_worker_pool_size")]
    pub worker_pool_size: usize,

    /// How long one actualizer waits between account lookups.
    #[serde(with = "humantime_serde", default = "default_accounts_check_interval")]
    pub accounts_check_interval: Duration,

    /// Startup delay before an actualizer begins ticking.
    #[serde(with = "humantime_serde", default = "default_actualizer_start_delay")]
    pub actualizer_start_delay: Duration,

    /// How frequently each account must be brought up to date.
    #[serde(with = "humantime_serde", default = "default_account_sync_interval")]
    pub account_sync_interval: Duration,

    /// How long a claim on an account stays exclusive before other workers
    /// may take it over.
    #[serde(with = "humantime_serde", default = "default_updater_lock_timeout")]
    pub updater_lock_timeout: Duration,

    /// Asset attached to every inserted ledger row.
    #[serde(default)]
    pub updater_asset_id: i64,
}

fn default_worker_pool_size() -> usize {
    1
}

fn default_accounts_check_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_actualizer_start_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_account_sync_interval() -> Duration {
    Duration::from_secs(600)
}

fn default_updater_lock_timeout() -> Duration {
    Duration::from_secs(10)
}
