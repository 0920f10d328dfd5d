use anyhow::Context;
use serde::Deserialize;
use tonsync_storage::DbConfig;
use tonsync_syncer::SyncerConfig;

#[derive(Debug, Deserialize)]
struct AppConfig {
    #[serde(default)]
    app_debug: bool,
}

/// Full daemon configuration, assembled from the environment.
#[derive(Debug)]
pub(crate) struct Config {
    pub app_debug: bool,
    pub db: DbConfig,
    pub syncer: SyncerConfig,
}

impl Config {
    pub(crate) fn from_env() -> anyhow::Result<Self> {
        let app: AppConfig = envy::from_env().context("app settings")?;
        let db: DbConfig = envy::prefixed("DB_")
            .from_env()
            .context("database settings")?;
        let syncer: SyncerConfig = envy::prefixed("SYNCER_")
            .from_env()
            .context("syncer settings")?;

        Ok(Self {
            app_debug: app.app_debug,
            db,
            syncer,
        })
    }
}
