use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Context};
use tonsync_common::logging::{self, LoggerConfig};
use tonsync_queue::QueueClient;
use tonsync_storage::PgStore;
use tonsync_syncer::Syncer;
use tonsync_tasks::TaskManager;
use tonsync_tonio::{self as tonio, TonPool, GLOBAL_CONFIG_URL};
use tracing::*;

mod config;

use config::Config;

const SHUTDOWN_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

fn main() -> anyhow::Result<()> {
    if let Err(e) = main_inner() {
        eprintln!("FATAL ERROR: {e:#}");
        return Err(e);
    }

    Ok(())
}

fn main_inner() -> anyhow::Result<()> {
    // a local .env is a convenience, not a requirement
    let _ = dotenvy::dotenv();

    let config = Config::from_env().context("parse configuration")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("tonsync-rt")
        .build()
        .expect("init: build rt");

    runtime.block_on(run(config))
}

async fn run(config: Config) -> anyhow::Result<()> {
    let _log_stream = logging::init(LoggerConfig::new("tonsyncd".to_string(), config.app_debug));

    let pool = tonsync_storage::connect(&config.db)
        .await
        .context("connect to database")?;
    tonsync_storage::run_migrations(&pool, &config.db.migrations_path)
        .await
        .context("run migrations")?;
    let store = Arc::new(PgStore::new(pool.clone()));

    let ton_config = tonio::fetch_global_config(GLOBAL_CONFIG_URL)
        .await
        .context("fetch ton global config")?;
    let node = tonio::find_archive_node(&ton_config)
        .await
        .ok_or_else(|| anyhow!("no archive-capable ton node found"))?;
    info!(endpoint = %node.endpoint(), "selected ton node");
    let ton = Arc::new(TonPool::new(vec![node]).context("build ton pool")?);

    let queue = QueueClient::new(pool);
    let syncer = Arc::new(Syncer::new(
        store,
        ton,
        Arc::new(queue.clone()),
        config.syncer,
    ));

    let task_manager = TaskManager::new();
    let executor = task_manager.executor();
    executor.spawn_supervised("syncer", move |guard| {
        let syncer = syncer.clone();
        let queue = queue.clone();
        async move { syncer.run(&queue, guard).await }
    });

    task_manager.wait_for_shutdown().await;
    info!("syncer has been stopped");
    task_manager.drain(SHUTDOWN_DRAIN_TIMEOUT).await;

    Ok(())
}
