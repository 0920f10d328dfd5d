use std::{
    future::Future,
    sync::{Arc, Mutex},
    time::Duration,
};

use tokio::task::JoinHandle;
use tracing::*;

use crate::shutdown::{ShutdownGuard, ShutdownSignal};

/// Cool-down before a panicked task is spawned again.
const RESPAWN_DELAY: Duration = Duration::from_secs(60);

/// Owns the shutdown signal and the handles of all supervised tasks.
pub struct TaskManager {
    shutdown: ShutdownSignal,
    tasks: Arc<Mutex<Vec<(String, JoinHandle<()>)>>>,
}

impl TaskManager {
    pub fn new() -> Self {
        Self {
            shutdown: ShutdownSignal::new(),
            tasks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn executor(&self) -> TaskExecutor {
        TaskExecutor {
            shutdown: self.shutdown.clone(),
            tasks: self.tasks.clone(),
        }
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Blocks until an OS termination signal arrives or some task triggers
    /// shutdown, then makes sure the flag is set for everyone.
    pub async fn wait_for_shutdown(&self) {
        let mut guard = self.shutdown.subscribe();
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("interrupt received"),
            _ = terminate_signal() => info!("SIGTERM received"),
            _ = guard.wait() => {}
        }
        self.shutdown.trigger();
    }

    /// Waits up to `timeout` for supervised tasks to drain, then aborts the
    /// stragglers.
    pub async fn drain(self, timeout: Duration) {
        let tasks = std::mem::take(&mut *self.tasks.lock().expect("tasks lock"));
        for (name, handle) in tasks {
            let abort = handle.abort_handle();
            if tokio::time::timeout(timeout, handle).await.is_err() {
                warn!(task = %name, "task did not stop in time, aborting");
                abort.abort();
            }
        }
    }
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
async fn terminate_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
    term.recv().await;
}

#[cfg(not(unix))]
async fn terminate_signal() {
    std::future::pending::<()>().await
}

/// Handle for spawning supervised tasks.
#[derive(Clone)]
pub struct TaskExecutor {
    shutdown: ShutdownSignal,
    tasks: Arc<Mutex<Vec<(String, JoinHandle<()>)>>>,
}

impl TaskExecutor {
    pub fn shutdown_guard(&self) -> ShutdownGuard {
        self.shutdown.subscribe()
    }

    /// Spawns a task that is restarted after a cool-down whenever it
    /// panics. A normal return, `Ok` or `Err`, is treated as terminal and
    /// triggers process shutdown so the sibling pools drain too.
    ///
    /// The factory is invoked once per (re)spawn with a fresh guard.
    pub fn spawn_supervised<F, Fut>(&self, name: &str, factory: F)
    where
        F: Fn(ShutdownGuard) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let name = name.to_string();
        let shutdown = self.shutdown.clone();
        let handle = tokio::spawn(supervise(name.clone(), factory, shutdown));
        self.tasks.lock().expect("tasks lock").push((name, handle));
    }
}

async fn supervise<F, Fut>(name: String, factory: F, shutdown: ShutdownSignal)
where
    F: Fn(ShutdownGuard) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    let mut guard = shutdown.subscribe();
    loop {
        if guard.is_triggered() {
            break;
        }

        let task = tokio::spawn(factory(shutdown.subscribe()));
        match task.await {
            Ok(Ok(())) => {
                info!(task = %name, "task finished, shutting down");
                shutdown.trigger();
                break;
            }
            Ok(Err(err)) => {
                error!(task = %name, %err, "task failed, shutting down");
                shutdown.trigger();
                break;
            }
            Err(join_err) if join_err.is_panic() => {
                error!(task = %name, err = %join_err, "task panicked, respawning after cool-down");
                tokio::select! {
                    _ = tokio::time::sleep(RESPAWN_DELAY) => {}
                    _ = guard.wait() => break,
                }
            }
            Err(_) => break,
        }
    }
}
