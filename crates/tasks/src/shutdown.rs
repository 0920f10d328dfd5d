use tokio::sync::watch;

/// Broadcast side of the process-wide shutdown flag.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    tx: watch::Sender<bool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Flips the flag. Idempotent; every guard observes it.
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }

    pub fn subscribe(&self) -> ShutdownGuard {
        ShutdownGuard {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Receive side handed to tasks. Cheap to clone; every await point that
/// must be interruptible selects on [`ShutdownGuard::wait`].
#[derive(Debug, Clone)]
pub struct ShutdownGuard {
    rx: watch::Receiver<bool>,
}

impl ShutdownGuard {
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown is triggered. A dropped sender counts as
    /// shutdown so orphaned tasks cannot hang forever.
    pub async fn wait(&mut self) {
        let _ = self.rx.wait_for(|triggered| *triggered).await;
    }
}
