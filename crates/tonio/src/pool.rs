use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use crate::{client::HttpTonClient, errors::TonError, traits::TonProvider};

/// Shared set of node endpoints.
///
/// Each vended handle is bound to one endpoint, so holding on to a handle
/// pins the session; handing it back and asking again may rotate.
#[derive(Debug)]
pub struct TonPool {
    clients: Vec<Arc<HttpTonClient>>,
    next: AtomicUsize,
}

impl TonPool {
    pub fn new(clients: Vec<HttpTonClient>) -> Result<Self, TonError> {
        if clients.is_empty() {
            return Err(TonError::NoEndpoints);
        }

        Ok(Self {
            clients: clients.into_iter().map(Arc::new).collect(),
            next: AtomicUsize::new(0),
        })
    }

    fn rotate(&self) -> Arc<HttpTonClient> {
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.clients.len();
        self.clients[idx].clone()
    }
}

impl TonProvider for TonPool {
    type Client = HttpTonClient;

    fn client(&self) -> Arc<HttpTonClient> {
        self.rotate()
    }

    fn pinned(&self) -> Arc<HttpTonClient> {
        self.rotate()
    }
}
