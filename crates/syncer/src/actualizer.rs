use std::sync::Arc;

use chrono::Utc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tonsync_queue::Enqueuer;
use tonsync_storage::SyncStore;
use tonsync_tasks::ShutdownGuard;
use tonsync_tonio::{TonAddress, TonClient, TonProvider};
use tracing::*;

use crate::{encode_tx_hash, errors::SyncError, Syncer};

impl<S, P, Q> Syncer<S, P, Q>
where
    S: SyncStore + 'static,
    P: TonProvider,
    Q: Enqueuer + 'static,
{
    /// Periodically claims the account most overdue for a sync and, when
    /// the chain has transactions we have not stored yet, submits an
    /// update job for it. Iteration failures are logged and the loop keeps
    /// going; only shutdown stops it.
    pub(crate) async fn actualizer(self: Arc<Self>, idx: usize, mut shutdown: ShutdownGuard) {
        tokio::select! {
            _ = tokio::time::sleep(self.cfg.actualizer_start_delay) => {}
            _ = shutdown.wait() => return,
        }

        let period = self.cfg.accounts_check_interval;
        let mut tick = interval_at(Instant::now() + period, period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(worker = idx, "actualizer started");

        loop {
            tokio::select! {
                _ = tick.tick() => {}
                _ = shutdown.wait() => break,
            }

            if let Err(err) = self.iteration().await {
                error!(worker = idx, %err, "actualizer iteration failed");
            }
        }

        debug!(worker = idx, "actualizer stopped");
    }

    pub(crate) async fn iteration(&self) -> Result<(), SyncError> {
        let now = Utc::now();
        let stale_before = now - self.lock_timeout;
        let completed_before = now - self.sync_interval;

        let Some(account) = self
            .store
            .claim_next_account(now, stale_before, completed_before)
            .await?
        else {
            debug!("no account due for sync, all up to date or claimed");
            return Ok(());
        };

        let Some(addr_str) = account.crypto_address.as_deref() else {
            return Err(SyncError::AccountWithoutAddress(account.id));
        };
        let addr: TonAddress = addr_str.parse()?;

        let ton = self.ton.client();
        let tip = ton.get_masterchain_info().await?;
        let chain_account = ton.get_account(&tip, &addr).await?;

        // never-deployed addresses stay claimed; the stale-lease rule
        // brings them back around later
        let Some(state) = chain_account.state else {
            debug!(address = %addr, "chain account exists but is not initialized");
            return Ok(());
        };

        let last_tx_hash = encode_tx_hash(&chain_account.last_tx_hash);
        if self
            .store
            .transaction_exists(account.id, &last_tx_hash)
            .await?
        {
            debug!(
                account_id = account.id,
                tx_hash = %last_tx_hash,
                "account is already up to date"
            );
            if let Err(err) = self
                .store
                .mark_account_completed(account.id, Utc::now())
                .await
            {
                error!(
                    account_id = account.id,
                    %err,
                    "failed to stamp end-sync time on an up-to-date account"
                );
            }
            return Ok(());
        }

        self.enqueue_update(
            &state.address.to_string(),
            account.id,
            &chain_account.last_tx_hash,
            chain_account.last_tx_lt,
        )
        .await?;

        Ok(())
    }
}
