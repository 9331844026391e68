//! Background pruning of expired idempotency records.
//!
//! Expiry on the read path only covers keys that are retried; the sweeper
//! keeps storage bounded for keys that never come back.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::store::IdempotencyStore;

pub struct IdempotencySweeper {
    store: Arc<dyn IdempotencyStore>,
    interval: Duration,
}

impl IdempotencySweeper {
    pub fn new(store: Arc<dyn IdempotencyStore>, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// Run the sweep loop until the shutdown signal flips.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        info!("idempotency sweeper started");

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            match self.store.delete_expired(Utc::now()).await {
                Ok(0) => {}
                Ok(removed) => debug!(removed, "pruned expired idempotency records"),
                Err(error) => warn!(error = %error, "idempotency sweep failed"),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown_rx.changed() => {
                    break;
                }
            }
        }

        info!("idempotency sweeper stopped");
    }
}
