//! Periodic removal of expired authorization codes.
//!
//! The token endpoint already rejects expired codes, so the sweep only
//! bounds table growth.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::{clock::Clock, repos::OAuthRepo};

pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Delete every expired code once. Returns the number of rows removed.
pub async fn sweep_expired_codes(repo: &dyn OAuthRepo, clock: &dyn Clock) -> anyhow::Result<usize> {
    let removed = repo.delete_expired_codes(clock.unix_now()).await?;
    if removed > 0 {
        tracing::info!(removed, "cleaned up expired authorization codes");
    }
    Ok(removed)
}

/// Owned handle to the background sweep task.
pub struct CodeSweeper {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl CodeSweeper {
    /// Spawn the sweep loop on the current runtime. The first pass runs after
    /// one full `interval`.
    pub fn start(repo: Arc<dyn OAuthRepo>, clock: Arc<dyn Clock>, interval: Duration) -> Self {
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = sweep_expired_codes(repo.as_ref(), clock.as_ref()).await {
                            tracing::error!(error = ?e, "failed to clean up expired authorization codes");
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!("authorization code sweeper stopped");
        });
        tracing::debug!(interval_secs = interval.as_secs(), "authorization code sweeper started");
        Self { shutdown, handle }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Signal the loop and wait for it to exit. A pass already in flight is
    /// allowed to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            tracing::warn!(error = ?e, "authorization code sweeper ended abnormally");
        }
    }
}
