use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::models::RemoteGame;

use super::GameStore;

/// Message shown once every retry has failed.
pub const FETCH_FAILED_MESSAGE: &str =
    "Could not load games from the server. Check your internet connection.";

/// Fixed backoff schedule; one retry per delay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    delays: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_millis(&[1000, 2000, 4000])
    }
}

impl RetryPolicy {
    /// Build a schedule from millisecond delays.
    pub fn from_millis(delays: &[u64]) -> Self {
        Self {
            delays: delays.iter().copied().map(Duration::from_millis).collect(),
        }
    }

    /// Number of retries after the first attempt.
    pub fn max_retries(&self) -> usize {
        self.delays.len()
    }

    /// Delay before retry number `retry` (zero-based), or `None` once exhausted.
    pub fn delay_for(&self, retry: usize) -> Option<Duration> {
        self.delays.get(retry).copied()
    }
}

/// Events emitted by the remote synchroniser.
#[derive(Debug)]
pub enum SyncEvent {
    /// An attempt is starting; `retry` is zero for the first one.
    Started {
        /// Retries already performed.
        retry: usize,
        /// Retries allowed by the policy.
        max_retries: usize,
    },
    /// The list was fetched.
    Loaded(Vec<RemoteGame>),
    /// Every attempt failed.
    Failed {
        /// User-facing message.
        message: String,
        /// Attempts made, including the first.
        attempts: usize,
    },
    /// A manual refresh succeeded.
    Refreshed(Vec<RemoteGame>),
    /// A manual refresh failed; existing state stays as it is.
    RefreshFailed(String),
}

/// Fetches the remote game list with capped retries.
pub struct RemoteSync<S> {
    store: Arc<S>,
    policy: RetryPolicy,
}

impl<S> Clone for RemoteSync<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            policy: self.policy.clone(),
        }
    }
}

impl<S: GameStore> RemoteSync<S> {
    /// Create a synchroniser over `store`.
    pub fn new(store: Arc<S>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Fetch with retries, reporting progress on `sender`.
    ///
    /// Stops early with an error if the receiving side has gone away.
    pub async fn run(self, sender: mpsc::Sender<SyncEvent>) -> Result<()> {
        let max_retries = self.policy.max_retries();
        let mut retry = 0;
        loop {
            sender
                .send(SyncEvent::Started { retry, max_retries })
                .await
                .context("failed to send sync start event")?;

            match self.store.list_games().await {
                Ok(games) => {
                    info!(count = games.len(), retry, "Remote sync succeeded");
                    sender
                        .send(SyncEvent::Loaded(games))
                        .await
                        .context("failed to send sync success event")?;
                    return Ok(());
                }
                Err(err) => {
                    warn!(attempt = retry + 1, %err, "Remote fetch failed");
                    let Some(delay) = self.policy.delay_for(retry) else {
                        sender
                            .send(SyncEvent::Failed {
                                message: FETCH_FAILED_MESSAGE.to_string(),
                                attempts: retry + 1,
                            })
                            .await
                            .context("failed to send sync failure event")?;
                        return Ok(());
                    };
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
            }
        }
    }

    /// Single fetch without retries.
    pub async fn refresh(self, sender: mpsc::Sender<SyncEvent>) -> Result<()> {
        let event = match self.store.list_games().await {
            Ok(games) => SyncEvent::Refreshed(games),
            Err(err) => {
                warn!(%err, "Manual refresh failed");
                SyncEvent::RefreshFailed(err.to_string())
            }
        };
        sender
            .send(event)
            .await
            .context("failed to send refresh event")
    }
}
