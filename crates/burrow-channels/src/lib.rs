//! # burrow-channels
//!
//! Channel adapter system. Each adapter bridges a messaging platform to
//! the Burrow runtime by feeding normalized messages into the bus and
//! forwarding agent replies back out.

pub mod telegram;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::info;

use burrow_core::{BurrowError, Result};

/// An inbound/outbound bridge to one messaging platform.
#[async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;

    /// Run the adapter until cancellation. A clean shutdown is `Ok(())`;
    /// an `Err` means the adapter cannot operate at all (for example a bad
    /// token) rather than a transient hiccup, which adapters retry
    /// internally.
    async fn run(&self, cancel: CancellationToken) -> Result<()>;
}

/// Owns the registered channels and runs them concurrently.
#[derive(Default)]
pub struct ChannelManager {
    channels: Vec<Arc<dyn Channel>>,
}

impl ChannelManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, channel: Arc<dyn Channel>) {
        self.channels.push(channel);
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Run every channel until the token fires or one of them fails hard.
    pub async fn run_all(&self, cancel: CancellationToken) -> Result<()> {
        if self.channels.is_empty() {
            return Err(BurrowError::Channel {
                channel: "manager".into(),
                reason: "no channels registered".into(),
            });
        }

        let mut tasks = JoinSet::new();
        for channel in &self.channels {
            let channel = Arc::clone(channel);
            let cancel = cancel.clone();
            tasks.spawn(async move { channel.run(cancel).await });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    cancel.cancel();
                    return Err(e);
                }
                Err(e) => {
                    cancel.cancel();
                    return Err(BurrowError::Channel {
                        channel: "manager".into(),
                        reason: format!("channel task panicked: {e}"),
                    });
                }
            }
        }

        info!("all channels stopped");
        Ok(())
    }
}
