//! The message bus: every channel funnels inbound traffic into one bounded
//! queue consumed by a single worker, which serializes agent invocations
//! and with them all session writes.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::agent::Agent;

const QUEUE_CAPACITY: usize = 100;

/// A message arriving from any channel, normalized for the agent.
pub struct InboundMessage {
    /// Originating channel name, e.g. "telegram", "cli".
    pub channel: String,
    /// Channel-specific routing id for the reply.
    pub chat_id: String,
    pub content: String,
    pub session_key: String,
    /// Reply sink; every text the agent surfaces is pushed here, and the
    /// sink is dropped when the turn completes so receivers see the end.
    pub reply: mpsc::UnboundedSender<String>,
}

/// Cloneable producer half handed to channels.
#[derive(Clone)]
pub struct BusHandle {
    tx: mpsc::Sender<InboundMessage>,
}

impl BusHandle {
    /// Enqueue a message. Applies backpressure when the queue is full and
    /// fails only once the bus has shut down.
    pub async fn send(&self, msg: InboundMessage) -> bool {
        self.tx.send(msg).await.is_ok()
    }
}

pub struct MessageBus {
    rx: mpsc::Receiver<InboundMessage>,
    handle: BusHandle,
    agent: Arc<Agent>,
}

impl MessageBus {
    pub fn new(agent: Arc<Agent>) -> Self {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        Self {
            rx,
            handle: BusHandle { tx },
            agent,
        }
    }

    pub fn handle(&self) -> BusHandle {
        self.handle.clone()
    }

    /// A handle with no live consumer; `send` always reports failure.
    /// Useful for wiring adapters in tests.
    pub fn new_detached_handle() -> BusHandle {
        let (tx, _rx) = mpsc::channel(1);
        BusHandle { tx }
    }

    /// Spawn the single consumer worker. Messages are processed strictly
    /// one at a time in arrival order; the worker exits when the token
    /// fires or every producer handle is gone.
    pub fn start(self, cancel: CancellationToken) -> JoinHandle<()> {
        let MessageBus { mut rx, agent, handle } = self;
        drop(handle);

        tokio::spawn(async move {
            info!("message bus started");
            loop {
                let msg = tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("message bus shutting down");
                        return;
                    }
                    msg = rx.recv() => match msg {
                        Some(m) => m,
                        None => return,
                    },
                };

                let reply = msg.reply.clone();
                let result = agent
                    .run(&cancel, &msg.session_key, &msg.content, |text| {
                        let _ = reply.send(text.to_string());
                    })
                    .await;

                if let Err(e) = result {
                    error!(session = %msg.session_key, channel = %msg.channel, error = %e, "agent run failed");
                    let _ = msg.reply.send(format!("Agent encountered an error: {e}"));
                }
                // msg (and with it the reply sender) drops here, closing
                // the sink so the channel side stops waiting.
            }
        })
    }
}
