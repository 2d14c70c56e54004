//! Telegram adapter — long polling via the Bot API, no webhook required.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use burrow_config::TelegramConfig;
use burrow_core::{BurrowError, Result};
use burrow_runtime::{BusHandle, InboundMessage};

use crate::Channel;

/// Long-poll wait requested from the Bot API, in seconds.
const POLL_TIMEOUT_SECS: u64 = 30;
/// HTTP client timeout; must exceed the long-poll wait.
const CLIENT_TIMEOUT_SECS: u64 = 45;
/// Backoff after a failed getUpdates round.
const ERROR_BACKOFF_SECS: u64 = 5;

#[derive(Clone)]
pub struct TelegramChannel {
    token: String,
    allow_from: HashSet<String>,
    bus: BusHandle,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(config: &TelegramConfig, bus: BusHandle) -> Self {
        Self {
            token: config.bot_token.clone(),
            allow_from: config.allow_from.iter().cloned().collect(),
            bus,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(CLIENT_TIMEOUT_SECS))
                .build()
                .unwrap_or_default(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!("https://api.telegram.org/bot{}/{method}", self.token)
    }

    async fn get_updates(&self, offset: i64) -> Result<Vec<Value>> {
        let resp = self
            .client
            .get(self.api_url("getUpdates"))
            .query(&[("offset", offset.to_string()), ("timeout", POLL_TIMEOUT_SECS.to_string())])
            .send()
            .await
            .map_err(|e| BurrowError::Channel {
                channel: "telegram".into(),
                reason: format!("getUpdates request failed: {e}"),
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(BurrowError::Channel {
                channel: "telegram".into(),
                reason: format!("getUpdates returned HTTP {status}"),
            });
        }

        let body: Value = resp.json().await.map_err(|e| BurrowError::Channel {
            channel: "telegram".into(),
            reason: format!("getUpdates body unreadable: {e}"),
        })?;

        if body["ok"] != Value::Bool(true) {
            return Err(BurrowError::Channel {
                channel: "telegram".into(),
                reason: format!("getUpdates not ok: {body}"),
            });
        }

        Ok(body["result"].as_array().cloned().unwrap_or_default())
    }

    async fn send_message(&self, chat_id: &str, text: &str) -> Result<()> {
        let resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&serde_json::json!({ "chat_id": chat_id, "text": text }))
            .send()
            .await
            .map_err(|e| BurrowError::Channel {
                channel: "telegram".into(),
                reason: format!("sendMessage request failed: {e}"),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BurrowError::Channel {
                channel: "telegram".into(),
                reason: format!("sendMessage returned HTTP {status}: {body}"),
            });
        }
        Ok(())
    }

    /// Forward every reply from one agent turn back to the chat. Ends when
    /// the sink closes (turn complete) or the adapter shuts down.
    async fn forward_replies(
        &self,
        cancel: &CancellationToken,
        chat_id: String,
        mut replies: tokio::sync::mpsc::UnboundedReceiver<String>,
    ) {
        loop {
            let reply = tokio::select! {
                _ = cancel.cancelled() => return,
                reply = replies.recv() => match reply {
                    Some(r) => r,
                    None => return,
                },
            };
            if reply.is_empty() {
                continue;
            }
            if let Err(e) = self.send_message(&chat_id, &reply).await {
                error!(chat_id = %chat_id, error = %e, "failed to deliver reply");
            }
        }
    }

    async fn dispatch_update(&self, cancel: &CancellationToken, update: &Value) {
        let Some(text) = update["message"]["text"].as_str() else {
            return;
        };
        let Some(user_id) = update["message"]["from"]["id"].as_i64() else {
            return;
        };
        let Some(chat_id) = update["message"]["chat"]["id"].as_i64() else {
            return;
        };

        let user_id = user_id.to_string();
        if !self.allow_from.is_empty() && !self.allow_from.contains(&user_id) {
            warn!(user_id = %user_id, "ignored message from unauthorized user");
            return;
        }

        debug!(user_id = %user_id, text, "received telegram message");

        let chat_id = chat_id.to_string();
        let session_key = format!("telegram_{chat_id}");
        let (reply_tx, reply_rx) = tokio::sync::mpsc::unbounded_channel();

        let accepted = self
            .bus
            .send(InboundMessage {
                channel: "telegram".into(),
                chat_id: chat_id.clone(),
                content: text.to_string(),
                session_key,
                reply: reply_tx,
            })
            .await;
        if !accepted {
            warn!("bus is down; dropping telegram message");
            return;
        }

        let adapter = self.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            adapter.forward_replies(&cancel, chat_id, reply_rx).await;
        });
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn run(&self, cancel: CancellationToken) -> Result<()> {
        if self.token.is_empty() {
            return Err(BurrowError::Channel {
                channel: "telegram".into(),
                reason: "bot_token is empty".into(),
            });
        }

        info!("starting telegram channel (long polling)");

        let mut offset: i64 = 0;
        loop {
            if cancel.is_cancelled() {
                info!("telegram channel shutting down");
                return Ok(());
            }

            let updates = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("telegram channel shutting down");
                    return Ok(());
                }
                updates = self.get_updates(offset) => updates,
            };

            let updates = match updates {
                Ok(u) => u,
                Err(e) => {
                    error!(error = %e, "telegram getUpdates failed");
                    tokio::select! {
                        _ = cancel.cancelled() => return Ok(()),
                        _ = tokio::time::sleep(Duration::from_secs(ERROR_BACKOFF_SECS)) => {}
                    }
                    continue;
                }
            };

            for update in &updates {
                if let Some(update_id) = update["update_id"].as_i64() {
                    if update_id >= offset {
                        offset = update_id + 1;
                    }
                }
                self.dispatch_update(&cancel, update).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(allow: &[&str]) -> TelegramChannel {
        let config = TelegramConfig {
            enabled: true,
            bot_token: "123:abc".into(),
            allow_from: allow.iter().map(|s| s.to_string()).collect(),
        };
        // A handle whose bus was dropped; send() reports failure, which is
        // all these tests need.
        let bus = burrow_runtime::MessageBus::new_detached_handle();
        TelegramChannel::new(&config, bus)
    }

    #[test]
    fn api_urls_embed_the_token() {
        let ch = channel(&[]);
        assert_eq!(
            ch.api_url("getUpdates"),
            "https://api.telegram.org/bot123:abc/getUpdates"
        );
    }

    #[test]
    fn allow_list_is_a_set() {
        let ch = channel(&["1", "2"]);
        assert!(ch.allow_from.contains("1"));
        assert!(!ch.allow_from.contains("3"));
    }

    #[tokio::test]
    async fn empty_token_fails_fast() {
        let config = TelegramConfig::default();
        let bus = burrow_runtime::MessageBus::new_detached_handle();
        let ch = TelegramChannel::new(&config, bus);

        let err = ch.run(CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, BurrowError::Channel { .. }));
    }
}
