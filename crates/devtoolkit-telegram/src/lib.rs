//! Dev Toolkit Telegram Adapter
//!
//! Bot API long polling with a persisted update offset, ordered outbound
//! delivery with a plain-text fallback for rejected Markdown, and message
//! splitting at the Telegram size limit

pub mod menu;

use anyhow::{anyhow, Result};
use devtoolkit_config::{telegram_account_tag, TelegramConfig};
use devtoolkit_ipc::{Envelope, EventBus, MessageKind, OutboundMessage, OutboundSink, TextFormat};
use reqwest::{Client, ClientBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};

pub const CHANNEL: &str = "telegram";
/// Hard limit on `sendMessage` text, in characters.
const MESSAGE_LIMIT: usize = 4096;
const POLL_RETRY_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<IncomingMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub message_id: i64,
    pub text: Option<String>,
    pub chat: Chat,
    pub from: Option<Sender>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sender {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub username: Option<String>,
}

/// Bot API response wrapper. Failed calls carry `description` instead of
/// `result`.
#[derive(Debug, Deserialize)]
struct ApiReply<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("telegram {method} request failed: {source}")]
    Transport {
        method: &'static str,
        #[source]
        source: reqwest::Error,
    },
    /// Telegram answered and refused the call.
    #[error("telegram {method} rejected: {description}")]
    Rejected {
        method: &'static str,
        description: String,
    },
}

pub struct TelegramAdapter {
    client: Client,
    api_base: String,
    account_tag: String,
    allowed_chats: Option<HashSet<i64>>,
    data_dir: PathBuf,
    poll_timeout_secs: u64,
    client_recreate_interval: Duration,
    event_bus: Option<EventBus>,
}

impl TelegramAdapter {
    pub fn new(config: &TelegramConfig, data_dir: PathBuf) -> Result<Self> {
        Ok(Self {
            client: Self::build_client()?,
            api_base: format!("https://api.telegram.org/bot{}", config.bot_token),
            account_tag: telegram_account_tag(&config.bot_token),
            allowed_chats: config
                .allowed_chats
                .as_ref()
                .map(|chats| chats.iter().copied().collect()),
            data_dir,
            poll_timeout_secs: config.poll_timeout_secs.unwrap_or(60),
            client_recreate_interval: Duration::from_secs(
                config.client_recreate_interval_secs.unwrap_or(60),
            ),
            event_bus: None,
        })
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    fn build_client() -> Result<Client> {
        // Long polls hold the connection for `poll_timeout_secs`; the request
        // timeout must stay above it.
        ClientBuilder::new()
            .timeout(Duration::from_secs(180))
            .connect_timeout(Duration::from_secs(30))
            .tcp_keepalive(Some(Duration::from_secs(30)))
            .pool_idle_timeout(Duration::from_secs(600))
            .build()
            .map_err(|e| anyhow!("failed to build Telegram HTTP client: {}", e))
    }

    /// Calls a Bot API method and returns its `result`.
    async fn call<T: DeserializeOwned>(
        client: &Client,
        api_base: &str,
        method: &'static str,
        payload: &Value,
    ) -> std::result::Result<T, ApiError> {
        let transport = |source: reqwest::Error| ApiError::Transport {
            method,
            source: source.without_url(),
        };

        let response = client
            .post(format!("{}/{}", api_base, method))
            .json(payload)
            .send()
            .await
            .map_err(transport)?;
        let status = response.status();
        let reply: ApiReply<T> = response.json().await.map_err(transport)?;

        match reply {
            ApiReply {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiReply { description, .. } => Err(ApiError::Rejected {
                method,
                description: description.unwrap_or_else(|| format!("HTTP {}", status)),
            }),
        }
    }

    fn offset_file(&self) -> PathBuf {
        self.data_dir
            .join("runtime")
            .join(format!("telegram.{}.offset", self.account_tag))
    }

    async fn load_offset(&self) -> Option<i64> {
        let content = fs::read_to_string(self.offset_file()).await.ok()?;
        content.trim().parse().ok()
    }

    async fn store_offset(&self, offset: i64) {
        let path = self.offset_file();
        if let Some(dir) = path.parent() {
            if let Err(e) = fs::create_dir_all(dir).await {
                warn!("Failed to create {}: {}", dir.display(), e);
                return;
            }
        }
        if let Err(e) = fs::write(&path, format!("{}\n", offset)).await {
            warn!("Failed to persist Telegram offset to {}: {}", path.display(), e);
        }
    }

    fn is_chat_allowed(&self, chat_id: i64) -> bool {
        match &self.allowed_chats {
            Some(allowed) => allowed.contains(&chat_id),
            None => true,
        }
    }

    pub async fn get_updates(&self, client: &Client, offset: Option<i64>) -> Result<Vec<Update>> {
        let mut payload = json!({
            "timeout": self.poll_timeout_secs,
            "allowed_updates": ["message"],
        });
        if let Some(offset) = offset {
            payload["offset"] = json!(offset);
        }

        Ok(Self::call(client, &self.api_base, "getUpdates", &payload).await?)
    }

    /// Sends `text`, split at the Telegram size limit. Parts go out one after
    /// another and the first failure aborts the rest. Only the first part
    /// carries `reply_to`.
    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_to: Option<i64>,
        format: TextFormat,
    ) -> Result<()> {
        for (i, part) in split_message(text, MESSAGE_LIMIT).into_iter().enumerate() {
            let mut payload = json!({ "chat_id": chat_id, "text": part });
            if format == TextFormat::Markdown {
                payload["parse_mode"] = json!("Markdown");
            }
            if let (0, Some(message_id)) = (i, reply_to) {
                payload["reply_to_message_id"] = json!(message_id);
            }
            self.deliver(payload).await?;
        }
        Ok(())
    }

    /// Posts one `sendMessage` payload. When Telegram refuses it, the payload
    /// is relaxed (reply target dropped, then Markdown dropped) and resent
    /// until nothing is left to relax.
    async fn deliver(&self, mut payload: Value) -> Result<()> {
        loop {
            let description =
                match Self::call::<Value>(&self.client, &self.api_base, "sendMessage", &payload)
                    .await
                {
                    Ok(_) => return Ok(()),
                    Err(ApiError::Rejected { description, .. }) => description,
                    Err(e) => return Err(e.into()),
                };

            match relax_payload(&mut payload, &description) {
                Some(dropped) => warn!(
                    "telegram sendMessage rejected ({}), resending without {}",
                    description, dropped
                ),
                None => return Err(anyhow!("telegram sendMessage rejected: {}", description)),
            }
        }
    }

    pub async fn send_chat_action(&self, chat_id: i64, action: &str) -> Result<()> {
        let payload = json!({ "chat_id": chat_id, "action": action });
        Self::call::<Value>(&self.client, &self.api_base, "sendChatAction", &payload).await?;
        Ok(())
    }

    async fn register_commands(&self, client: &Client) -> Result<()> {
        let commands: Vec<Value> = menu::BOT_COMMANDS
            .iter()
            .map(|(command, description)| json!({ "command": command, "description": description }))
            .collect();
        Self::call::<Value>(
            client,
            &self.api_base,
            "setMyCommands",
            &json!({ "commands": commands }),
        )
        .await?;
        Ok(())
    }

    /// Long-polls forever. The HTTP client is rebuilt periodically so a
    /// half-dead pooled connection cannot stall polling.
    pub async fn poll(&self) -> Result<()> {
        let mut offset = self.load_offset().await;
        info!(offset = ?offset, account = %self.account_tag, "Telegram polling started");

        let mut client = self.client.clone();
        let mut rebuild_at = Instant::now() + self.client_recreate_interval;

        match self.register_commands(&client).await {
            Ok(()) => info!("Telegram bot commands registered"),
            Err(e) => warn!("Failed to register Telegram bot commands: {}", e),
        }

        loop {
            if Instant::now() >= rebuild_at {
                debug!("Rebuilding Telegram HTTP client");
                match Self::build_client() {
                    Ok(fresh) => client = fresh,
                    Err(e) => warn!("Keeping previous HTTP client: {}", e),
                }
                rebuild_at = Instant::now() + self.client_recreate_interval;
            }

            let updates = match self.get_updates(&client, offset).await {
                Ok(updates) => updates,
                Err(e) => {
                    warn!("Telegram polling error: {}", e);
                    tokio::time::sleep(POLL_RETRY_DELAY).await;
                    continue;
                }
            };

            for update in updates {
                let next = update.update_id + 1;
                offset = Some(next);
                self.store_offset(next).await;

                if let Some(message) = &update.message {
                    self.forward(message);
                }
            }
        }
    }

    fn forward(&self, message: &IncomingMessage) {
        let chat_id = message.chat.id;
        if !self.is_chat_allowed(chat_id) {
            info!(chat_id, "Skipping message from chat outside allowed_chats");
            return;
        }

        let Some(envelope) = envelope_for(message) else {
            debug!(chat_id, "Ignoring non-text Telegram message");
            return;
        };

        info!(
            chat_id,
            user_id = envelope.user_id,
            trace_id = %envelope.trace_id,
            username = message.from.as_ref().and_then(|u| u.username.as_deref()).unwrap_or("-"),
            "Telegram message received"
        );

        match &self.event_bus {
            Some(bus) => {
                if let Err(e) = bus.publish(envelope) {
                    warn!("Failed to publish Telegram message: {}", e);
                }
            }
            None => debug!("No event bus attached, dropping message"),
        }
    }
}

/// Text messages from people become envelopes; everything else is dropped.
fn envelope_for(message: &IncomingMessage) -> Option<Envelope> {
    let text = message.text.as_deref()?;
    let from = message.from.as_ref().filter(|from| !from.is_bot)?;

    Some(
        Envelope::new(CHANNEL, MessageKind::from_text(text), from.id, message.chat.id)
            .with_message_id(message.message_id),
    )
}

/// Removes the payload field named by a rejection. Returns the name of the
/// dropped field, or `None` when the rejection is not about the payload.
fn relax_payload(payload: &mut Value, description: &str) -> Option<&'static str> {
    let fields = payload.as_object_mut()?;
    let description = description.to_ascii_lowercase();

    if description.contains("message to be replied not found")
        && fields.remove("reply_to_message_id").is_some()
    {
        return Some("reply_to_message_id");
    }
    if description.contains("can't parse entities") && fields.remove("parse_mode").is_some() {
        return Some("parse_mode");
    }
    None
}

/// Splits `text` into parts of at most `limit` characters, preferring to cut
/// right after a newline. Parts concatenate back to `text`.
fn split_message(text: &str, limit: usize) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut rest = text;

    loop {
        let hard_cut = match rest.char_indices().nth(limit) {
            Some((idx, _)) => idx,
            None => {
                parts.push(rest);
                return parts;
            }
        };
        let cut = rest[..hard_cut]
            .rfind('\n')
            .map(|idx| idx + 1)
            .unwrap_or(hard_cut);
        let (head, tail) = rest.split_at(cut);
        parts.push(head);
        rest = tail;
        if rest.is_empty() {
            return parts;
        }
    }
}

#[async_trait::async_trait]
impl OutboundSink for TelegramAdapter {
    async fn send(&self, message: OutboundMessage) -> Result<()> {
        if message.channel != CHANNEL {
            return Err(anyhow!(
                "telegram adapter cannot deliver to channel '{}'",
                message.channel
            ));
        }
        self.send_message(message.chat_id, &message.text, message.reply_to, message.format)
            .await
    }

    async fn send_chat_action(&self, chat_id: i64, action: &str) -> Result<()> {
        TelegramAdapter::send_chat_action(self, chat_id, action).await
    }
}
