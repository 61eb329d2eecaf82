//! Dev Toolkit IPC
//!
//! Event bus for adapter-to-core communication and the outbound delivery contract

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::broadcast;

static NEXT_TRACE_COUNTER: AtomicU64 = AtomicU64::new(1);

fn now_unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn generate_trace_id() -> String {
    let ts = now_unix_secs();
    let n = NEXT_TRACE_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("trace-{}-{}", ts, n)
}

fn default_schema_version() -> u16 {
    1
}

fn default_trace_id() -> String {
    generate_trace_id()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default = "default_schema_version")]
    pub schema_version: u16,
    #[serde(default = "default_trace_id")]
    pub trace_id: String,
    pub channel: String,
    pub kind: MessageKind,
    pub user_id: i64,
    pub chat_id: i64,
    pub message_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MessageKind {
    #[serde(rename = "text")]
    Text { text: String },

    /// `name` is lowercased with any `@botname` suffix removed; `args` is the
    /// trimmed remainder of the message.
    #[serde(rename = "command")]
    Command { name: String, args: String },
}

impl MessageKind {
    pub fn from_text(text: &str) -> Self {
        let Some(rest) = text.strip_prefix('/') else {
            return MessageKind::Text {
                text: text.to_string(),
            };
        };

        let (head, args) = match rest.find(char::is_whitespace) {
            Some(idx) => (&rest[..idx], rest[idx..].trim()),
            None => (rest, ""),
        };
        let name = head.split('@').next().unwrap_or(head).to_lowercase();

        MessageKind::Command {
            name,
            args: args.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextFormat {
    Plain,
    #[default]
    Markdown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub channel: String,
    pub chat_id: i64,
    pub text: String,
    pub reply_to: Option<i64>,
    pub format: TextFormat,
}

impl OutboundMessage {
    pub fn markdown(channel: &str, chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            channel: channel.to_string(),
            chat_id,
            text: text.into(),
            reply_to: None,
            format: TextFormat::Markdown,
        }
    }

    pub fn with_reply_to(mut self, message_id: Option<i64>) -> Self {
        self.reply_to = message_id;
        self
    }
}

/// Outbound delivery. Each call resolves once the transport accepted (or
/// rejected) the message, so awaiting calls one after another keeps order.
#[async_trait::async_trait]
pub trait OutboundSink: Send + Sync {
    async fn send(&self, message: OutboundMessage) -> anyhow::Result<()>;

    async fn send_chat_action(&self, _chat_id: i64, _action: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

impl Envelope {
    pub fn new(channel: &str, kind: MessageKind, user_id: i64, chat_id: i64) -> Self {
        Self {
            schema_version: default_schema_version(),
            trace_id: generate_trace_id(),
            channel: channel.to_string(),
            kind,
            user_id,
            chat_id,
            message_id: None,
        }
    }

    pub fn with_message_id(mut self, message_id: i64) -> Self {
        self.message_id = Some(message_id);
        self
    }
}

pub const EVENT_BUS_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct EventBus {
    inbound: broadcast::Sender<Envelope>,
}

impl EventBus {
    pub fn new() -> Self {
        let (inbound_tx, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        Self { inbound: inbound_tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.inbound.subscribe()
    }

    pub fn publish(&self, envelope: Envelope) -> anyhow::Result<()> {
        self.inbound.send(envelope)?;
        Ok(())
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(name: &str, args: &str) -> MessageKind {
        MessageKind::Command {
            name: name.to_string(),
            args: args.to_string(),
        }
    }

    #[test]
    fn plain_text_is_not_a_command() {
        assert_eq!(
            MessageKind::from_text("fn main() {}"),
            MessageKind::Text {
                text: "fn main() {}".to_string()
            }
        );
    }

    #[test]
    fn command_splits_name_and_args() {
        assert_eq!(MessageKind::from_text("/save  my snippet "), command("save", "my snippet"));
        assert_eq!(MessageKind::from_text("/helpme"), command("helpme", ""));
    }

    #[test]
    fn command_name_is_lowercased_and_bot_suffix_stripped() {
        assert_eq!(MessageKind::from_text("/FORMAT@DevBot Rust"), command("format", "Rust"));
    }

    #[test]
    fn command_name_ends_at_any_whitespace() {
        assert_eq!(
            MessageKind::from_text("/save\nfoo"),
            command("save", "foo")
        );
    }

    #[test]
    fn envelope_has_schema_version_and_trace_id() {
        let env = Envelope::new("test", MessageKind::from_text("hello"), 1, 2);
        assert_eq!(env.schema_version, 1);
        assert!(env.trace_id.starts_with("trace-"));
    }

    #[test]
    fn trace_id_different_for_each_envelope() {
        let env1 = Envelope::new("test", MessageKind::from_text("a"), 1, 1);
        let env2 = Envelope::new("test", MessageKind::from_text("a"), 1, 1);
        assert_ne!(env1.trace_id, env2.trace_id);
    }

    #[test]
    fn deserialize_without_optional_fields_gets_defaults() {
        let json = r#"{
            "channel": "telegram",
            "kind": {"type": "command", "name": "list", "args": ""},
            "user_id": 5,
            "chat_id": 6,
            "message_id": null
        }"#;
        let env: Envelope = serde_json::from_str(json).expect("deserialize");
        assert_eq!(env.schema_version, 1);
        assert!(env.trace_id.starts_with("trace-"));
        assert_eq!(env.kind, command("list", ""));
    }

    #[tokio::test]
    async fn event_bus_delivers_to_subscriber() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.publish(Envelope::new("telegram", MessageKind::from_text("x"), 1, 1).with_message_id(9))
            .expect("publish");
        let received = rx.recv().await.expect("recv");
        assert_eq!(received.message_id, Some(9));
    }

    #[test]
    fn markdown_outbound_keeps_fields() {
        let msg = OutboundMessage::markdown("telegram", 4, "hi").with_reply_to(Some(3));
        assert_eq!(msg.format, TextFormat::Markdown);
        assert_eq!(msg.reply_to, Some(3));
        assert_eq!(msg.text, "hi");
    }
}
