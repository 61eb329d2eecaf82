//! Routes inbound envelopes to command handlers and fulfils pending actions.

use crate::chunk::{chunk, Segments};
use crate::command::Command;
use crate::pending::{PendingAction, PendingStore};
use crate::store::SnippetStore;
use anyhow::Result;
use devtoolkit_ipc::{Envelope, MessageKind, OutboundMessage, OutboundSink};
use devtoolkit_providers::Provider;
use devtoolkit_telegram::menu;
use std::fmt::Display;
use std::sync::Arc;
use tracing::{debug, info, warn};

const TYPING_ACTION: &str = "typing";

fn error_reply(err: impl Display) -> String {
    format!("❌ Error: {}", err)
}

fn format_prompt(language: &str, code: &str) -> String {
    format!(
        "Please format the following {} code properly:\n\n{}",
        language, code
    )
}

fn explain_prompt(error_text: &str) -> String {
    format!(
        "I got this error:\n\n{}\n\nExplain it clearly and suggest how to fix it.",
        error_text
    )
}

pub struct Dispatcher {
    pending: Arc<dyn PendingStore>,
    snippets: Arc<dyn SnippetStore>,
    provider: Arc<dyn Provider>,
    outbound: Arc<dyn OutboundSink>,
    max_segment_len: usize,
}

impl Dispatcher {
    pub fn new(
        pending: Arc<dyn PendingStore>,
        snippets: Arc<dyn SnippetStore>,
        provider: Arc<dyn Provider>,
        outbound: Arc<dyn OutboundSink>,
        max_segment_len: usize,
    ) -> Self {
        Self {
            pending,
            snippets,
            provider,
            outbound,
            max_segment_len,
        }
    }

    /// Handles one inbound event. Errors returned here are transport
    /// failures; storage and inference failures are reported to the user.
    pub async fn handle(&self, envelope: &Envelope) -> Result<()> {
        match &envelope.kind {
            MessageKind::Text { text } => self.handle_text(envelope, text).await,
            kind => match Command::parse(kind) {
                Some(command) => self.handle_command(envelope, command).await,
                None => {
                    debug!(user_id = envelope.user_id, "Ignoring unknown command");
                    Ok(())
                }
            },
        }
    }

    async fn reply(&self, envelope: &Envelope, text: impl Into<String>) -> Result<()> {
        self.outbound
            .send(OutboundMessage::markdown(
                &envelope.channel,
                envelope.chat_id,
                text,
            ))
            .await
    }

    /// Failure notices quote the message that triggered them.
    async fn reply_error(&self, envelope: &Envelope, err: impl Display) -> Result<()> {
        self.outbound
            .send(
                OutboundMessage::markdown(&envelope.channel, envelope.chat_id, error_reply(err))
                    .with_reply_to(envelope.message_id),
            )
            .await
    }

    /// Sends each segment as its own message, waiting for one to be accepted
    /// before sending the next.
    async fn deliver_segments(
        &self,
        envelope: &Envelope,
        header: &str,
        segments: Segments<'_>,
    ) -> Result<()> {
        for segment in segments {
            self.reply(envelope, format!("{}{}", header, segment)).await?;
        }
        Ok(())
    }

    /// Room left for a fenced segment once `header` is prepended.
    fn segment_budget(&self, header: &str) -> usize {
        self.max_segment_len.saturating_sub(header.chars().count())
    }

    async fn show_typing(&self, envelope: &Envelope) {
        if let Err(e) = self
            .outbound
            .send_chat_action(envelope.chat_id, TYPING_ACTION)
            .await
        {
            warn!(chat_id = envelope.chat_id, "Failed to send typing action: {}", e);
        }
    }

    async fn handle_command(&self, envelope: &Envelope, command: Command) -> Result<()> {
        let user_id = envelope.user_id;
        debug!(user_id, ?command, "Dispatching command");

        match command {
            Command::Start => self.reply(envelope, menu::welcome_text()).await,
            Command::Commands => self.reply(envelope, menu::commands_text()).await,
            Command::Save(None) => self.reply(envelope, menu::usage_text("save", "name")).await,
            Command::Save(Some(name)) => {
                let ack = format!("✏️ Send the code you want to save as *{}*", name);
                self.pending
                    .set_pending(user_id, PendingAction::Save { name })
                    .await;
                self.reply(envelope, ack).await
            }
            Command::Format(None) => {
                self.reply(envelope, menu::usage_text("format", "language"))
                    .await
            }
            Command::Format(Some(language)) => {
                let ack = format!(
                    "📥 Send your {} code and I'll format it using {}.",
                    language,
                    self.provider.display_name()
                );
                self.pending
                    .set_pending(user_id, PendingAction::Format { language })
                    .await;
                self.reply(envelope, ack).await
            }
            Command::HelpMe => {
                self.pending
                    .set_pending(user_id, PendingAction::ExplainError)
                    .await;
                let ack = format!(
                    "💥 Send your error message or stack trace, and I'll try to help using {}.",
                    self.provider.display_name()
                );
                self.reply(envelope, ack).await
            }
            Command::Get(None) => self.reply(envelope, menu::usage_text("get", "name")).await,
            Command::Get(Some(name)) => self.get_snippet(envelope, &name).await,
            Command::List => self.list_snippets(envelope).await,
            Command::Delete(None) => {
                self.reply(envelope, menu::usage_text("delete", "name"))
                    .await
            }
            Command::Delete(Some(name)) => self.delete_snippet(envelope, &name).await,
        }
    }

    async fn get_snippet(&self, envelope: &Envelope, name: &str) -> Result<()> {
        let snippet = match self.snippets.get(envelope.user_id, name).await {
            Ok(Some(snippet)) => snippet,
            Ok(None) => {
                return self
                    .reply(envelope, format!("❌ No snippet found named *{}*", name))
                    .await
            }
            Err(e) => {
                warn!(user_id = envelope.user_id, "Snippet lookup failed: {}", e);
                return self.reply_error(envelope, e).await;
            }
        };

        let header = format!("📂 *{}*:\n", name);
        match chunk(&snippet.code, self.segment_budget(&header), "") {
            Ok(segments) => self.deliver_segments(envelope, &header, segments).await,
            Err(e) => self.reply_error(envelope, e).await,
        }
    }

    async fn list_snippets(&self, envelope: &Envelope) -> Result<()> {
        let names = match self.snippets.list_names(envelope.user_id).await {
            Ok(names) => names,
            Err(e) => {
                warn!(user_id = envelope.user_id, "Snippet listing failed: {}", e);
                return self.reply_error(envelope, e).await;
            }
        };

        if names.is_empty() {
            return self.reply(envelope, "📂 You have no saved snippets.").await;
        }
        let lines: Vec<String> = names.iter().map(|name| format!("• {}", name)).collect();
        self.reply(envelope, format!("📂 Your snippets:\n{}", lines.join("\n")))
            .await
    }

    async fn delete_snippet(&self, envelope: &Envelope, name: &str) -> Result<()> {
        let user_id = envelope.user_id;
        match self.snippets.get(user_id, name).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                return self
                    .reply(envelope, format!("❌ No snippet named *{}* found.", name))
                    .await
            }
            Err(e) => {
                warn!(user_id, "Snippet lookup failed: {}", e);
                return self.reply_error(envelope, e).await;
            }
        }

        match self.snippets.delete(user_id, name).await {
            Ok(_) => {
                info!(user_id, name, "Snippet deleted");
                self.reply(envelope, format!("🗑️ Snippet *{}* deleted.", name))
                    .await
            }
            Err(e) => {
                warn!(user_id, "Snippet delete failed: {}", e);
                self.reply_error(envelope, e).await
            }
        }
    }

    async fn handle_text(&self, envelope: &Envelope, text: &str) -> Result<()> {
        let user_id = envelope.user_id;
        // Cleared before any work starts; a failure below does not re-arm it.
        let Some(action) = self.pending.take_pending(user_id).await else {
            debug!(user_id, "No pending action, ignoring text");
            return Ok(());
        };

        match action {
            PendingAction::Save { name } => {
                match self.snippets.save(user_id, &name, text).await {
                    Ok(()) => {
                        info!(user_id, name = %name, "Snippet saved");
                        self.reply(envelope, format!("✅ Snippet *{}* saved!", name))
                            .await
                    }
                    Err(e) => {
                        warn!(user_id, "Snippet save failed: {}", e);
                        self.reply_error(envelope, e).await
                    }
                }
            }
            PendingAction::Format { language } => {
                let header = format!("🎨 *Formatted {} code:*\n", language);
                let prompt = format_prompt(&language, text);
                self.answer_with_inference(envelope, &prompt, &header, &language)
                    .await
            }
            PendingAction::ExplainError => {
                let header = format!("🤖 *{} says:*\n", self.provider.display_name());
                self.answer_with_inference(envelope, &explain_prompt(text), &header, "")
                    .await
            }
        }
    }

    async fn answer_with_inference(
        &self,
        envelope: &Envelope,
        prompt: &str,
        header: &str,
        language: &str,
    ) -> Result<()> {
        self.show_typing(envelope).await;

        let generation = match self.provider.generate(prompt).await {
            Ok(generation) => generation,
            Err(e) => {
                warn!(
                    user_id = envelope.user_id,
                    provider = self.provider.name(),
                    "Inference failed: {}",
                    e
                );
                return self.reply_error(envelope, e).await;
            }
        };
        debug!(
            user_id = envelope.user_id,
            model = %generation.model,
            chars = generation.text.chars().count(),
            "Inference completed"
        );

        match chunk(generation.text.trim(), self.segment_budget(header), language) {
            Ok(segments) => self.deliver_segments(envelope, header, segments).await,
            Err(e) => self.reply_error(envelope, e).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pending::InMemoryPendingStore;
    use crate::store::SqliteSnippetStore;
    use anyhow::anyhow;
    use devtoolkit_providers::Generation;
    use devtoolkit_storage::{Snippet, Storage};
    use tokio::sync::Mutex;

    const USER: i64 = 42;
    const CHAT: i64 = 4242;

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<OutboundMessage>>,
        actions: Mutex<Vec<String>>,
    }

    impl RecordingSink {
        async fn texts(&self) -> Vec<String> {
            self.sent
                .lock()
                .await
                .iter()
                .map(|m| m.text.clone())
                .collect()
        }
    }

    #[async_trait::async_trait]
    impl OutboundSink for RecordingSink {
        async fn send(&self, message: OutboundMessage) -> Result<()> {
            self.sent.lock().await.push(message);
            Ok(())
        }

        async fn send_chat_action(&self, _chat_id: i64, action: &str) -> Result<()> {
            self.actions.lock().await.push(action.to_string());
            Ok(())
        }
    }

    struct FakeProvider {
        reply: std::result::Result<String, String>,
        prompts: Mutex<Vec<String>>,
    }

    impl FakeProvider {
        fn answering(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                reply: Err(message.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl Provider for FakeProvider {
        fn name(&self) -> &str {
            "fake"
        }

        fn display_name(&self) -> &str {
            "Gemini AI"
        }

        fn model(&self) -> &str {
            "fake-model"
        }

        async fn generate_with_model(
            &self,
            prompt: &str,
            _model_override: Option<&str>,
        ) -> Result<Generation> {
            self.prompts.lock().await.push(prompt.to_string());
            match &self.reply {
                Ok(text) => Ok(Generation {
                    text: text.clone(),
                    model: "fake-model".to_string(),
                    usage: None,
                    finish_reason: None,
                }),
                Err(message) => Err(anyhow!(message.clone())),
            }
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }
    }

    struct BrokenStore;

    #[async_trait::async_trait]
    impl SnippetStore for BrokenStore {
        async fn save(&self, _: i64, _: &str, _: &str) -> Result<()> {
            Err(anyhow!("disk full"))
        }
        async fn get(&self, _: i64, _: &str) -> Result<Option<Snippet>> {
            Err(anyhow!("disk full"))
        }
        async fn list_names(&self, _: i64) -> Result<Vec<String>> {
            Err(anyhow!("disk full"))
        }
        async fn delete(&self, _: i64, _: &str) -> Result<bool> {
            Err(anyhow!("disk full"))
        }
    }

    struct Harness {
        dispatcher: Dispatcher,
        sink: Arc<RecordingSink>,
        provider: Arc<FakeProvider>,
        snippets: Arc<dyn SnippetStore>,
        pending: Arc<InMemoryPendingStore>,
    }

    impl Harness {
        fn with(provider: FakeProvider, snippets: Arc<dyn SnippetStore>, max: usize) -> Self {
            let sink = Arc::new(RecordingSink::default());
            let provider = Arc::new(provider);
            let pending = Arc::new(InMemoryPendingStore::new());
            let dispatcher = Dispatcher::new(
                pending.clone(),
                Arc::clone(&snippets),
                provider.clone(),
                sink.clone(),
                max,
            );
            Self {
                dispatcher,
                sink,
                provider,
                snippets,
                pending,
            }
        }

        fn new(provider: FakeProvider) -> Self {
            let storage = Storage::in_memory().expect("in-memory storage");
            let snippets = Arc::new(SqliteSnippetStore::new(Arc::new(Mutex::new(storage))));
            Self::with(provider, snippets, 3000)
        }

        async fn send(&self, text: &str) {
            self.send_as(USER, text).await;
        }

        async fn send_as(&self, user_id: i64, text: &str) {
            let envelope = Envelope::new("telegram", MessageKind::from_text(text), user_id, CHAT);
            self.dispatcher.handle(&envelope).await.expect("handle");
        }
    }

    fn unwrap_segment<'a>(message: &'a str, header: &str, language: &str) -> &'a str {
        message
            .strip_prefix(header)
            .and_then(|m| m.strip_prefix(&format!("```{}\n", language)))
            .and_then(|m| m.strip_suffix("\n```"))
            .expect("fenced segment")
    }

    #[tokio::test]
    async fn save_then_get_round_trips_snippet() {
        let h = Harness::new(FakeProvider::answering(""));
        h.send("/save foo").await;
        h.send("bar code here").await;
        h.send("/get foo").await;

        let texts = h.sink.texts().await;
        assert_eq!(texts[0], "✏️ Send the code you want to save as *foo*");
        assert_eq!(texts[1], "✅ Snippet *foo* saved!");
        assert_eq!(texts.len(), 3);
        assert_eq!(unwrap_segment(&texts[2], "📂 *foo*:\n", ""), "bar code here");

        let saved = h.snippets.get(USER, "foo").await.expect("get").expect("found");
        assert_eq!(saved.code, "bar code here");
    }

    #[tokio::test]
    async fn text_without_pending_action_is_ignored() {
        let h = Harness::new(FakeProvider::answering("x"));
        h.send("hello there").await;
        assert!(h.sink.texts().await.is_empty());
        assert!(h.provider.prompts.lock().await.is_empty());
    }

    #[tokio::test]
    async fn second_arming_command_overwrites_first() {
        let h = Harness::new(FakeProvider::answering("const x = 1;"));
        h.send("/save a").await;
        h.send("/format js").await;
        h.send("const x=1").await;

        let prompts = h.provider.prompts.lock().await.clone();
        assert_eq!(
            prompts,
            vec!["Please format the following js code properly:\n\nconst x=1".to_string()]
        );
        assert!(h.snippets.get(USER, "a").await.expect("get").is_none());

        let texts = h.sink.texts().await;
        assert_eq!(
            unwrap_segment(texts.last().expect("reply"), "🎨 *Formatted js code:*\n", "js"),
            "const x = 1;"
        );
    }

    #[tokio::test]
    async fn format_delivers_three_ordered_segments() {
        let formatted: String = (0..7000).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let h = Harness::new(FakeProvider::answering(&format!("\n{}\n  ", formatted)));
        h.send("/format Python").await;
        h.send("def f(): pass").await;

        let texts = h.sink.texts().await;
        assert_eq!(
            texts[0],
            "📥 Send your python code and I'll format it using Gemini AI."
        );
        let segments = &texts[1..];
        assert_eq!(segments.len(), 3);
        let joined: String = segments
            .iter()
            .map(|t| unwrap_segment(t, "🎨 *Formatted python code:*\n", "python"))
            .collect();
        assert_eq!(joined, formatted);
        assert_eq!(h.sink.actions.lock().await.clone(), vec!["typing"]);
    }

    #[tokio::test]
    async fn header_counts_toward_segment_length() {
        let storage = Storage::in_memory().expect("in-memory storage");
        let snippets = Arc::new(SqliteSnippetStore::new(Arc::new(Mutex::new(storage))));
        let answer = "y".repeat(200);
        let h = Harness::with(FakeProvider::answering(&answer), snippets, 80);
        h.send("/format typescript").await;
        h.send("let y").await;
        h.snippets.save(USER, "a longer snippet name", &answer).await.expect("save");
        h.send("/get a longer snippet name").await;

        let texts = h.sink.texts().await;
        let formatted: Vec<_> = texts
            .iter()
            .filter(|t| t.starts_with("🎨"))
            .collect();
        let fetched: Vec<_> = texts.iter().filter(|t| t.starts_with("📂")).collect();
        assert!(formatted.len() > 1);
        assert!(fetched.len() > 1);
        for text in formatted.iter().chain(&fetched) {
            assert!(text.chars().count() <= 80, "{} chars: {}", text.chars().count(), text);
        }

        let joined: String = formatted
            .iter()
            .map(|t| unwrap_segment(t, "🎨 *Formatted typescript code:*\n", "typescript"))
            .collect();
        assert_eq!(joined, answer);
        let joined: String = fetched
            .iter()
            .map(|t| unwrap_segment(t, "📂 *a longer snippet name*:\n", ""))
            .collect();
        assert_eq!(joined, answer);
    }

    #[tokio::test]
    async fn header_longer_than_limit_reports_error() {
        let storage = Storage::in_memory().expect("in-memory storage");
        let snippets = Arc::new(SqliteSnippetStore::new(Arc::new(Mutex::new(storage))));
        let h = Harness::with(FakeProvider::answering("x"), snippets, 40);
        h.send(&format!("/format {}", "l".repeat(40))).await;
        h.send("x").await;

        let texts = h.sink.texts().await;
        assert_eq!(texts.len(), 2);
        assert!(texts[1].starts_with("❌ Error: max segment length"));
    }

    #[tokio::test]
    async fn multi_word_names_save_get_and_delete() {
        let h = Harness::new(FakeProvider::answering(""));
        h.send("/save my snippet").await;
        h.send("code").await;
        assert_eq!(
            h.snippets.list_names(USER).await.expect("list"),
            vec!["my snippet"]
        );

        h.send("/get my snippet").await;
        h.send("/delete my snippet").await;
        let texts = h.sink.texts().await;
        assert_eq!(texts[1], "✅ Snippet *my snippet* saved!");
        assert_eq!(unwrap_segment(&texts[2], "📂 *my snippet*:\n", ""), "code");
        assert_eq!(texts[3], "🗑️ Snippet *my snippet* deleted.");
        assert!(h.snippets.list_names(USER).await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn helpme_explains_with_provider_label() {
        let h = Harness::new(FakeProvider::answering("  Check your imports.  "));
        h.send("/helpme").await;
        h.send("ModuleNotFoundError: foo").await;

        let texts = h.sink.texts().await;
        assert_eq!(
            texts[0],
            "💥 Send your error message or stack trace, and I'll try to help using Gemini AI."
        );
        assert_eq!(texts[1], "🤖 *Gemini AI says:*\n```\nCheck your imports.\n```");
        assert_eq!(
            h.provider.prompts.lock().await[0],
            "I got this error:\n\nModuleNotFoundError: foo\n\nExplain it clearly and suggest how to fix it."
        );
    }

    #[tokio::test]
    async fn inference_failure_reports_error_and_clears_action() {
        let h = Harness::new(FakeProvider::failing("quota exceeded"));
        h.send("/helpme").await;
        h.send("boom").await;
        h.send("boom again").await;

        let texts = h.sink.texts().await;
        assert_eq!(texts.len(), 2);
        assert_eq!(texts[1], "❌ Error: quota exceeded");
        assert_eq!(h.provider.prompts.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn error_reply_quotes_triggering_message() {
        let h = Harness::new(FakeProvider::failing("timeout"));
        h.send("/helpme").await;
        let envelope = Envelope::new("telegram", MessageKind::from_text("trace"), USER, CHAT)
            .with_message_id(77);
        h.dispatcher.handle(&envelope).await.expect("handle");

        let sent = h.sink.sent.lock().await.clone();
        assert_eq!(sent[0].reply_to, None);
        assert_eq!(sent[1].text, "❌ Error: timeout");
        assert_eq!(sent[1].reply_to, Some(77));
    }

    #[tokio::test]
    async fn storage_failure_reports_error() {
        let h = Harness::with(FakeProvider::answering(""), Arc::new(BrokenStore), 3000);
        h.send("/save foo").await;
        h.send("code").await;
        h.send("/list").await;

        let texts = h.sink.texts().await;
        assert_eq!(texts[1], "❌ Error: disk full");
        assert_eq!(texts[2], "❌ Error: disk full");
        assert!(h.pending.take_pending(USER).await.is_none());
    }

    #[tokio::test]
    async fn delete_missing_snippet_reports_not_found() {
        let h = Harness::new(FakeProvider::answering(""));
        h.snippets.save(USER, "keep", "x").await.expect("save");
        h.send("/delete foo").await;

        assert_eq!(h.sink.texts().await, vec!["❌ No snippet named *foo* found."]);
        assert_eq!(h.snippets.list_names(USER).await.expect("list"), vec!["keep"]);
    }

    #[tokio::test]
    async fn delete_existing_snippet() {
        let h = Harness::new(FakeProvider::answering(""));
        h.snippets.save(USER, "foo", "x").await.expect("save");
        h.send("/delete foo").await;

        assert_eq!(h.sink.texts().await, vec!["🗑️ Snippet *foo* deleted."]);
        assert!(h.snippets.get(USER, "foo").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn get_missing_snippet_reports_not_found() {
        let h = Harness::new(FakeProvider::answering(""));
        h.send("/get nope").await;
        assert_eq!(h.sink.texts().await, vec!["❌ No snippet found named *nope*"]);
    }

    #[tokio::test]
    async fn list_shows_names_or_empty_message() {
        let h = Harness::new(FakeProvider::answering(""));
        h.send("/list").await;
        h.snippets.save(USER, "b", "2").await.expect("save");
        h.snippets.save(USER, "a", "1").await.expect("save");
        h.send("/list").await;

        assert_eq!(
            h.sink.texts().await,
            vec![
                "📂 You have no saved snippets.".to_string(),
                "📂 Your snippets:\n• a\n• b".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn missing_argument_replies_usage_and_keeps_state() {
        let h = Harness::new(FakeProvider::answering(""));
        h.send("/helpme").await;
        h.send("/save").await;
        h.send("/format").await;

        let texts = h.sink.texts().await;
        assert_eq!(texts[1], "ℹ️ Usage: /save <name>");
        assert_eq!(texts[2], "ℹ️ Usage: /format <language>");
        assert_eq!(
            h.pending.take_pending(USER).await,
            Some(PendingAction::ExplainError)
        );
    }

    #[tokio::test]
    async fn unknown_command_does_not_consume_pending_action() {
        let h = Harness::new(FakeProvider::answering(""));
        h.send("/save foo").await;
        h.send("/frobnicate").await;
        h.send("payload").await;

        assert_eq!(h.sink.texts().await.len(), 2);
        assert!(h.snippets.get(USER, "foo").await.expect("get").is_some());
    }

    #[tokio::test]
    async fn pending_actions_are_per_user() {
        let h = Harness::new(FakeProvider::answering(""));
        h.send_as(1, "/save mine").await;
        h.send_as(2, "not for you").await;
        h.send_as(1, "code").await;

        assert!(h.snippets.get(1, "mine").await.expect("get").is_some());
        assert!(h.snippets.get(2, "mine").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn replies_are_markdown_in_origin_chat() {
        let h = Harness::new(FakeProvider::answering(""));
        h.send("/start").await;

        let sent = h.sink.sent.lock().await.clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].chat_id, CHAT);
        assert_eq!(sent[0].channel, "telegram");
        assert_eq!(sent[0].format, devtoolkit_ipc::TextFormat::Markdown);
        assert_eq!(sent[0].text, menu::welcome_text());
    }
}
