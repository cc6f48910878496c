//! Session state: the conversation log, the model catalog, and the entry
//! points that turn a prompt into one or more dispatches.
//!
//! Dispatch tasks never touch session state directly. They send
//! `(StreamMessage, MessageId)` events over the session channel and the
//! driver feeds them back through [`ChatSession::apply`], so all log
//! mutation happens in one place.

use std::collections::HashSet;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::models::{fetch_image_models, fetch_text_models};
use crate::core::catalog::{humanize_model_id, ModelCatalog, ModelDescriptor, ModelKind};
use crate::core::chat_stream::StreamMessage;
use crate::core::compare;
use crate::core::config::Config;
use crate::core::constants::COUNCIL_JUDGE_MODEL;
use crate::core::conversation::ConversationLog;
use crate::core::council;
use crate::core::dispatch::{DispatchRequest, Dispatcher};
use crate::core::message::{Message, MessageId};
use crate::core::router;

/// How a catalog selection executes when the user hits send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatMode {
    /// One dispatch to the named model.
    Direct(String),
    /// Heuristically pick the model from the prompt text.
    Auto,
    /// Fan the prompt out across the flagship roster, one answer each.
    Compare,
    /// Fan out, then have a judge synthesize a single answer.
    Council,
}

/// Map a selection id to its execution mode. Anything that is not a routing
/// pseudo-model is a direct dispatch.
pub fn resolve_mode(selection: &str) -> ChatMode {
    match selection {
        "auto" => ChatMode::Auto,
        "compare" => ChatMode::Compare,
        "council" => ChatMode::Council,
        other => ChatMode::Direct(other.to_string()),
    }
}

pub type EventReceiver = mpsc::UnboundedReceiver<(StreamMessage, MessageId)>;

pub struct ChatSession {
    log: ConversationLog,
    catalog: ModelCatalog,
    dispatcher: Dispatcher,
    active_selection: String,
    tx: mpsc::UnboundedSender<(StreamMessage, MessageId)>,
    cancel_token: CancellationToken,
    /// Placeholders whose dispatch has not yet settled.
    active: HashSet<MessageId>,
}

impl ChatSession {
    pub fn new(config: &Config) -> (Self, EventReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let dispatcher = Dispatcher::new(reqwest::Client::new(), config.base_url(), config.api_key());
        let session = Self {
            log: ConversationLog::new(),
            catalog: ModelCatalog::builtin(),
            dispatcher,
            active_selection: config.default_model().to_string(),
            tx,
            cancel_token: CancellationToken::new(),
            active: HashSet::new(),
        };
        (session, rx)
    }

    pub fn active_selection(&self) -> &str {
        &self.active_selection
    }

    pub fn active_mode(&self) -> ChatMode {
        resolve_mode(&self.active_selection)
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    pub fn messages(&self) -> &[Message] {
        self.log.messages()
    }

    pub fn is_busy(&self) -> bool {
        !self.active.is_empty()
    }

    /// Switch the active selection. Changing it aborts any in-flight
    /// operation and clears the conversation log in full.
    pub fn select(&mut self, selection: &str) {
        if selection == self.active_selection {
            return;
        }
        self.abort();
        self.active_selection = selection.to_string();
        self.log.clear();
    }

    /// Send one prompt through the active mode. Placeholders are posted
    /// immediately; content arrives via the session channel.
    pub fn send(&mut self, prompt: &str) -> Result<(), String> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err("prompt is empty".to_string());
        }
        if self.is_busy() {
            return Err("a send is already in progress".to_string());
        }

        // Fresh token per operation; the previous one can no longer cancel us.
        self.cancel_token = CancellationToken::new();

        self.log.push_user(prompt);
        let history = self.log.history();

        match self.active_mode() {
            ChatMode::Direct(model) => self.spawn_direct(&model, history),
            ChatMode::Auto => {
                let model = router::resolve_auto_model(prompt);
                debug!(model, "auto mode resolved");
                self.spawn_direct(model, history)
            }
            ChatMode::Compare => self.spawn_compare(history),
            ChatMode::Council => self.spawn_council(prompt.to_string(), history),
        }
        Ok(())
    }

    /// Feed one dispatch event back into the log. Events for settled or
    /// cleared placeholders fall through harmlessly.
    pub fn apply(&mut self, id: MessageId, message: &StreamMessage) {
        self.log.apply(id, message);
        if matches!(message, StreamMessage::End) {
            self.active.remove(&id);
        }
    }

    /// Cancel the current operation. Live placeholders freeze immediately, so
    /// no further mutation is observed even if a dispatch task is still
    /// winding down.
    pub fn abort(&mut self) {
        if self.active.is_empty() {
            return;
        }
        self.cancel_token.cancel();
        for id in std::mem::take(&mut self.active) {
            self.log.apply(id, &StreamMessage::End);
        }
    }

    /// Refresh the catalog from the gateway's listing endpoints. Either
    /// fetch failing falls back to built-ins for that capability kind; both
    /// failing leaves the catalog untouched.
    pub async fn refresh_models(&mut self) {
        let client = self.dispatcher.client().clone();
        let base_url = self.dispatcher.base_url().to_string();
        let api_key = self.dispatcher.api_key().map(str::to_string);

        let mut live: Vec<ModelDescriptor> = Vec::new();

        match fetch_text_models(&client, &base_url, api_key.as_deref()).await {
            Ok(models) => live.extend(models.into_iter().map(|info| ModelDescriptor {
                display_name: info
                    .name
                    .clone()
                    .unwrap_or_else(|| humanize_model_id(&info.id)),
                id: info.id,
                kind: ModelKind::Text,
                persona: None,
                strict_system_role: false,
            })),
            Err(err) => warn!(error = %err, "text model listing failed, using builtins"),
        }

        match fetch_image_models(&client, &base_url).await {
            Ok(ids) => live.extend(ids.into_iter().map(|id| ModelDescriptor {
                display_name: humanize_model_id(&id),
                id,
                kind: ModelKind::Image,
                persona: None,
                strict_system_role: false,
            })),
            Err(err) => warn!(error = %err, "image model listing failed, using builtins"),
        }

        self.catalog.refresh(live);
    }

    fn request_for(&self, history: Vec<Message>, model: &str) -> DispatchRequest {
        DispatchRequest {
            messages: history,
            model: model.to_string(),
            persona: self.catalog.persona_for(model),
            strict_system_role: self.catalog.strict_system_role(model),
            kind: self.catalog.kind_of(model),
        }
    }

    fn spawn_direct(&mut self, model: &str, history: Vec<Message>) {
        let request = self.request_for(history, model);
        let placeholder = self.log.push_placeholder(Some(model.to_string()));
        self.active.insert(placeholder);
        self.dispatcher.spawn(
            request,
            self.tx.clone(),
            self.cancel_token.clone(),
            placeholder,
        );
    }

    fn spawn_compare(&mut self, history: Vec<Message>) {
        let requests = compare::roster_requests(&history, &self.catalog);
        let paired: Vec<(DispatchRequest, MessageId)> = requests
            .into_iter()
            .map(|request| {
                let placeholder = self.log.push_placeholder(Some(request.model.clone()));
                self.active.insert(placeholder);
                (request, placeholder)
            })
            .collect();
        compare::spawn_compare(
            &self.dispatcher,
            paired,
            self.tx.clone(),
            self.cancel_token.clone(),
        );
    }

    fn spawn_council(&mut self, query: String, history: Vec<Message>) {
        let racer_requests = compare::roster_requests(&history, &self.catalog);
        let placeholder = self.log.push_placeholder(Some("council".to_string()));
        self.active.insert(placeholder);
        council::spawn_council(
            &self.dispatcher,
            racer_requests,
            query,
            self.catalog.strict_system_role(COUNCIL_JUDGE_MODEL),
            self.tx.clone(),
            self.cancel_token.clone(),
            placeholder,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::constants::FLAGSHIP_ROSTER;
    use crate::core::message::MessageRole;

    fn offline_config() -> Config {
        // An unroutable loopback port: sends fail fast without real traffic.
        Config {
            base_url: Some("http://127.0.0.1:9".to_string()),
            api_key: None,
            default_model: Some("grok".to_string()),
        }
    }

    fn new_session() -> (ChatSession, EventReceiver) {
        ChatSession::new(&offline_config())
    }

    #[test]
    fn selection_ids_resolve_to_modes() {
        assert_eq!(resolve_mode("auto"), ChatMode::Auto);
        assert_eq!(resolve_mode("compare"), ChatMode::Compare);
        assert_eq!(resolve_mode("council"), ChatMode::Council);
        assert_eq!(resolve_mode("claude"), ChatMode::Direct("claude".to_string()));
    }

    #[tokio::test]
    async fn switching_selection_clears_the_log() {
        let (mut session, _rx) = new_session();
        session.send("hello").expect("send accepted");
        assert!(!session.messages().is_empty());

        session.select("claude");
        assert!(session.messages().is_empty());
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn reselecting_the_same_model_keeps_the_log() {
        let (mut session, _rx) = new_session();
        session.send("hello").expect("send accepted");
        let before = session.messages().len();

        session.select("grok");
        assert_eq!(session.messages().len(), before);
    }

    #[tokio::test]
    async fn empty_prompts_and_concurrent_sends_are_rejected() {
        let (mut session, _rx) = new_session();
        assert!(session.send("   ").is_err());

        session.send("first").expect("send accepted");
        assert!(session.is_busy());
        assert!(session.send("second").is_err());
    }

    #[tokio::test]
    async fn direct_send_posts_user_message_and_tagged_placeholder() {
        let (mut session, _rx) = new_session();
        session.send("hello").expect("send accepted");

        let messages = session.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(messages[0].content, "hello");
        assert_eq!(messages[1].role, MessageRole::Model);
        assert!(messages[1].content.is_empty());
        assert_eq!(messages[1].model.as_deref(), Some("grok"));
    }

    #[tokio::test]
    async fn compare_send_posts_one_placeholder_per_roster_member() {
        let (mut session, _rx) = new_session();
        session.select("compare");
        session.send("which of you is best").expect("send accepted");

        let tags: Vec<&str> = session
            .messages()
            .iter()
            .filter(|m| m.is_model())
            .filter_map(|m| m.model.as_deref())
            .collect();
        assert_eq!(tags, FLAGSHIP_ROSTER.to_vec());
        assert!(session.is_busy());
    }

    #[tokio::test]
    async fn compare_failures_stay_in_their_own_column() {
        let (mut session, _rx) = new_session();
        session.select("compare");
        session.send("prompt").expect("send accepted");

        let ids: Vec<MessageId> = session
            .messages()
            .iter()
            .filter(|m| m.is_model())
            .map(|m| m.id)
            .collect();
        assert_eq!(ids.len(), 5);

        // Four members answer, one errors: exactly four populated answers
        // and one error marker, none missing.
        for id in &ids[..4] {
            session.apply(*id, &StreamMessage::Chunk("an answer".into()));
            session.apply(*id, &StreamMessage::End);
        }
        session.apply(ids[4], &StreamMessage::Error("[Error: boom]".into()));
        session.apply(ids[4], &StreamMessage::End);

        let contents: Vec<&str> = session
            .messages()
            .iter()
            .filter(|m| m.is_model())
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(contents.iter().filter(|c| **c == "an answer").count(), 4);
        assert_eq!(contents.iter().filter(|c| **c == "[Error: boom]").count(), 1);
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn abort_freezes_placeholders_against_late_events() {
        let (mut session, _rx) = new_session();
        session.send("hello").expect("send accepted");

        let placeholder = session
            .messages()
            .iter()
            .find(|m| m.is_model())
            .map(|m| m.id)
            .expect("placeholder posted");
        session.apply(placeholder, &StreamMessage::Chunk("partial".into()));

        session.abort();
        assert!(!session.is_busy());

        // A chunk still queued from the dispatch task must not land.
        session.apply(placeholder, &StreamMessage::Chunk(" more".into()));
        let message = session.messages().iter().find(|m| m.id == placeholder).unwrap();
        assert_eq!(message.content, "partial");
    }

    #[tokio::test]
    async fn council_send_posts_single_council_placeholder() {
        let (mut session, mut rx) = new_session();
        session.select("council");
        session.send("deliberate on this").expect("send accepted");

        let placeholders: Vec<&Message> =
            session.messages().iter().filter(|m| m.is_model()).collect();
        assert_eq!(placeholders.len(), 1);
        assert_eq!(placeholders[0].model.as_deref(), Some("council"));

        // The deliberating status is posted before any racer settles.
        let (first, id) = rx.recv().await.expect("status event");
        assert_eq!(id, placeholders[0].id);
        match first {
            StreamMessage::Status(text) => {
                assert_eq!(text, council::DELIBERATING_STATUS)
            }
            other => panic!("expected status, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn auto_mode_tags_placeholder_with_resolved_model() {
        let (mut session, _rx) = new_session();
        session.select("auto");
        session.send("fix this python function").expect("send accepted");

        let placeholder = session
            .messages()
            .iter()
            .find(|m| m.is_model())
            .expect("placeholder posted");
        assert_eq!(placeholder.model.as_deref(), Some("deepseek"));
    }
}
