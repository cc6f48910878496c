//! The conversation log: ordered turns with keyed in-place mutation.
//!
//! Every dispatch mutates only the one placeholder it owns, addressed by
//! message id, so concurrent dispatches never contend over content. The log
//! itself is only ever touched by the driver applying stream events.

use std::collections::HashMap;

use crate::core::chat_stream::StreamMessage;
use crate::core::message::{Message, MessageId};

#[derive(Default)]
pub struct ConversationLog {
    messages: Vec<Message>,
    next_id: u64,
    /// Placeholders with a live stream. The flag marks provisional status
    /// text that the next real chunk replaces.
    live: HashMap<MessageId, bool>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&mut self) -> MessageId {
        let id = MessageId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn push_user(&mut self, content: impl Into<String>) -> MessageId {
        let id = self.allocate_id();
        self.messages.push(Message::user(id, content));
        id
    }

    /// Append an empty model-role placeholder and mark its stream live.
    pub fn push_placeholder(&mut self, model: Option<String>) -> MessageId {
        let id = self.allocate_id();
        self.messages.push(Message::placeholder(id, model));
        self.live.insert(id, false);
        id
    }

    /// Settled history to hand to a dispatch. Live placeholders (including
    /// siblings in compare/council fan-outs) are excluded.
    pub fn history(&self) -> Vec<Message> {
        self.messages
            .iter()
            .filter(|m| !self.live.contains_key(&m.id))
            .cloned()
            .collect()
    }

    /// Route one stream event to the placeholder that owns it. Events for
    /// frozen or unknown ids are ignored.
    pub fn apply(&mut self, id: MessageId, message: &StreamMessage) {
        match message {
            StreamMessage::Chunk(content) => self.append(id, content),
            StreamMessage::Status(text) => self.set_status(id, text),
            StreamMessage::Error(text) => self.fail(id, text),
            StreamMessage::End => self.finalize(id),
        }
    }

    fn content_mut(&mut self, id: MessageId) -> Option<&mut String> {
        self.messages
            .iter_mut()
            .find(|m| m.id == id)
            .map(|m| &mut m.content)
    }

    fn append(&mut self, id: MessageId, chunk: &str) {
        let Some(provisional) = self.live.get_mut(&id) else {
            return;
        };
        let clear_first = std::mem::replace(provisional, false);
        if let Some(content) = self.content_mut(id) {
            if clear_first {
                content.clear();
            }
            content.push_str(chunk);
        }
    }

    fn set_status(&mut self, id: MessageId, text: &str) {
        if let Some(provisional) = self.live.get_mut(&id) {
            *provisional = true;
        } else {
            return;
        }
        if let Some(content) = self.content_mut(id) {
            content.clear();
            content.push_str(text);
        }
    }

    fn fail(&mut self, id: MessageId, error: &str) {
        let Some(provisional) = self.live.get_mut(&id) else {
            return;
        };
        let clear_first = std::mem::replace(provisional, false);
        if let Some(content) = self.content_mut(id) {
            if clear_first {
                content.clear();
            }
            if !content.is_empty() {
                content.push('\n');
            }
            content.push_str(error);
        }
    }

    /// Freeze a placeholder: its stream has settled and content is final.
    fn finalize(&mut self, id: MessageId) {
        self.live.remove(&id);
    }

    pub fn is_streaming(&self, id: MessageId) -> bool {
        self.live.contains_key(&id)
    }

    /// Wholesale reset, used whenever the active model or mode changes.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.live.clear();
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_sort_by_creation_order() {
        let mut log = ConversationLog::new();
        let first = log.push_user("one");
        let second = log.push_placeholder(Some("grok".into()));
        assert!(first < second);
    }

    #[test]
    fn chunks_append_in_arrival_order() {
        let mut log = ConversationLog::new();
        let id = log.push_placeholder(Some("grok".into()));
        log.apply(id, &StreamMessage::Chunk("Hel".into()));
        log.apply(id, &StreamMessage::Chunk("lo".into()));
        assert_eq!(log.get(id).unwrap().content, "Hello");
    }

    #[test]
    fn content_freezes_once_stream_ends() {
        let mut log = ConversationLog::new();
        let id = log.push_placeholder(None);
        log.apply(id, &StreamMessage::Chunk("final".into()));
        log.apply(id, &StreamMessage::End);
        assert!(!log.is_streaming(id));

        log.apply(id, &StreamMessage::Chunk(" late".into()));
        log.apply(id, &StreamMessage::Status("late status".into()));
        assert_eq!(log.get(id).unwrap().content, "final");
    }

    #[test]
    fn status_text_is_replaced_by_first_chunk() {
        let mut log = ConversationLog::new();
        let id = log.push_placeholder(None);
        log.apply(id, &StreamMessage::Status("The council is deliberating...".into()));
        assert_eq!(
            log.get(id).unwrap().content,
            "The council is deliberating..."
        );

        log.apply(id, &StreamMessage::Chunk("Verdict: ".into()));
        log.apply(id, &StreamMessage::Chunk("yes".into()));
        assert_eq!(log.get(id).unwrap().content, "Verdict: yes");
    }

    #[test]
    fn error_appends_after_streamed_content() {
        let mut log = ConversationLog::new();
        let id = log.push_placeholder(None);
        log.apply(id, &StreamMessage::Chunk("partial".into()));
        log.apply(id, &StreamMessage::Error("[Error: connection lost]".into()));
        log.apply(id, &StreamMessage::End);
        assert_eq!(
            log.get(id).unwrap().content,
            "partial\n[Error: connection lost]"
        );
    }

    #[test]
    fn error_replaces_pending_status() {
        let mut log = ConversationLog::new();
        let id = log.push_placeholder(None);
        log.apply(id, &StreamMessage::Status("Generating image...".into()));
        log.apply(id, &StreamMessage::Error("[Error: bad seed]".into()));
        assert_eq!(log.get(id).unwrap().content, "[Error: bad seed]");
    }

    #[test]
    fn sibling_placeholders_are_isolated() {
        let mut log = ConversationLog::new();
        let left = log.push_placeholder(Some("grok".into()));
        let right = log.push_placeholder(Some("claude".into()));

        log.apply(left, &StreamMessage::Chunk("from grok".into()));
        log.apply(right, &StreamMessage::Error("[Error: timeout]".into()));
        log.apply(right, &StreamMessage::End);

        assert_eq!(log.get(left).unwrap().content, "from grok");
        assert!(log.is_streaming(left));
        assert_eq!(log.get(right).unwrap().content, "[Error: timeout]");
    }

    #[test]
    fn history_excludes_live_placeholders() {
        let mut log = ConversationLog::new();
        log.push_user("question");
        let done = log.push_placeholder(Some("grok".into()));
        log.apply(done, &StreamMessage::Chunk("answer".into()));
        log.apply(done, &StreamMessage::End);
        let live = log.push_placeholder(Some("claude".into()));

        let history = log.history();
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|m| m.id != live));
    }

    #[test]
    fn clear_resets_regardless_of_size() {
        let mut log = ConversationLog::new();
        for i in 0..20 {
            log.push_user(format!("msg {i}"));
        }
        log.push_placeholder(None);
        log.clear();
        assert!(log.is_empty());
        assert_eq!(log.history().len(), 0);
    }
}
