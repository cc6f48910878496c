use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier for a conversation turn.
///
/// Ids are allocated monotonically by the owning [`ConversationLog`], so
/// ordering by id matches creation order.
///
/// [`ConversationLog`]: crate::core::conversation::ConversationLog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Model,
}

impl MessageRole {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Model => "model",
        }
    }

    /// The wire role sent upstream. The gateway speaks the OpenAI dialect,
    /// which names the model side `assistant`.
    pub fn to_api_role(self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Model => "assistant",
        }
    }

    pub fn is_user(self) -> bool {
        self == MessageRole::User
    }

    pub fn is_model(self) -> bool {
        self == MessageRole::Model
    }
}

/// A turn in a conversation.
///
/// Model-role messages start life as empty placeholders and are filled in
/// place while their dispatch streams; the log freezes them once the stream
/// settles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// For model-role messages: which concrete model produced this content.
    pub model: Option<String>,
}

impl Message {
    pub fn user(id: MessageId, content: impl Into<String>) -> Self {
        Self {
            id,
            role: MessageRole::User,
            content: content.into(),
            timestamp: Utc::now(),
            model: None,
        }
    }

    pub fn placeholder(id: MessageId, model: Option<String>) -> Self {
        Self {
            id,
            role: MessageRole::Model,
            content: String::new(),
            timestamp: Utc::now(),
            model,
        }
    }

    pub fn is_user(&self) -> bool {
        self.role.is_user()
    }

    pub fn is_model(&self) -> bool {
        self.role.is_model()
    }
}
