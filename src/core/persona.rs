//! Persona placement for outgoing requests.
//!
//! Backends differ in how reliably they honor a dedicated system-role
//! message. Models flagged with strict system-role support get a leading
//! `system` message; everything else gets the persona spliced into the first
//! user message, which holds up better on gateways that proxy many vendors.

use crate::api::ChatMessage as ApiMessage;
use crate::core::message::Message;

/// Build the ordered wire-message list for a text dispatch from settled
/// conversation history, translating the internal model role to the wire
/// `assistant` role and placing persona text per the model's capabilities.
pub fn build_api_messages(
    history: &[Message],
    persona: Option<&str>,
    strict_system_role: bool,
) -> Vec<ApiMessage> {
    let mut api_messages: Vec<ApiMessage> = Vec::with_capacity(history.len() + 1);

    if strict_system_role {
        if let Some(persona) = persona {
            api_messages.push(ApiMessage {
                role: "system".to_string(),
                content: persona.to_string(),
            });
        }
    }

    for message in history {
        api_messages.push(ApiMessage {
            role: message.role.to_api_role().to_string(),
            content: message.content.clone(),
        });
    }

    if !strict_system_role {
        if let Some(persona) = persona {
            splice_persona(&mut api_messages, persona);
        }
    }

    api_messages
}

fn splice_persona(messages: &mut Vec<ApiMessage>, persona: &str) {
    match messages.iter_mut().find(|m| m.role == "user") {
        Some(first_user) => {
            first_user.content = format!(
                "[System Instruction: {persona}]\n\n{}",
                first_user.content
            );
        }
        None => messages.insert(
            0,
            ApiMessage {
                role: "user".to_string(),
                content: persona.to_string(),
            },
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::{Message, MessageId};

    fn history() -> Vec<Message> {
        let user = Message::user(MessageId(0), "What is Rust?");
        let mut reply = Message::placeholder(MessageId(1), Some("claude".into()));
        reply.content = "A systems language.".to_string();
        let follow_up = Message::user(MessageId(2), "Go on.");
        vec![user, reply, follow_up]
    }

    #[test]
    fn strict_models_get_a_system_message() {
        let messages = build_api_messages(&history(), Some("Be terse."), true);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[0].content, "Be terse.");
        assert_eq!(messages[1].role, "user");
        assert_eq!(messages[2].role, "assistant");
        assert_eq!(messages[2].content, "A systems language.");
    }

    #[test]
    fn lenient_models_get_persona_spliced_into_first_user_message() {
        let messages = build_api_messages(&history(), Some("Be terse."), false);
        assert!(messages.iter().all(|m| m.role != "system"));
        assert_eq!(
            messages[0].content,
            "[System Instruction: Be terse.]\n\nWhat is Rust?"
        );
        // Only the first user message carries the splice.
        assert_eq!(messages[2].content, "Go on.");
    }

    #[test]
    fn persona_without_user_history_becomes_a_lone_user_message() {
        let messages = build_api_messages(&[], Some("Be terse."), false);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, "user");
        assert_eq!(messages[0].content, "Be terse.");
    }

    #[test]
    fn no_persona_passes_history_through() {
        let messages = build_api_messages(&history(), None, false);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].content, "What is Rust?");
    }
}
