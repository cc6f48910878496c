//! TUI-less one-shot send
//!
//! Streams a single exchange to stdout. Progress notes (deliberation,
//! image generation status) go to stderr so stdout carries only content.

use std::error::Error;
use std::io::{self, Write};

use crate::core::chat_stream::StreamMessage;
use crate::core::config::Config;
use crate::core::message::MessageId;
use crate::core::session::{ChatMode, ChatSession};

pub async fn run_say(
    prompt: Vec<String>,
    model: Option<String>,
    offline: bool,
    config: &Config,
) -> Result<(), Box<dyn Error>> {
    let prompt = prompt.join(" ");
    if prompt.trim().is_empty() {
        eprintln!("Usage: quorum say [-m MODEL] <prompt>");
        std::process::exit(1);
    }

    let (mut session, mut rx) = ChatSession::new(config);
    if !offline {
        session.refresh_models().await;
    }
    if let Some(model) = model {
        session.select(&model);
    }

    let compare = session.active_mode() == ChatMode::Compare;
    session.send(&prompt).map_err(|reason| -> Box<dyn Error> { reason.into() })?;

    let mut streamed: Option<MessageId> = None;
    while session.is_busy() {
        let Some((message, id)) = rx.recv().await else {
            break;
        };

        if !compare {
            match &message {
                StreamMessage::Chunk(content) => {
                    print!("{content}");
                    io::stdout().flush()?;
                    streamed = Some(id);
                }
                StreamMessage::Status(text) => eprintln!("{text}"),
                StreamMessage::Error(text) => {
                    if streamed == Some(id) {
                        println!("\n{text}");
                    }
                }
                StreamMessage::End => {}
            }
        }
        session.apply(id, &message);
    }

    if compare {
        render_compare_answers(&session);
    } else if streamed.is_some() {
        println!();
    } else {
        // Nothing streamed as chunks (image dispatch, disbanded council, or
        // a failure before the first fragment): print the settled content.
        for message in session.messages().iter().filter(|m| m.is_model()) {
            if !message.content.is_empty() {
                println!("{}", message.content);
            }
        }
    }

    Ok(())
}

fn render_compare_answers(session: &ChatSession) {
    for message in session.messages().iter().filter(|m| m.is_model()) {
        let tag = message.model.as_deref().unwrap_or("unknown");
        println!("── {} ──", session.catalog().display_name(tag));
        println!("{}", message.content);
        println!();
    }
}
