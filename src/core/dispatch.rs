//! Single-model dispatch against the upstream gateway.
//!
//! One dispatch drives exactly one upstream call to completion and relays
//! its output incrementally over the session channel, keyed by the id of the
//! placeholder message it owns. Nothing is raised past a streaming dispatch;
//! failures become a trailing inline error fragment.

use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::{ChatCompletion, ChatMessage as ApiMessage, ChatRequest};
use crate::core::catalog::ModelKind;
use crate::core::chat_stream::{summarize_api_error, SseDecoder, StreamMessage};
use crate::core::constants::{IMAGE_REVEAL_DELAY, RETRY_BACKOFF};
use crate::core::message::{Message, MessageId};
use crate::core::persona::build_api_messages;
use crate::utils::url::{build_image_url, construct_api_url};

/// The unit of work handed to a dispatch: settled conversation history plus
/// the target model. Sibling placeholders from concurrent dispatches are
/// never part of `messages`.
#[derive(Clone)]
pub struct DispatchRequest {
    pub messages: Vec<Message>,
    pub model: String,
    pub persona: Option<String>,
    pub strict_system_role: bool,
    pub kind: ModelKind,
}

/// How many times a chat request is attempted and the pause in between.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    /// The streaming default: one retry after a short pause.
    pub fn retry_once() -> Self {
        Self {
            max_attempts: 2,
            backoff: RETRY_BACKOFF,
        }
    }

    /// Single attempt, for callers already racing a hard timeout.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::retry_once()
    }
}

pub type StreamSender = mpsc::UnboundedSender<(StreamMessage, MessageId)>;

#[derive(Clone)]
pub struct Dispatcher {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    retry: RetryPolicy,
}

impl Dispatcher {
    pub fn new(client: reqwest::Client, base_url: String, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url,
            api_key,
            retry: RetryPolicy::retry_once(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub(crate) fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    /// Spawn the dispatch matching the request's capability kind.
    pub fn spawn(
        &self,
        request: DispatchRequest,
        tx: StreamSender,
        cancel_token: CancellationToken,
        message_id: MessageId,
    ) {
        match request.kind {
            ModelKind::Text => self.spawn_text_stream(request, tx, cancel_token, message_id),
            ModelKind::Image => self.spawn_image_stream(request, tx, cancel_token, message_id),
        }
    }

    /// Drive one streaming text call, relaying each decoded fragment in
    /// arrival order. The cancellation token is honored at every relay point
    /// and tears down the in-flight request future.
    pub fn spawn_text_stream(
        &self,
        request: DispatchRequest,
        tx: StreamSender,
        cancel_token: CancellationToken,
        message_id: MessageId,
    ) {
        let dispatcher = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = dispatcher.run_text_stream(&request, &tx, &cancel_token, message_id) => {}
                _ = cancel_token.cancelled() => {}
            }
        });
    }

    /// Run a streaming text dispatch inline on the caller's task, for
    /// orchestrators that sequence streams against a single placeholder.
    pub(crate) async fn stream_text_into(
        &self,
        request: &DispatchRequest,
        tx: &StreamSender,
        cancel_token: &CancellationToken,
        message_id: MessageId,
    ) {
        tokio::select! {
            _ = self.run_text_stream(request, tx, cancel_token, message_id) => {}
            _ = cancel_token.cancelled() => {}
        }
    }

    async fn run_text_stream(
        &self,
        request: &DispatchRequest,
        tx: &StreamSender,
        cancel_token: &CancellationToken,
        message_id: MessageId,
    ) {
        let api_messages = build_api_messages(
            &request.messages,
            request.persona.as_deref(),
            request.strict_system_role,
        );

        let response = match self.send_chat_request(&request.model, api_messages, true).await {
            Ok(response) => response,
            Err(reason) => {
                warn!(model = %request.model, error = %reason, "text dispatch failed");
                let _ = tx.send((StreamMessage::Error(stream_error_marker(&reason)), message_id));
                let _ = tx.send((StreamMessage::End, message_id));
                return;
            }
        };

        let mut decoder = SseDecoder::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            if cancel_token.is_cancelled() {
                return;
            }
            let bytes = match chunk {
                Ok(bytes) => bytes,
                Err(err) => {
                    let reason = err.to_string();
                    warn!(model = %request.model, error = %reason, "stream aborted mid-flight");
                    let _ = tx.send((StreamMessage::Error(stream_error_marker(&reason)), message_id));
                    break;
                }
            };
            for fragment in decoder.push_chunk(&bytes) {
                if cancel_token.is_cancelled() {
                    return;
                }
                let _ = tx.send((StreamMessage::Chunk(fragment), message_id));
            }
            if decoder.is_done() {
                break;
            }
        }

        let _ = tx.send((StreamMessage::End, message_id));
    }

    /// Full-response text dispatch for callers racing a timeout. Errors are
    /// returned rather than relayed, and an empty resolved body counts as a
    /// failure.
    pub async fn complete_text(&self, request: &DispatchRequest) -> Result<String, String> {
        let api_messages = build_api_messages(
            &request.messages,
            request.persona.as_deref(),
            request.strict_system_role,
        );

        let response = self
            .send_chat_request(&request.model, api_messages, false)
            .await?;
        let completion = response
            .json::<ChatCompletion>()
            .await
            .map_err(|err| err.to_string())?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();
        if content.trim().is_empty() {
            return Err("empty response body".to_string());
        }
        Ok(content)
    }

    /// Two-phase synthetic image dispatch: a status fragment, then after a
    /// fixed delay the markdown reference. Best-effort single attempt; a
    /// failure to build the reference surfaces nothing.
    pub fn spawn_image_stream(
        &self,
        request: DispatchRequest,
        tx: StreamSender,
        cancel_token: CancellationToken,
        message_id: MessageId,
    ) {
        let prompt = request
            .messages
            .iter()
            .rev()
            .find(|m| m.is_user())
            .map(|m| m.content.clone())
            .filter(|content| !content.is_empty());
        let base_url = self.base_url.clone();
        let model = request.model;

        tokio::spawn(async move {
            let relay = async {
                let Some(prompt) = prompt else {
                    return;
                };
                let _ = tx.send((
                    StreamMessage::Status("Generating image...".to_string()),
                    message_id,
                ));
                tokio::time::sleep(IMAGE_REVEAL_DELAY).await;
                if let Some(url) = build_image_url(&base_url, &prompt, &model, random_seed()) {
                    let _ = tx.send((StreamMessage::Status(format!("![{prompt}]({url})")), message_id));
                }
            };

            tokio::select! {
                _ = relay => {}
                _ = cancel_token.cancelled() => {}
            }
            let _ = tx.send((StreamMessage::End, message_id));
        });
    }

    /// One request per retry-policy slot; success means a 2xx response ready
    /// to stream or parse.
    async fn send_chat_request(
        &self,
        model: &str,
        api_messages: Vec<ApiMessage>,
        stream: bool,
    ) -> Result<reqwest::Response, String> {
        let request = ChatRequest::new(model.to_string(), api_messages, stream);
        let chat_url = construct_api_url(&self.base_url, "v1/chat/completions");

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_send(&chat_url, &request).await {
                Ok(response) => return Ok(response),
                Err(reason) => {
                    if attempt >= self.retry.max_attempts {
                        return Err(reason);
                    }
                    debug!(model, attempt, error = %reason, "chat request failed, retrying");
                    tokio::time::sleep(self.retry.backoff).await;
                }
            }
        }
    }

    async fn try_send(&self, url: &str, request: &ChatRequest) -> Result<reqwest::Response, String> {
        let mut http_request = self
            .client
            .post(url)
            .header("Content-Type", "application/json");
        if let Some(key) = &self.api_key {
            http_request = http_request.header("Authorization", format!("Bearer {key}"));
        }

        let response = http_request
            .json(request)
            .send()
            .await
            .map_err(|err| err.to_string())?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(format!("API error {status}: {}", summarize_api_error(&body)));
        }
        Ok(response)
    }
}

fn stream_error_marker(reason: &str) -> String {
    format!("[Error: {reason}. The model may be overloaded.]")
}

/// Six-digit seed embedded in each image reference so a call is reproducible
/// from its markdown alone.
fn random_seed() -> u32 {
    let mut bytes = [0u8; 4];
    let _ = getrandom::fill(&mut bytes);
    u32::from_le_bytes(bytes) % 1_000_000
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::conversation::ConversationLog;

    fn image_request(prompt_history: Vec<Message>) -> DispatchRequest {
        DispatchRequest {
            messages: prompt_history,
            model: "flux".to_string(),
            persona: None,
            strict_system_role: false,
            kind: ModelKind::Image,
        }
    }

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(
            reqwest::Client::new(),
            "https://gen.pollinations.ai".to_string(),
            None,
        )
    }

    #[test]
    fn retry_policies_differ_in_attempts() {
        assert_eq!(RetryPolicy::retry_once().max_attempts, 2);
        assert_eq!(RetryPolicy::none().max_attempts, 1);
        assert_eq!(RetryPolicy::default(), RetryPolicy::retry_once());
    }

    #[test]
    fn random_seed_stays_in_range() {
        for _ in 0..32 {
            assert!(random_seed() < 1_000_000);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn image_dispatch_yields_status_then_markdown() {
        let mut log = ConversationLog::new();
        log.push_user("a red fox");
        let history = log.history();
        let placeholder = log.push_placeholder(Some("flux".into()));

        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel_token = CancellationToken::new();
        dispatcher().spawn_image_stream(image_request(history), tx, cancel_token, placeholder);

        let mut events = Vec::new();
        while let Some((message, id)) = rx.recv().await {
            assert_eq!(id, placeholder);
            let done = matches!(message, StreamMessage::End);
            events.push(message);
            if done {
                break;
            }
        }

        assert_eq!(events.len(), 3);
        match &events[0] {
            StreamMessage::Status(text) => assert_eq!(text, "Generating image..."),
            other => panic!("expected status, got {other:?}"),
        }
        match &events[1] {
            StreamMessage::Status(text) => {
                assert!(text.starts_with("![a red fox](https://gen.pollinations.ai/image/"));
                assert!(text.contains("model=flux"));
                assert!(text.contains("nologo=true"));
                assert!(text.contains("seed="));
            }
            other => panic!("expected markdown status, got {other:?}"),
        }
        assert!(matches!(events[2], StreamMessage::End));
    }

    #[tokio::test(start_paused = true)]
    async fn image_dispatch_without_user_prompt_only_ends() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel_token = CancellationToken::new();
        dispatcher().spawn_image_stream(
            image_request(Vec::new()),
            tx,
            cancel_token,
            MessageId(7),
        );

        let (message, _) = rx.recv().await.expect("expected end event");
        assert!(matches!(message, StreamMessage::End));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_image_dispatch_stops_before_markdown() {
        let mut log = ConversationLog::new();
        log.push_user("a castle");
        let history = log.history();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel_token = CancellationToken::new();
        dispatcher().spawn_image_stream(
            image_request(history),
            tx,
            cancel_token.clone(),
            MessageId(1),
        );

        let (first, _) = rx.recv().await.expect("status event");
        assert!(matches!(first, StreamMessage::Status(_)));
        cancel_token.cancel();

        let (second, _) = rx.recv().await.expect("end event");
        assert!(matches!(second, StreamMessage::End));
        assert!(rx.recv().await.is_none());
    }
}
