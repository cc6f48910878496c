//! Heuristic model selection for Auto mode.
//!
//! A pure, deterministic classifier over the raw prompt text. No rendering
//! state, no network, no learning: the same input always routes to the same
//! model.

use std::sync::LazyLock;

use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    ImageGeneration,
    Technical,
    Reasoning,
    Conversational,
}

static IMAGE_INTENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(draw|generate|create|make).*(image|picture|photo|painting|sketch)")
        .expect("valid image intent pattern")
});

static TECHNICAL_VOCAB: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(code|function|script|algorithm|bug|error|exception|stack trace|python|javascript|typescript|react|html|css|sql|json|api)",
    )
    .expect("valid technical vocabulary pattern")
});

static REASONING_VOCAB: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(explain|summarize|write|essay|story|poem|analysis|compare|difference between|plan)")
        .expect("valid reasoning vocabulary pattern")
});

/// Classify a prompt. First match wins, case-insensitive.
pub fn classify_prompt(text: &str) -> TaskKind {
    let lower = text.to_lowercase();

    if IMAGE_INTENT.is_match(&lower)
        || lower.starts_with("image of")
        || lower.contains("generate an image")
    {
        return TaskKind::ImageGeneration;
    }

    if TECHNICAL_VOCAB.is_match(&lower) || lower.contains("how to fix") {
        return TaskKind::Technical;
    }

    if REASONING_VOCAB.is_match(&lower) {
        return TaskKind::Reasoning;
    }

    TaskKind::Conversational
}

/// The concrete model Auto mode targets for a task kind.
pub fn model_for(kind: TaskKind) -> &'static str {
    match kind {
        TaskKind::ImageGeneration => "flux",
        TaskKind::Technical => "deepseek",
        TaskKind::Reasoning => "claude",
        TaskKind::Conversational => "grok",
    }
}

/// Resolve a raw prompt straight to the model Auto mode should dispatch to.
pub fn resolve_auto_model(text: &str) -> &'static str {
    model_for(classify_prompt(text))
}
