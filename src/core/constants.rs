//! Shared constants used across the application

use std::time::Duration;

/// Default upstream gateway for chat, image, and model-listing endpoints.
pub const DEFAULT_BASE_URL: &str = "https://gen.pollinations.ai";

/// Flagship text models fanned out to by compare and council modes.
pub const FLAGSHIP_ROSTER: [&str; 5] = ["grok", "openai", "claude", "deepseek", "gemini"];

/// Model that synthesizes the council's final answer.
pub const COUNCIL_JUDGE_MODEL: &str = "openai";

/// Hard per-candidate deadline during council fan-out.
pub const COUNCIL_ANSWER_TIMEOUT: Duration = Duration::from_secs(10);

/// Strict deadline for each model-listing fetch.
pub const MODEL_LIST_TIMEOUT: Duration = Duration::from_secs(3);

/// Pause before the streaming dispatcher's second attempt.
pub const RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// Delay between the image status fragment and the final markdown fragment.
pub const IMAGE_REVEAL_DELAY: Duration = Duration::from_secs(1);
