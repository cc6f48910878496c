//! Council mode: gather candidate answers, then have a judge synthesize.
//!
//! Two phases against a single "deliberating" placeholder. Phase 1 races
//! every roster member's full-response dispatch against a hard per-model
//! deadline; a member timing out or erroring becomes a failure sentinel, not
//! an abort. Phase 2 streams one judge dispatch whose sole input is the
//! assembled candidate transcript. The judge never starts before every racer
//! has settled.

use futures_util::future::join_all;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::catalog::ModelKind;
use crate::core::chat_stream::StreamMessage;
use crate::core::constants::{COUNCIL_ANSWER_TIMEOUT, COUNCIL_JUDGE_MODEL};
use crate::core::dispatch::{DispatchRequest, Dispatcher, RetryPolicy, StreamSender};
use crate::core::message::{Message, MessageId};

pub const DELIBERATING_STATUS: &str = "The council is deliberating...";
pub const DISBANDED_MESSAGE: &str =
    "The council was disbanded before reaching a verdict. Please try again.";

const JUDGE_PERSONA: &str = "You are the presiding judge of a council of AI models. \
You receive a user query and several candidate answers. Weigh them on accuracy, \
completeness, and clarity, then deliver the single best final answer. Do not \
mention the council, the candidates, or your own role.";

/// One candidate's outcome: the model's full answer, or the reason it
/// failed. Consumed immediately to build the judge prompt.
#[derive(Debug)]
pub struct CouncilResult {
    pub model: String,
    pub outcome: Result<String, String>,
}

pub fn failure_sentinel(model: &str) -> String {
    format!("[{model} did not answer]")
}

/// Race one candidate's answer against the fixed per-model deadline.
pub async fn race_candidate<F>(model: String, answer: F) -> CouncilResult
where
    F: std::future::Future<Output = Result<String, String>>,
{
    let outcome = match timeout(COUNCIL_ANSWER_TIMEOUT, answer).await {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(reason)) => {
            warn!(model = %model, error = %reason, "council candidate failed");
            Err(reason)
        }
        Err(_) => {
            warn!(model = %model, "council candidate timed out");
            Err(format!(
                "timed out after {}s",
                COUNCIL_ANSWER_TIMEOUT.as_secs()
            ))
        }
    };
    CouncilResult { model, outcome }
}

/// Phase 1: run every racer concurrently and resolve only when all have
/// settled. Racers get a single attempt; the deadline is their retry budget.
pub async fn gather_candidates(
    dispatcher: &Dispatcher,
    requests: Vec<DispatchRequest>,
) -> Vec<CouncilResult> {
    let racer = dispatcher.clone().with_retry(RetryPolicy::none());
    let races = requests.into_iter().map(|request| {
        let racer = racer.clone();
        async move {
            let model = request.model.clone();
            race_candidate(model, async move { racer.complete_text(&request).await }).await
        }
    });
    join_all(races).await
}

/// Assemble the judge prompt: the literal user query, each candidate's
/// labeled answer in roster order (failures carry their sentinel), then the
/// synthesis instruction.
pub fn build_judge_prompt(query: &str, results: &[CouncilResult]) -> Result<String, String> {
    if results.is_empty() {
        return Err("no council candidates gathered".to_string());
    }

    let mut prompt = format!("User query:\n{query}\n");
    for result in results {
        let answer = match &result.outcome {
            Ok(text) => text.clone(),
            Err(_) => failure_sentinel(&result.model),
        };
        prompt.push_str(&format!("\n--- Answer from {} ---\n{}\n", result.model, answer));
    }
    prompt.push_str(
        "\nSynthesize the best possible final answer to the user query from the \
         candidate answers above. Ignore candidates marked as failed. Respond \
         with the final answer only.",
    );
    Ok(prompt)
}

/// Run the full council against the given placeholder. The caller has
/// already posted the placeholder; this sends the deliberating status,
/// gathers candidates, then streams the judge's synthesis into it.
pub fn spawn_council(
    dispatcher: &Dispatcher,
    racer_requests: Vec<DispatchRequest>,
    query: String,
    judge_persona_strict: bool,
    tx: StreamSender,
    cancel_token: CancellationToken,
    placeholder: MessageId,
) {
    let dispatcher = dispatcher.clone();
    tokio::spawn(async move {
        let _ = tx.send((
            StreamMessage::Status(DELIBERATING_STATUS.to_string()),
            placeholder,
        ));

        let run = run_council(
            &dispatcher,
            racer_requests,
            &query,
            judge_persona_strict,
            &tx,
            &cancel_token,
            placeholder,
        );
        if let Err(reason) = run.await {
            warn!(error = %reason, "council orchestration failed");
            let _ = tx.send((StreamMessage::Status(DISBANDED_MESSAGE.to_string()), placeholder));
            let _ = tx.send((StreamMessage::End, placeholder));
        }
    });
}

async fn run_council(
    dispatcher: &Dispatcher,
    racer_requests: Vec<DispatchRequest>,
    query: &str,
    judge_persona_strict: bool,
    tx: &StreamSender,
    cancel_token: &CancellationToken,
    placeholder: MessageId,
) -> Result<(), String> {
    // Hard barrier: racers are deadline-bound, not cancellation-bound, and
    // the judge must not start until every one of them has settled.
    let results = gather_candidates(dispatcher, racer_requests).await;
    debug!(
        settled = results.len(),
        failed = results.iter().filter(|r| r.outcome.is_err()).count(),
        "council fan-out settled"
    );

    if cancel_token.is_cancelled() {
        return Ok(());
    }

    let judge_prompt = build_judge_prompt(query, &results)?;
    let judge_request = DispatchRequest {
        messages: vec![Message::user(MessageId(0), judge_prompt)],
        model: COUNCIL_JUDGE_MODEL.to_string(),
        persona: Some(JUDGE_PERSONA.to_string()),
        strict_system_role: judge_persona_strict,
        kind: ModelKind::Text,
    };

    dispatcher
        .clone()
        .with_retry(RetryPolicy::retry_once())
        .stream_text_into(&judge_request, tx, cancel_token, placeholder)
        .await;
    Ok(())
}
