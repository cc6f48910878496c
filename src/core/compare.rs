//! Compare mode: the same prompt fanned out across the flagship roster.
//!
//! Every roster member gets its own placeholder and its own independent
//! dispatch; a member failing only marks its own placeholder, and the
//! operation settles once every member's stream has ended.

use tokio_util::sync::CancellationToken;

use crate::core::catalog::{ModelCatalog, ModelKind};
use crate::core::constants::FLAGSHIP_ROSTER;
use crate::core::dispatch::{DispatchRequest, Dispatcher, StreamSender};
use crate::core::message::{Message, MessageId};

/// Build one text dispatch request per roster member over the same settled
/// history snapshot. Sibling placeholders are not part of the snapshot, so
/// no member ever sees another's partial output.
pub fn roster_requests(history: &[Message], catalog: &ModelCatalog) -> Vec<DispatchRequest> {
    FLAGSHIP_ROSTER
        .iter()
        .map(|model| DispatchRequest {
            messages: history.to_vec(),
            model: model.to_string(),
            persona: catalog.persona_for(model),
            strict_system_role: catalog.strict_system_role(model),
            kind: ModelKind::Text,
        })
        .collect()
}

/// Launch every paired dispatch concurrently. Each request streams into the
/// placeholder it is paired with; all of them share the operation's
/// cancellation token.
pub fn spawn_compare(
    dispatcher: &Dispatcher,
    requests: Vec<(DispatchRequest, MessageId)>,
    tx: StreamSender,
    cancel_token: CancellationToken,
) {
    for (request, message_id) in requests {
        dispatcher.spawn_text_stream(request, tx.clone(), cancel_token.clone(), message_id);
    }
}
