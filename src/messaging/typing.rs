//! Typing-indicator relay.
//!
//! Fire-and-forget: the server keeps no typing state, performs no
//! de-duplication (the sending client debounces), and never retries a missed
//! event. The signal is delivered to the other conversation participant's
//! live connections or silently dropped.

use crate::messaging::keys;
use crate::state::AppState;
use crate::ws::broadcast::send_to_user;
use crate::ws::protocol::ServerEvent;

/// Relay a typing signal from `sender_id` to the other participant in the
/// conversation. A sender outside the conversation is ignored.
pub fn relay_typing(state: &AppState, sender_id: &str, conversation_id: &str, is_typing: bool) {
    let Some(other) = keys::counterpart(conversation_id, sender_id) else {
        tracing::debug!(
            conversation_id = %conversation_id,
            "typing signal from non-participant dropped"
        );
        return;
    };

    send_to_user(
        &state.connections,
        other,
        &ServerEvent::UserTyping {
            conversation_id: conversation_id.to_string(),
            is_typing,
        },
    );
}
