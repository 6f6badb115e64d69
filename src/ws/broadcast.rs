use axum::extract::ws::Message;

use super::ConnectionRegistry;
use crate::ws::protocol::ServerEvent;

/// Send an event to a specific participant (all their live connections).
/// A participant with no live connections is not an error — the event is
/// simply not delivered and the participant reconciles via REST.
pub fn send_to_user(registry: &ConnectionRegistry, participant_id: &str, event: &ServerEvent) {
    let Ok(json) = serde_json::to_string(event) else {
        return;
    };
    let msg = Message::Text(json.into());

    if let Some(connections) = registry.get(participant_id) {
        for sender in connections.value().iter() {
            let _ = sender.send(msg.clone());
        }
    }
}
