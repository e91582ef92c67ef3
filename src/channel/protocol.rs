//! Real-time channel message protocol
//!
//! Every message is a JSON envelope `{"event": <topic>, "data": <payload>}`.
//! Topic names are shared with the classifier server and must not change:
//! `process_command` goes out; `action_update`, `error` and
//! `activate_listening` come in.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::dispatch::Response;

use super::client::ChannelError;

/// Outbound topic carrying a transcript
pub const PROCESS_COMMAND: &str = "process_command";
/// Inbound topic carrying a classifier response
pub const ACTION_UPDATE: &str = "action_update";
/// Inbound topic carrying a server-side failure
pub const ERROR: &str = "error";
/// Inbound topic sent when the server heard the wake phrase
pub const ACTIVATE_LISTENING: &str = "activate_listening";

/// Messages from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Classify this transcript
    ProcessCommand { text: String },
}

/// Messages from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Classification result for the last command
    ActionUpdate(Response),

    /// The server failed to handle the last command
    Error { message: String },

    /// Wake phrase detected server-side; open the mic
    ActivateListening {
        #[serde(default)]
        message: Option<String>,
    },
}

#[derive(Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Default, Deserialize)]
struct MessagePayload {
    #[serde(default)]
    message: Option<String>,
}

/// Decode one inbound message. Unknown topics decode to `None`.
pub fn decode_server_message(bytes: &[u8]) -> Result<Option<ServerMessage>, ChannelError> {
    let envelope: Envelope = serde_json::from_slice(bytes)?;

    let message = match envelope.event.as_str() {
        ACTION_UPDATE => {
            let response = if envelope.data.is_null() {
                Response::default()
            } else {
                serde_json::from_value(envelope.data)?
            };
            ServerMessage::ActionUpdate(response)
        }
        ERROR => {
            let payload = message_payload(envelope.data)?;
            ServerMessage::Error {
                message: payload
                    .message
                    .unwrap_or_else(|| "Unknown error".to_string()),
            }
        }
        ACTIVATE_LISTENING => ServerMessage::ActivateListening {
            message: message_payload(envelope.data)?.message,
        },
        other => {
            warn!(topic = other, "ignoring message on unknown topic");
            return Ok(None);
        }
    };

    Ok(Some(message))
}

fn message_payload(data: serde_json::Value) -> Result<MessagePayload, ChannelError> {
    if data.is_null() {
        return Ok(MessagePayload::default());
    }
    Ok(serde_json::from_value(data)?)
}
