//! JSON wire protocol spoken over the realtime WebSocket.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::domain::{ActionId, GameSnapshot};

pub const PROTOCOL_VERSION: i32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Topic {
    /// Snapshot-changed events for one game.
    Game { code: String },
    /// Join/leave/heartbeat events for the players of one game.
    Presence { code: String },
}

impl Topic {
    pub fn game(code: &str) -> Self {
        Topic::Game {
            code: code.to_string(),
        }
    }

    pub fn presence(code: &str) -> Self {
        Topic::Presence {
            code: code.to_string(),
        }
    }

    pub fn channel_name(&self) -> String {
        match self {
            Topic::Game { code } => format!("game:{code}"),
            Topic::Presence { code } => format!("presence:game:{code}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    Hello {
        protocol: i32,
    },
    Subscribe {
        topic: Topic,
    },
    Unsubscribe {
        topic: Topic,
    },
    Track {
        player_name: String,
        #[serde(with = "time::serde::rfc3339")]
        online_at: OffsetDateTime,
    },
    Broadcast {
        event: String,
        payload: Value,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceKind {
    Join,
    Leave,
    Heartbeat,
}

#[allow(clippy::large_enum_variant)]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    HelloAck {
        protocol: i32,
    },

    Ack {
        message: String,
    },

    Heartbeat,

    GameState {
        topic: Topic,
        snapshot: GameSnapshot,
    },

    Presence {
        event: PresenceKind,
        player_name: String,
        #[serde(with = "time::serde::rfc3339")]
        timestamp: OffsetDateTime,
    },

    ActionResult {
        action_id: ActionId,
        #[serde(default)]
        error: Option<String>,
    },

    Error {
        code: String,
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn topics_serialize_with_kind_tag() {
        let topic = Topic::game("ABCD");
        assert_eq!(
            serde_json::to_value(&topic).unwrap(),
            json!({ "kind": "game", "code": "ABCD" })
        );
        assert_eq!(topic.channel_name(), "game:ABCD");
        assert_eq!(Topic::presence("ABCD").channel_name(), "presence:game:ABCD");
    }

    #[test]
    fn server_presence_message_decodes() {
        let raw = json!({
            "type": "presence",
            "event": "join",
            "player_name": "ana",
            "timestamp": "2024-03-01T12:00:00Z"
        });
        let msg: ServerMsg = serde_json::from_value(raw).unwrap();
        assert!(matches!(
            msg,
            ServerMsg::Presence { event: PresenceKind::Join, ref player_name, .. } if player_name == "ana"
        ));
    }

    #[test]
    fn action_result_error_is_optional() {
        let raw = json!({ "type": "action_result", "action_id": "a-1" });
        let msg: ServerMsg = serde_json::from_value(raw).unwrap();
        assert!(matches!(msg, ServerMsg::ActionResult { error: None, .. }));
    }
}
