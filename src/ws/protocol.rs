//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};

use crate::game::SimulationState;

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Open a room; the sender becomes slot 1
    NewGame,

    /// Take slot 2 in an existing room
    JoinGame {
        /// Room code shared by slot 1
        code: String,
    },

    /// Movement intent
    Keydown {
        /// Browser key code, e.g. "ArrowLeft"
        key: String,
    },
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Which participant the client is (1 or 2)
    Init { number: u8 },

    /// Code slot 1 shares with its opponent
    GameCode { code: String },

    /// World after a tick (sent every tick while active)
    GameState {
        tick: u64,
        state: SimulationState,
    },

    /// Terminal message of a match
    GameOver { winner: u8 },

    /// Join referenced a room without live members
    UnknownGame,

    /// Join referenced a room that is already full
    TooManyPlayers,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_client_messages() {
        let msg: ClientMsg = serde_json::from_str(r#"{"type":"new_game"}"#).unwrap();
        assert!(matches!(msg, ClientMsg::NewGame));

        let msg: ClientMsg =
            serde_json::from_str(r#"{"type":"join_game","code":"abc"}"#).unwrap();
        assert!(matches!(msg, ClientMsg::JoinGame { code } if code == "abc"));

        let msg: ClientMsg =
            serde_json::from_str(r#"{"type":"keydown","key":"ArrowUp"}"#).unwrap();
        assert!(matches!(msg, ClientMsg::Keydown { key } if key == "ArrowUp"));
    }

    #[test]
    fn rejects_unknown_client_messages() {
        assert!(serde_json::from_str::<ClientMsg>(r#"{"type":"fly"}"#).is_err());
        assert!(serde_json::from_str::<ClientMsg>(r#"{"type":"join_game"}"#).is_err());
    }

    #[test]
    fn server_messages_are_tagged() {
        let json = serde_json::to_value(ServerMsg::GameOver { winner: 2 }).unwrap();
        assert_eq!(json, serde_json::json!({"type": "game_over", "winner": 2}));

        let json = serde_json::to_value(ServerMsg::TooManyPlayers).unwrap();
        assert_eq!(json, serde_json::json!({"type": "too_many_players"}));

        let json = serde_json::to_value(ServerMsg::GameState {
            tick: 4,
            state: SimulationState::new(10),
        })
        .unwrap();
        assert_eq!(json["type"], "game_state");
        assert_eq!(json["tick"], 4);
        assert_eq!(json["state"]["grid_size"], 10);
    }
}
