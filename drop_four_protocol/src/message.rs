// Event vocabulary between browsers/clients and the relay.
//
// - `ClientMessage`: events a client sends to the relay.
// - `ServerMessage`: events the relay sends to clients.
//
// Both are adjacently tagged so a frame reads as
// `{"event": "place-tile", "data": {"x": 3, "y": 5}}`; payload-free events
// carry only `event`. Decoding is strict: unknown events, missing fields and
// mistyped fields all fail with `ProtocolError::MalformedPayload`.
//
// `GameSnapshot` is the client-visible form of a game. It carries no
// connection handles; the relay keeps those in its own `Game` type.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{Board, Colour, Position};

/// Messages sent by a client to the relay.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Join (or create) the named session.
    Join(JoinRequest),
    /// A tile was placed locally; relay it to the opponent.
    PlaceTile(Position),
    /// The player is ready to play under this display name.
    Ready(String),
    /// The sender won; tell everyone in the session.
    Win,
    /// Rematch request carrying the finished game.
    NewGame(GameSnapshot),
    /// Leave every joined session without closing the connection.
    Leave,
}

/// Messages sent by the relay to a client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Another participant joined the session.
    Joined(String),
    /// The opponent placed a tile.
    PlaceTile(Position),
    /// The session already has two players.
    GameFull,
    /// Somebody in the session won.
    Win,
    /// The opponent started a rematch; this is the finished game they sent.
    NewGame(GameSnapshot),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub room_id: String,
    pub username: String,
}

/// Public view of one side of a game.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub username: String,
    pub colour: Colour,
    pub my_turn: bool,
}

/// Public view of a game, as exchanged in `new-game`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    pub room_id: String,
    pub board: Board,
    pub player1: PlayerSnapshot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player2: Option<PlayerSnapshot>,
    pub started: bool,
    pub gameover: bool,
}

impl ClientMessage {
    /// Decode one frame payload.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Event name as it appears on the wire, for logging.
    pub fn event_name(&self) -> &'static str {
        match self {
            ClientMessage::Join(_) => "join",
            ClientMessage::PlaceTile(_) => "place-tile",
            ClientMessage::Ready(_) => "ready",
            ClientMessage::Win => "win",
            ClientMessage::NewGame(_) => "new-game",
            ClientMessage::Leave => "leave",
        }
    }
}

impl ServerMessage {
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}
