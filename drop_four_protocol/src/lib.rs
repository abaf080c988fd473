// drop_four_protocol — wire protocol for the Drop Four session relay.
//
// Shared between the relay (`drop_four_relay`) and anything that talks to it.
// No networking and no relay state lives here.
//
// Module overview:
// - `types.rs`:    `ConnectionId`, `Colour`, and the board value types
//                  (`Cell`, `Board`, `Position`) with their browser-facing
//                  JSON encoding.
// - `message.rs`:  `ClientMessage` / `ServerMessage` event enums and the
//                  `GameSnapshot` shape carried by `new-game`.
// - `framing.rs`:  4-byte big-endian length prefix + JSON payload over any
//                  `Read`/`Write`.
// - `error.rs`:    `ProtocolError`, including the `MalformedPayload`
//                  rejection produced at the decode boundary.

pub mod error;
pub mod framing;
pub mod message;
pub mod types;

pub use error::ProtocolError;
pub use framing::{MAX_MESSAGE_SIZE, read_message, recv, send, write_message};
pub use message::{ClientMessage, GameSnapshot, JoinRequest, PlayerSnapshot, ServerMessage};
pub use types::{BOARD_COLS, BOARD_ROWS, Board, Cell, Colour, ConnectionId, Position};
