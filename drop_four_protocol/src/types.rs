// Core value types shared by the relay and its clients.
//
// `ConnectionId` is the relay-assigned handle for one connected client. The
// board types (`Cell`, `Board`, `Position`) mirror the JSON shape browsers
// already speak: a 6x7 row-major grid whose cells are `0`, `"yellow"` or
// `"red"`. The relay never interprets the board beyond resetting it; moves
// are relayed as opaque positions.

use serde::{Deserialize, Serialize};

/// Number of rows on the board.
pub const BOARD_ROWS: usize = 6;

/// Number of columns on the board.
pub const BOARD_COLS: usize = 7;

/// Relay-assigned connection handle (compact u32, never reused while the
/// relay is running).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(pub u32);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Piece colour. Player 1 is always yellow, player 2 always red.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Colour {
    Yellow,
    Red,
}

/// One board cell. Serialized as `0` when empty, otherwise as the colour
/// name.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawCell", into = "RawCell")]
pub enum Cell {
    #[default]
    Empty,
    Piece(Colour),
}

/// Wire shape of a cell, before the `0`-only check.
#[derive(Clone, Copy, Serialize, Deserialize)]
#[serde(untagged)]
enum RawCell {
    Number(u8),
    Piece(Colour),
}

impl TryFrom<RawCell> for Cell {
    type Error = String;

    fn try_from(raw: RawCell) -> Result<Self, Self::Error> {
        match raw {
            RawCell::Number(0) => Ok(Cell::Empty),
            RawCell::Number(n) => Err(format!("invalid empty cell marker {n}, expected 0")),
            RawCell::Piece(colour) => Ok(Cell::Piece(colour)),
        }
    }
}

impl From<Cell> for RawCell {
    fn from(cell: Cell) -> Self {
        match cell {
            Cell::Empty => RawCell::Number(0),
            Cell::Piece(colour) => RawCell::Piece(colour),
        }
    }
}

/// The 6x7 playing grid, row-major.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board(pub [[Cell; BOARD_COLS]; BOARD_ROWS]);

impl Board {
    /// A board with every cell empty.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().flatten().all(|cell| *cell == Cell::Empty)
    }
}

/// A tile placement as sent by the client. Not validated by the relay.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}
