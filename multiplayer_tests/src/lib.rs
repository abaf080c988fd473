// Test-only player for multiplayer integration tests.
//
// Wraps the real `NetClient` (from `drop_four_relay::client`) with a
// synchronous, test-friendly API: typed senders that panic on I/O failure,
// and blocking `expect`/`poll_until` loops around `NetClient::poll()`.
// Each player also keeps a local board mirror, filled from its own moves and
// the opponent's relayed `place-tile` events, so tests can build realistic
// end-of-game snapshots for a rematch.
//
// Messages that arrive while waiting for something else are kept in a
// backlog and matched by later calls, so cross-player ordering never drops
// an event on the floor.
//
// See also: `tests/full_pipeline.rs` for the integration test scenarios.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::thread;
use std::time::{Duration, Instant};

use drop_four_protocol::{
    BOARD_COLS, BOARD_ROWS, Board, Cell, Colour, GameSnapshot, PlayerSnapshot, Position,
    ServerMessage,
};
use drop_four_relay::client::NetClient;

/// Default timeout for blocking poll operations.
const POLL_TIMEOUT: Duration = Duration::from_secs(5);

/// Sleep duration between poll attempts.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How long `expect_quiet` listens before concluding nothing is coming.
const QUIET_WINDOW: Duration = Duration::from_millis(150);

/// A test player wrapping a real NetClient.
pub struct TestPlayer {
    client: NetClient,
    pub name: String,
    pub colour: Colour,
    pub board: Board,
    backlog: VecDeque<ServerMessage>,
}

impl TestPlayer {
    /// Connect to a relay. `colour` is the piece this player drops; it only
    /// affects the local board mirror.
    pub fn connect(addr: SocketAddr, name: &str, colour: Colour) -> Self {
        let client = NetClient::connect(&addr.to_string()).expect("TestPlayer::connect failed");
        Self {
            client,
            name: name.into(),
            colour,
            board: Board::empty(),
            backlog: VecDeque::new(),
        }
    }

    pub fn join(&mut self, room_id: &str) {
        self.client.join(room_id, &self.name).expect("join failed");
    }

    pub fn ready(&mut self) {
        self.client.ready(&self.name).expect("ready failed");
    }

    /// Send a move and record it on the local board.
    pub fn place(&mut self, x: i32, y: i32) {
        self.client.place_tile(x, y).expect("place_tile failed");
        mark(&mut self.board, Position { x, y }, self.colour);
    }

    pub fn win(&mut self) {
        self.client.win().expect("win failed");
    }

    pub fn new_game(&mut self, finished: GameSnapshot) {
        self.client.new_game(finished).expect("new_game failed");
        self.board = Board::empty();
    }

    pub fn leave(&mut self) {
        self.client.leave().expect("leave failed");
    }

    /// Close the connection without a `leave`.
    pub fn disconnect(&mut self) {
        self.client.disconnect();
    }

    /// Blocking poll until a message matching `pred` arrives. Earlier
    /// non-matching messages stay in the backlog.
    pub fn poll_until(
        &mut self,
        what: &str,
        pred: impl Fn(&ServerMessage) -> bool,
    ) -> ServerMessage {
        let start = Instant::now();
        loop {
            self.pump();
            let found = self.backlog.iter().position(&pred);
            if let Some(msg) = found.and_then(|idx| self.backlog.remove(idx)) {
                return msg;
            }
            assert!(
                start.elapsed() < POLL_TIMEOUT,
                "{}: timed out waiting for {what}; backlog: {:?}",
                self.name,
                self.backlog
            );
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Blocking poll until exactly `expected` arrives.
    pub fn expect(&mut self, expected: ServerMessage) {
        let what = format!("{expected:?}");
        self.poll_until(&what, |msg| *msg == expected);
    }

    /// Assert nothing (new or backlogged) arrives within a short window.
    pub fn expect_quiet(&mut self) {
        thread::sleep(QUIET_WINDOW);
        self.pump();
        assert!(
            self.backlog.is_empty(),
            "{}: expected no messages, got {:?}",
            self.name,
            self.backlog
        );
    }

    /// Non-blocking: take everything received so far.
    pub fn drain(&mut self) -> Vec<ServerMessage> {
        self.pump();
        self.backlog.drain(..).collect()
    }

    /// The snapshot this player would send with `new-game` after a finished
    /// game against `opponent`, with this player as player 1.
    pub fn finished_snapshot(&self, room_id: &str, opponent: &TestPlayer) -> GameSnapshot {
        GameSnapshot {
            room_id: room_id.into(),
            board: self.board,
            player1: PlayerSnapshot {
                username: self.name.clone(),
                colour: self.colour,
                my_turn: false,
            },
            player2: Some(PlayerSnapshot {
                username: opponent.name.clone(),
                colour: opponent.colour,
                my_turn: true,
            }),
            started: true,
            gameover: true,
        }
    }

    /// Move newly received messages into the backlog, mirroring relayed
    /// opponent moves onto the local board.
    fn pump(&mut self) {
        let opponent = match self.colour {
            Colour::Yellow => Colour::Red,
            Colour::Red => Colour::Yellow,
        };
        for msg in self.client.poll() {
            match &msg {
                ServerMessage::PlaceTile(pos) => mark(&mut self.board, *pos, opponent),
                ServerMessage::NewGame(_) => self.board = Board::empty(),
                _ => {}
            }
            self.backlog.push_back(msg);
        }
    }
}

/// Put a piece at `pos` (x = column, y = row) if it is on the board.
fn mark(board: &mut Board, pos: Position, colour: Colour) {
    let (Ok(col), Ok(row)) = (usize::try_from(pos.x), usize::try_from(pos.y)) else {
        return;
    };
    if row < BOARD_ROWS && col < BOARD_COLS {
        board.0[row][col] = Cell::Piece(colour);
    }
}
