// Connection coordinator: the single dispatch point for client events.
//
// `Coordinator` owns every connection's write half plus the two registries
// (`SessionRegistry`, `GameRegistry`). `server.rs` drives it from one thread,
// so each event runs to completion before the next and nothing here locks.
//
// Event handling:
// - `join`       : create-or-attach session, `joined(name)` to the others.
// - `place-tile` : relayed verbatim to the sender's session, minus sender.
// - `ready`      : create-or-attach the session's game; `game-full` back to
//                  the sender when both seats are taken.
// - `win`        : `win` to every member incl. sender.
// - `new-game`   : rematch if the submitted game is over; the submitted
//                  (pre-reset) snapshot is relayed to the others.
// - `leave` and disconnect: drop the handle from every session; sessions
//   left empty are destroyed together with their game. Only disconnect
//   forgets the handle's recorded session, so a handle that left still
//   relays `place-tile`/`win` to whoever remains in that room.
//
// Relays are always scoped to the session the sender joined, never to an id
// found in a payload. A sender that never joined has no audience and the
// event is dropped with a debug log. Games are only created or restarted for
// a session that still exists.
//
// The game's `over` flag set on `win` is bookkeeping for inspection only:
// relaying never depends on it, and `new-game` trusts the submitted
// snapshot's `gameover`.
//
// A failed write (including a write timeout on a peer that stopped reading)
// drops the connection's write half so later events skip it; the reader
// thread reports the disconnect once the socket closes.

use std::collections::BTreeMap;
use std::io::Write;

use drop_four_protocol::{
    ClientMessage, ConnectionId, GameSnapshot, Position, ServerMessage, write_message,
};
use tracing::{debug, info, warn};

use crate::games::{GameRegistry, ReadyOutcome, RestartOutcome};
use crate::sessions::SessionRegistry;

struct Connection {
    writer: Box<dyn Write + Send>,
}

#[derive(Default)]
pub struct Coordinator {
    connections: BTreeMap<ConnectionId, Connection>,
    sessions: SessionRegistry,
    games: GameRegistry,
}

impl Coordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly connected client and the stream its events go to.
    pub fn connect<W: Write + Send + 'static>(&mut self, handle: ConnectionId, writer: W) {
        self.connections.insert(
            handle,
            Connection {
                writer: Box::new(writer),
            },
        );
        info!(conn = %handle, "user connected");
    }

    /// Transport-level disconnect: leave everything and forget the handle.
    pub fn disconnect(&mut self, handle: ConnectionId) {
        self.leave(handle);
        self.sessions.forget(handle);
        if self.connections.remove(&handle).is_some() {
            info!(conn = %handle, "user disconnected");
        }
    }

    pub fn handle_message(&mut self, handle: ConnectionId, message: ClientMessage) {
        debug!(conn = %handle, event = message.event_name(), "event received");
        match message {
            ClientMessage::Join(request) => self.join(handle, &request.room_id, request.username),
            ClientMessage::PlaceTile(position) => self.place_tile(handle, position),
            ClientMessage::Ready(username) => self.ready(handle, username),
            ClientMessage::Win => self.win(handle),
            ClientMessage::NewGame(prior) => self.new_game(handle, prior),
            ClientMessage::Leave => self.leave(handle),
        }
    }

    pub fn join(&mut self, handle: ConnectionId, session_id: &str, username: String) {
        let outcome = self.sessions.ensure_and_join(session_id, handle);
        self.discard_games(&outcome.reclaimed);
        info!(conn = %handle, session = session_id, user = %username, "joined room");
        self.send_to_others(session_id, handle, &ServerMessage::Joined(username));
    }

    pub fn place_tile(&mut self, handle: ConnectionId, position: Position) {
        let Some(session_id) = self.joined_session(handle, "place-tile") else {
            return;
        };
        debug!(conn = %handle, session = %session_id, x = position.x, y = position.y, "relaying tile");
        self.send_to_others(&session_id, handle, &ServerMessage::PlaceTile(position));
    }

    pub fn ready(&mut self, handle: ConnectionId, username: String) {
        let Some(session_id) = self.live_session(handle, "ready") else {
            return;
        };
        if self.games.ready(&session_id, handle, username) == ReadyOutcome::Full {
            info!(conn = %handle, session = %session_id, "game is full");
            self.send_to(handle, &ServerMessage::GameFull);
        }
    }

    pub fn win(&mut self, handle: ConnectionId) {
        let Some(session_id) = self.joined_session(handle, "win") else {
            return;
        };
        self.games.finish(&session_id);
        self.send_to_all(&session_id, &ServerMessage::Win);
    }

    pub fn new_game(&mut self, handle: ConnectionId, prior: GameSnapshot) {
        let Some(session_id) = self.live_session(handle, "new-game") else {
            return;
        };
        match self.games.restart_game(&session_id, &prior) {
            RestartOutcome::Restarted => {
                self.send_to_others(&session_id, handle, &ServerMessage::NewGame(prior));
            }
            RestartOutcome::NotOver => {
                info!(conn = %handle, "received new game, but gameover is false");
            }
        }
    }

    pub fn leave(&mut self, handle: ConnectionId) {
        let destroyed = self.sessions.leave_all(handle);
        self.discard_games(&destroyed);
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn games(&self) -> &GameRegistry {
        &self.games
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    fn joined_session(&self, handle: ConnectionId, event: &str) -> Option<String> {
        let session_id = self.sessions.session_of(handle).map(str::to_owned);
        if session_id.is_none() {
            debug!(conn = %handle, event, "sender has not joined a room; dropped");
        }
        session_id
    }

    /// Like `joined_session`, but only while that session still exists.
    fn live_session(&self, handle: ConnectionId, event: &str) -> Option<String> {
        let session_id = self.joined_session(handle, event)?;
        if !self.sessions.contains(&session_id) {
            debug!(conn = %handle, session = %session_id, event, "room is gone; dropped");
            return None;
        }
        Some(session_id)
    }

    fn discard_games(&mut self, destroyed: &[String]) {
        for session_id in destroyed {
            self.games.remove(session_id);
        }
    }

    fn send_to(&mut self, handle: ConnectionId, msg: &ServerMessage) {
        let Some(conn) = self.connections.get_mut(&handle) else {
            return;
        };
        let written = msg
            .encode()
            .and_then(|bytes| write_message(&mut conn.writer, &bytes));
        if let Err(e) = written {
            warn!(conn = %handle, error = %e, "write failed; no longer sending to this connection");
            self.connections.remove(&handle);
        }
    }

    fn send_to_others(&mut self, session_id: &str, sender: ConnectionId, msg: &ServerMessage) {
        for member in self.sessions.members(session_id) {
            if member != sender {
                self.send_to(member, msg);
            }
        }
    }

    fn send_to_all(&mut self, session_id: &str, msg: &ServerMessage) {
        for member in self.sessions.members(session_id) {
            self.send_to(member, msg);
        }
    }
}
