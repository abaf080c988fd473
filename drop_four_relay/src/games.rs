// Game registry and the per-session game state machine.
//
// One `Game` may be attached to each session id:
//
//   (none)  --ready-->    AwaitingPlayer2 --ready--> InProgress --win--> Over
//   Over    --new-game--> AwaitingPlayer2, same two players, fresh board
//   any     --session destroyed--> (none)
//
// The relay keeps turn, colour and game-over bookkeeping for inspection
// only. It never checks whose turn it is or whether a placement is legal,
// and a rematch is gated on the client's snapshot, not on `Game::over`;
// clients own the rules. Refusals (`Full`, `NotOver`) are outcomes, not
// errors: the coordinator turns them into events or log lines.

use std::collections::BTreeMap;

use drop_four_protocol::{Board, Colour, ConnectionId, GameSnapshot, PlayerSnapshot};
use tracing::{debug, info};

/// One side of a game.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Participant {
    pub display_name: String,
    pub colour: Colour,
    pub has_turn: bool,
    /// Live connection for this side. `None` when the side was rebuilt from
    /// a client snapshot and no registered game supplied a handle.
    pub handle: Option<ConnectionId>,
}

impl Participant {
    fn player1(handle: ConnectionId, display_name: String) -> Self {
        Self {
            display_name,
            colour: Colour::Yellow,
            has_turn: true,
            handle: Some(handle),
        }
    }

    fn player2(handle: ConnectionId, display_name: String) -> Self {
        Self {
            display_name,
            colour: Colour::Red,
            has_turn: false,
            handle: Some(handle),
        }
    }

    fn from_snapshot(snapshot: &PlayerSnapshot, handle: Option<ConnectionId>) -> Self {
        Self {
            display_name: snapshot.username.clone(),
            colour: snapshot.colour,
            has_turn: snapshot.my_turn,
            handle,
        }
    }

    fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            username: self.display_name.clone(),
            colour: self.colour,
            my_turn: self.has_turn,
        }
    }
}

/// Coarse lifecycle state of a registered game.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GameState {
    AwaitingPlayer2,
    InProgress,
    Over,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Game {
    pub session_id: String,
    pub board: Board,
    pub player1: Participant,
    pub player2: Option<Participant>,
    pub started: bool,
    pub over: bool,
}

/// Result of a `ready` event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadyOutcome {
    /// No game existed; the sender is player 1.
    Created,
    /// The sender became player 2 and the game started.
    Attached,
    /// Both seats were taken; nothing changed.
    Full,
}

/// Result of a `new-game` request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RestartOutcome {
    Restarted,
    /// The submitted game was not finished; nothing changed.
    NotOver,
}

impl Game {
    fn new(session_id: &str, handle: ConnectionId, display_name: String) -> Self {
        Self {
            session_id: session_id.to_owned(),
            board: Board::empty(),
            player1: Participant::player1(handle, display_name),
            player2: None,
            started: false,
            over: false,
        }
    }

    pub fn state(&self) -> GameState {
        if self.over {
            GameState::Over
        } else if self.started {
            GameState::InProgress
        } else {
            GameState::AwaitingPlayer2
        }
    }

    /// Seat `handle` as player 2, or report `Full` without touching the game.
    pub fn attach_second_player(
        &mut self,
        handle: ConnectionId,
        display_name: String,
    ) -> ReadyOutcome {
        if self.player2.is_some() {
            return ReadyOutcome::Full;
        }
        info!(session = %self.session_id, player = %display_name, "player 2 joined game");
        self.player2 = Some(Participant::player2(handle, display_name));
        self.started = true;
        ReadyOutcome::Attached
    }

    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            room_id: self.session_id.clone(),
            board: self.board,
            player1: self.player1.snapshot(),
            player2: self.player2.as_ref().map(Participant::snapshot),
            started: self.started,
            gameover: self.over,
        }
    }
}

/// All games, keyed by the session they belong to.
#[derive(Debug, Default)]
pub struct GameRegistry {
    games: BTreeMap<String, Game>,
}

impl GameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, session_id: &str) -> Option<&Game> {
        self.games.get(session_id)
    }

    /// Create-or-attach on a `ready` event.
    pub fn ready(
        &mut self,
        session_id: &str,
        handle: ConnectionId,
        display_name: String,
    ) -> ReadyOutcome {
        match self.games.get_mut(session_id) {
            Some(game) => game.attach_second_player(handle, display_name),
            None => {
                self.create_game(session_id, handle, display_name);
                ReadyOutcome::Created
            }
        }
    }

    /// Register a fresh game with `handle` as player 1, replacing any game
    /// already registered under `session_id`.
    pub fn create_game(&mut self, session_id: &str, handle: ConnectionId, display_name: String) {
        info!(session = session_id, player = %display_name, "creating game");
        self.games
            .insert(session_id.to_owned(), Game::new(session_id, handle, display_name));
    }

    /// Install a rematch built from a finished game.
    ///
    /// Both players carry over from `prior` unchanged; handles are taken
    /// from the game currently registered under `session_id` since snapshots
    /// do not carry them. The new game has an empty board and is neither
    /// started nor over.
    pub fn restart_game(&mut self, session_id: &str, prior: &GameSnapshot) -> RestartOutcome {
        if !prior.gameover {
            return RestartOutcome::NotOver;
        }
        let current = self.games.get(session_id);
        let handle1 = current.and_then(|g| g.player1.handle);
        let handle2 = current
            .and_then(|g| g.player2.as_ref())
            .and_then(|p| p.handle);

        let game = Game {
            session_id: session_id.to_owned(),
            board: Board::empty(),
            player1: Participant::from_snapshot(&prior.player1, handle1),
            player2: prior
                .player2
                .as_ref()
                .map(|p| Participant::from_snapshot(p, handle2)),
            started: false,
            over: false,
        };
        info!(session = session_id, "game restarted");
        self.games.insert(session_id.to_owned(), game);
        RestartOutcome::Restarted
    }

    /// Mark the session's game as finished. Returns false when there is no
    /// game, it has no second player yet, or it is already over.
    pub fn finish(&mut self, session_id: &str) -> bool {
        match self.games.get_mut(session_id) {
            Some(game) if game.player2.is_some() && !game.over => {
                game.over = true;
                debug!(session = session_id, "game over");
                true
            }
            _ => false,
        }
    }

    /// Drop the game attached to a destroyed session.
    pub fn remove(&mut self, session_id: &str) -> Option<Game> {
        let removed = self.games.remove(session_id);
        if removed.is_some() {
            debug!(session = session_id, "game discarded with its session");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.games.len()
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use drop_four_protocol::Cell;

    use super::*;

    const A: ConnectionId = ConnectionId(1);
    const B: ConnectionId = ConnectionId(2);
    const C: ConnectionId = ConnectionId(3);

    fn started_game(registry: &mut GameRegistry) {
        registry.ready("abc123", A, "alice".into());
        registry.ready("abc123", B, "bob".into());
    }

    #[test]
    fn first_ready_creates_game_with_yellow_player1() {
        let mut registry = GameRegistry::new();
        let outcome = registry.ready("abc123", A, "alice".into());
        assert_eq!(outcome, ReadyOutcome::Created);

        let game = registry.get("abc123").unwrap();
        assert_eq!(game.player1.display_name, "alice");
        assert_eq!(game.player1.colour, Colour::Yellow);
        assert!(game.player1.has_turn);
        assert_eq!(game.player1.handle, Some(A));
        assert!(game.player2.is_none());
        assert!(!game.started);
        assert!(!game.over);
        assert!(game.board.is_empty());
        assert_eq!(game.state(), GameState::AwaitingPlayer2);
    }

    #[test]
    fn second_ready_attaches_red_player2_and_starts() {
        let mut registry = GameRegistry::new();
        registry.ready("abc123", A, "alice".into());
        let outcome = registry.ready("abc123", B, "bob".into());
        assert_eq!(outcome, ReadyOutcome::Attached);

        let game = registry.get("abc123").unwrap();
        let p2 = game.player2.as_ref().unwrap();
        assert_eq!(p2.display_name, "bob");
        assert_eq!(p2.colour, Colour::Red);
        assert!(!p2.has_turn);
        assert!(game.started);
        assert_eq!(game.state(), GameState::InProgress);
    }

    #[test]
    fn third_ready_is_full_and_changes_nothing() {
        let mut registry = GameRegistry::new();
        started_game(&mut registry);
        let before = registry.get("abc123").unwrap().clone();

        let outcome = registry.ready("abc123", C, "carol".into());
        assert_eq!(outcome, ReadyOutcome::Full);
        assert_eq!(registry.get("abc123").unwrap(), &before);
    }

    #[test]
    fn create_game_overwrites_existing_entry() {
        let mut registry = GameRegistry::new();
        started_game(&mut registry);
        registry.create_game("abc123", C, "carol".into());

        let game = registry.get("abc123").unwrap();
        assert_eq!(game.player1.display_name, "carol");
        assert!(game.player2.is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn restart_keeps_players_and_resets_board() {
        let mut registry = GameRegistry::new();
        started_game(&mut registry);
        assert!(registry.finish("abc123"));

        let mut prior = registry.get("abc123").unwrap().snapshot();
        prior.board.0[5][0] = Cell::Piece(Colour::Yellow);

        let outcome = registry.restart_game("abc123", &prior);
        assert_eq!(outcome, RestartOutcome::Restarted);

        let game = registry.get("abc123").unwrap();
        assert_eq!(game.player1.display_name, "alice");
        assert_eq!(game.player1.handle, Some(A));
        let p2 = game.player2.as_ref().unwrap();
        assert_eq!(p2.display_name, "bob");
        assert_eq!(p2.handle, Some(B));
        assert!(!game.started);
        assert!(!game.over);
        assert_eq!(game.board, Board::empty());
    }

    #[test]
    fn restart_of_unfinished_game_is_ignored() {
        let mut registry = GameRegistry::new();
        started_game(&mut registry);
        let before = registry.get("abc123").unwrap().clone();

        let outcome = registry.restart_game("abc123", &before.snapshot());
        assert_eq!(outcome, RestartOutcome::NotOver);
        assert_eq!(registry.get("abc123").unwrap(), &before);
    }

    #[test]
    fn restart_registers_under_given_session_not_snapshot_room() {
        let mut registry = GameRegistry::new();
        started_game(&mut registry);
        registry.finish("abc123");
        let mut prior = registry.get("abc123").unwrap().snapshot();
        prior.room_id = "stale".into();

        registry.restart_game("abc123", &prior);
        assert!(registry.get("stale").is_none());
        assert_eq!(registry.get("abc123").unwrap().session_id, "abc123");
    }

    #[test]
    fn restart_without_registered_game_has_unbound_handles() {
        let mut registry = GameRegistry::new();
        let prior = GameSnapshot {
            room_id: "fresh".into(),
            board: Board::empty(),
            player1: PlayerSnapshot {
                username: "alice".into(),
                colour: Colour::Yellow,
                my_turn: true,
            },
            player2: None,
            started: true,
            gameover: true,
        };

        assert_eq!(registry.restart_game("fresh", &prior), RestartOutcome::Restarted);
        let game = registry.get("fresh").unwrap();
        assert_eq!(game.player1.handle, None);
        assert!(game.player2.is_none());
    }

    #[test]
    fn finish_requires_both_players() {
        let mut registry = GameRegistry::new();
        assert!(!registry.finish("abc123"));
        registry.ready("abc123", A, "alice".into());
        assert!(!registry.finish("abc123"));
        registry.ready("abc123", B, "bob".into());
        assert!(registry.finish("abc123"));
        assert!(!registry.finish("abc123"));
        assert_eq!(registry.get("abc123").unwrap().state(), GameState::Over);
    }

    #[test]
    fn remove_discards_game() {
        let mut registry = GameRegistry::new();
        started_game(&mut registry);
        assert!(registry.remove("abc123").is_some());
        assert!(registry.remove("abc123").is_none());
        assert!(registry.is_empty());
    }
}
