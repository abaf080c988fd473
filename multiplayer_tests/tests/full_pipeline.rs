// End-to-end integration tests for two-player sessions.
//
// Each test starts a real relay server, connects real NetClient instances
// (via TestPlayer), and drives a full session: join -> ready -> moves ->
// win -> rematch -> leave/disconnect. Events from different connections are
// only ordered by the relay's single main thread, so the scenarios sync on
// an observable echo (usually a relayed move) before depending on an
// earlier event from another player having been processed.

use std::net::SocketAddr;
use std::thread;
use std::time::Duration;

use drop_four_protocol::{Board, Cell, Colour, Position, ServerMessage};
use drop_four_relay::server::{RelayConfig, RelayHandle, start_relay};
use multiplayer_tests::TestPlayer;

/// Start a relay on a random port and connect two players.
fn start_test_session() -> (RelayHandle, SocketAddr, TestPlayer, TestPlayer) {
    let config = RelayConfig {
        port: 0,
        ..RelayConfig::default()
    };
    let (handle, addr) = start_relay(config).unwrap();

    let alice = TestPlayer::connect(addr, "alice", Colour::Yellow);
    let bob = TestPlayer::connect(addr, "bob", Colour::Red);
    (handle, addr, alice, bob)
}

/// Both players join `room`, alice first.
fn join_room(alice: &mut TestPlayer, bob: &mut TestPlayer, room: &str) {
    alice.join(room);
    bob.join(room);
    alice.expect(ServerMessage::Joined("bob".into()));
}

/// Both players ready up, alice first, then exchange one opening move each.
/// The moves double as sync points: when bob sees alice's move her ready has
/// been processed, and likewise for alice.
fn start_game(alice: &mut TestPlayer, bob: &mut TestPlayer) {
    alice.ready();
    alice.place(3, 5);
    bob.expect(ServerMessage::PlaceTile(Position { x: 3, y: 5 }));
    bob.ready();
    bob.place(3, 4);
    alice.expect(ServerMessage::PlaceTile(Position { x: 3, y: 4 }));
}

// ---------------------------------------------------------------------------
// Test scenarios
// ---------------------------------------------------------------------------

/// The joiner announces itself to the room; the first member hears nothing
/// about its own join and the joiner hears nothing at all.
#[test]
fn join_notifies_existing_members_only() {
    let (handle, _, mut alice, mut bob) = start_test_session();
    join_room(&mut alice, &mut bob, "abc123");

    bob.expect_quiet();
    alice.expect_quiet();
    handle.stop();
}

/// Moves are relayed to the opponent in order, and both local boards end up
/// identical.
#[test]
fn moves_keep_both_boards_in_step() {
    let (handle, _, mut alice, mut bob) = start_test_session();
    join_room(&mut alice, &mut bob, "abc123");
    start_game(&mut alice, &mut bob);

    for col in 0..3 {
        alice.place(col, 5);
        bob.expect(ServerMessage::PlaceTile(Position { x: col, y: 5 }));
        bob.place(col, 4);
        alice.expect(ServerMessage::PlaceTile(Position { x: col, y: 4 }));
    }

    assert_eq!(alice.board, bob.board);
    assert_eq!(alice.board.0[5][0], Cell::Piece(Colour::Yellow));
    assert_eq!(bob.board.0[4][2], Cell::Piece(Colour::Red));

    // The mover never gets its own move echoed back.
    assert!(alice.drain().is_empty());
    assert!(bob.drain().is_empty());
    handle.stop();
}

/// A win is broadcast to the whole room, the winner included.
#[test]
fn win_reaches_both_players() {
    let (handle, _, mut alice, mut bob) = start_test_session();
    join_room(&mut alice, &mut bob, "abc123");
    start_game(&mut alice, &mut bob);

    alice.win();
    alice.expect(ServerMessage::Win);
    bob.expect(ServerMessage::Win);
    handle.stop();
}

/// After a finished game the requester's final snapshot is relayed to the
/// opponent and play resumes in the same room.
#[test]
fn rematch_relays_finished_board() {
    let (handle, _, mut alice, mut bob) = start_test_session();
    join_room(&mut alice, &mut bob, "abc123");
    start_game(&mut alice, &mut bob);

    alice.place(4, 5);
    bob.expect(ServerMessage::PlaceTile(Position { x: 4, y: 5 }));
    alice.win();
    alice.expect(ServerMessage::Win);
    bob.expect(ServerMessage::Win);

    let finished = alice.finished_snapshot("abc123", &bob);
    assert!(!finished.board.is_empty());
    alice.new_game(finished.clone());

    let relayed = bob.poll_until("new-game", |msg| matches!(msg, ServerMessage::NewGame(_)));
    assert_eq!(relayed, ServerMessage::NewGame(finished));
    assert_eq!(bob.board, Board::empty());
    alice.expect_quiet();

    // The fresh game is playable.
    bob.place(0, 5);
    alice.expect(ServerMessage::PlaceTile(Position { x: 0, y: 5 }));
    handle.stop();
}

/// `new-game` while the current game is still running is ignored.
#[test]
fn rematch_before_game_over_is_ignored() {
    let (handle, _, mut alice, mut bob) = start_test_session();
    join_room(&mut alice, &mut bob, "abc123");
    start_game(&mut alice, &mut bob);

    let snapshot = bob.finished_snapshot("abc123", &alice);
    bob.new_game(snapshot);
    bob.place(6, 5);

    alice.expect(ServerMessage::PlaceTile(Position { x: 6, y: 5 }));
    assert!(alice.drain().is_empty(), "no new-game should be relayed");
    handle.stop();
}

/// A third participant can join the room but not the game: it alone gets
/// `game-full` and the players see nothing.
#[test]
fn third_player_gets_game_full() {
    let (handle, addr, mut alice, mut bob) = start_test_session();
    join_room(&mut alice, &mut bob, "abc123");
    start_game(&mut alice, &mut bob);

    let mut carol = TestPlayer::connect(addr, "carol", Colour::Yellow);
    carol.join("abc123");
    alice.expect(ServerMessage::Joined("carol".into()));
    bob.expect(ServerMessage::Joined("carol".into()));

    carol.ready();
    carol.expect(ServerMessage::GameFull);
    carol.expect_quiet();
    alice.expect_quiet();
    bob.expect_quiet();
    handle.stop();
}

/// Separate rooms never see each other's traffic.
#[test]
fn rooms_are_isolated() {
    let (handle, addr, mut alice, mut bob) = start_test_session();
    let mut carol = TestPlayer::connect(addr, "carol", Colour::Yellow);
    let mut dave = TestPlayer::connect(addr, "dave", Colour::Red);

    join_room(&mut alice, &mut bob, "room-a");
    join_room(&mut carol, &mut dave, "room-b");
    start_game(&mut alice, &mut bob);
    start_game(&mut carol, &mut dave);

    alice.win();
    alice.expect(ServerMessage::Win);
    bob.expect(ServerMessage::Win);
    carol.expect_quiet();
    dave.expect_quiet();
    handle.stop();
}

/// Leaving drops a player from the room's audience, but the room it last
/// joined stays its relay target: its moves still reach whoever remains.
#[test]
fn leaver_stops_hearing_but_still_reaches_the_room() {
    let (handle, _, mut alice, mut bob) = start_test_session();
    join_room(&mut alice, &mut bob, "abc123");
    start_game(&mut alice, &mut bob);

    alice.leave();
    thread::sleep(Duration::from_millis(200));

    bob.place(2, 5);
    alice.place(2, 4);
    bob.expect(ServerMessage::PlaceTile(Position { x: 2, y: 4 }));
    alice.expect_quiet();
    handle.stop();
}

/// Once everybody leaves, the room and its game are reclaimed: newcomers
/// reusing the id get a fresh game instead of `game-full`.
#[test]
fn leaving_tears_down_room() {
    let (handle, addr, mut alice, mut bob) = start_test_session();
    join_room(&mut alice, &mut bob, "abc123");
    start_game(&mut alice, &mut bob);

    alice.leave();
    bob.leave();
    thread::sleep(Duration::from_millis(200));

    let mut carol = TestPlayer::connect(addr, "carol", Colour::Yellow);
    let mut dave = TestPlayer::connect(addr, "dave", Colour::Red);
    join_room(&mut carol, &mut dave, "abc123");
    start_game(&mut carol, &mut dave);

    carol.expect_quiet();
    dave.expect_quiet();
    alice.expect_quiet();
    bob.expect_quiet();
    handle.stop();
}

/// A player who drops mid-game stops receiving events; the one left behind
/// keeps the room, and the dropped seat is not handed to a new connection.
#[test]
fn disconnect_mid_game() {
    let (handle, addr, mut alice, mut bob) = start_test_session();
    join_room(&mut alice, &mut bob, "abc123");
    start_game(&mut alice, &mut bob);

    bob.disconnect();
    thread::sleep(Duration::from_millis(200));

    // Alice is alone in the room: her win only echoes to herself.
    alice.place(5, 5);
    alice.win();
    alice.expect(ServerMessage::Win);

    let mut bob_again = TestPlayer::connect(addr, "bob", Colour::Red);
    bob_again.join("abc123");
    alice.expect(ServerMessage::Joined("bob".into()));
    bob_again.ready();
    bob_again.expect(ServerMessage::GameFull);
    handle.stop();
}
