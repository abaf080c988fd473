// drop_four_relay — session relay and game coordinator for Drop Four.
//
// Clients connect over TCP (framing from `drop_four_protocol`), join a named
// session, and play a two-player game whose moves the relay forwards to the
// opponent. The relay never checks moves: it tracks who is in which session,
// which game hangs off each session, and who should receive each event.
//
// Module overview:
// - `sessions.rs`:    `SessionRegistry`, session id -> member handles, with
//                     lazy creation and reclaim-on-empty.
// - `games.rs`:       `GameRegistry` and the per-session game state machine
//                     (create, attach player 2, finish, rematch).
// - `coordinator.rs`: `Coordinator`, which owns both registries and every
//                     connection's write half, and dispatches client events.
// - `server.rs`:      TCP listener, one reader thread per client, and the
//                     single-threaded main loop driving the coordinator.
// - `client.rs`:      `NetClient`, a blocking client used by tests/tools.
// - `web.rs`:         optional `tiny_http` server for the entry pages,
//                     static assets and preference cookies.
// - `error.rs`:       `RelayError`.
//
// The relay can run as a standalone binary (`main.rs`) or be embedded via
// `start_relay`.

pub mod client;
pub mod coordinator;
pub mod error;
pub mod games;
pub mod server;
pub mod sessions;
pub mod web;

pub use error::RelayError;
pub use server::{RelayConfig, RelayHandle, start_relay};
