// Session registry: which connections are in which named session.
//
// A session is a set of connection handles under a client-chosen string id.
// Sessions are created lazily by the first join and removed the moment their
// last member leaves. Each handle also records the id it joined, so relays
// can be scoped to the sender's session without trusting ids in payloads.
// The record outlives `leave_all` (a handle that left still relays to the
// room it last joined) and is only dropped by `forget` on disconnect.
//
// Invariant: a handle is a member of at most one session. Joining a second
// session first removes the handle from the previous one (reclaiming it if
// that leaves it empty). `leave_all` still scans every session rather than
// trusting the recorded id, so a stale record can never strand a member.
//
// No I/O happens here; the coordinator owns delivery.

use std::collections::{BTreeMap, BTreeSet};

use drop_four_protocol::ConnectionId;
use tracing::debug;

/// Result of `SessionRegistry::ensure_and_join`.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct JoinOutcome {
    /// The target session did not exist and was created by this join.
    pub created: bool,
    /// Sessions destroyed because the handle moved out of them.
    pub reclaimed: Vec<String>,
}

#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: BTreeMap<String, BTreeSet<ConnectionId>>,
    joined: BTreeMap<ConnectionId, String>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `handle` to `session_id`, creating the session if needed, and
    /// record the id on the handle. Never fails.
    pub fn ensure_and_join(&mut self, session_id: &str, handle: ConnectionId) -> JoinOutcome {
        let mut outcome = JoinOutcome::default();

        if self
            .joined
            .get(&handle)
            .is_some_and(|current| current != session_id)
        {
            outcome.reclaimed = self.leave_all(handle);
        }

        let members = self
            .sessions
            .entry(session_id.to_owned())
            .or_insert_with(|| {
                outcome.created = true;
                BTreeSet::new()
            });
        members.insert(handle);
        self.joined.insert(handle, session_id.to_owned());

        debug!(
            session = session_id,
            %handle,
            created = outcome.created,
            members = members.len(),
            "joined session"
        );
        outcome
    }

    /// Remove `handle` from every session containing it and destroy sessions
    /// left empty. Returns the ids of destroyed sessions. The handle's
    /// recorded id is kept. Calling it again for the same handle is a no-op.
    pub fn leave_all(&mut self, handle: ConnectionId) -> Vec<String> {
        let mut emptied = Vec::new();
        for (id, members) in &mut self.sessions {
            if members.remove(&handle) {
                debug!(session = %id, %handle, remaining = members.len(), "left session");
            }
            if members.is_empty() {
                emptied.push(id.clone());
            }
        }
        for id in &emptied {
            self.sessions.remove(id);
            debug!(session = %id, "session destroyed");
        }
        emptied
    }

    /// Drop the handle's recorded session id. Membership is untouched; the
    /// coordinator calls this after `leave_all` when the connection closes.
    pub fn forget(&mut self, handle: ConnectionId) {
        self.joined.remove(&handle);
    }

    /// The session `handle` last joined, whether or not it still exists.
    pub fn session_of(&self, handle: ConnectionId) -> Option<&str> {
        self.joined.get(&handle).map(String::as_str)
    }

    /// Current members of `session_id`, in handle order. Empty for an
    /// unknown id.
    pub fn members(&self, session_id: &str) -> Vec<ConnectionId> {
        self.sessions
            .get(session_id)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
