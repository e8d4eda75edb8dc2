// ============================
// crates/backend-lib/src/roster.rs
// ============================
//! Participant registry for one session.
//!
//! Participants are soft-deleted on disconnect (`left_at` set, row
//! kept) so historical counts stay accurate, and a reconnecting
//! client presenting its prior participant id reopens the existing
//! row instead of inflating the audience count.
use chrono::{DateTime, Utc};
use livedeck_common::{ConnectionId, ParticipantId, SessionId};
use std::collections::HashMap;
use uuid::Uuid;

/// One audience connection's identity within a session.
#[derive(Debug, Clone)]
pub struct Participant {
    pub id: ParticipantId,
    pub session_id: SessionId,
    pub display_name: Option<String>,
    pub is_anonymous: bool,
    pub connection_id: Option<ConnectionId>,
    pub joined_at: DateTime<Utc>,
    pub left_at: Option<DateTime<Utc>>,
}

/// Tracks which participants are connected to a session.
///
/// The live count is maintained incrementally on join/leave rather
/// than rescanned, since it is queried on every membership change.
pub struct Roster {
    session_id: SessionId,
    participants: HashMap<ParticipantId, Participant>,
    by_connection: HashMap<ConnectionId, ParticipantId>,
    live: usize,
}

impl Roster {
    pub fn new(session_id: SessionId) -> Self {
        Roster {
            session_id,
            participants: HashMap::new(),
            by_connection: HashMap::new(),
            live: 0,
        }
    }

    /// Register a brand-new participant for `connection_id`.
    pub fn join(
        &mut self,
        connection_id: ConnectionId,
        display_name: Option<String>,
    ) -> &Participant {
        let is_anonymous = display_name
            .as_deref()
            .map_or(true, |name| name.trim().is_empty());
        let participant = Participant {
            id: Uuid::new_v4(),
            session_id: self.session_id,
            display_name: if is_anonymous { None } else { display_name },
            is_anonymous,
            connection_id: Some(connection_id),
            joined_at: Utc::now(),
            left_at: None,
        };
        let id = participant.id;
        self.by_connection.insert(connection_id, id);
        self.live += 1;
        self.participants.entry(id).or_insert(participant)
    }

    /// Reopen an existing participant row for a reconnecting client.
    /// A non-blank `display_name` replaces the stored one, so a
    /// client that picked a name after first joining anonymously
    /// keeps its identity. Returns `None` if the token is unknown, in
    /// which case the caller falls back to a fresh `join`.
    pub fn rejoin(
        &mut self,
        token: ParticipantId,
        connection_id: ConnectionId,
        display_name: Option<String>,
    ) -> Option<&Participant> {
        let participant = self.participants.get_mut(&token)?;
        if let Some(name) = display_name {
            if !name.trim().is_empty() {
                participant.display_name = Some(name);
                participant.is_anonymous = false;
            }
        }
        if let Some(old_conn) = participant.connection_id.take() {
            // Same identity presented from a second socket: detach the
            // old connection without changing the live count.
            self.by_connection.remove(&old_conn);
        } else {
            participant.left_at = None;
            self.live += 1;
        }
        participant.connection_id = Some(connection_id);
        self.by_connection.insert(connection_id, token);
        Some(&self.participants[&token])
    }

    /// Soft-delete the participant behind `connection_id`. Idempotent:
    /// an unknown or already-left connection is a no-op.
    pub fn leave(&mut self, connection_id: ConnectionId) -> Option<ParticipantId> {
        let id = self.by_connection.remove(&connection_id)?;
        let participant = self.participants.get_mut(&id)?;
        if participant.left_at.is_none() {
            participant.left_at = Some(Utc::now());
            participant.connection_id = None;
            self.live -= 1;
        }
        Some(id)
    }

    pub fn get(&self, id: ParticipantId) -> Option<&Participant> {
        self.participants.get(&id)
    }

    pub fn by_connection(&self, connection_id: ConnectionId) -> Option<&Participant> {
        self.by_connection
            .get(&connection_id)
            .and_then(|id| self.participants.get(id))
    }

    /// Participants currently connected. O(1).
    pub fn live_count(&self) -> usize {
        self.live
    }

    /// Everyone who ever joined, including those who left.
    pub fn total_count(&self) -> usize {
        self.participants.len()
    }
}
