//! The two halves of the replication protocol.
//!
//! Remotes push intents into the command queue and the host drains it; the
//! host overwrites the state record and remotes read it back. Writes are
//! fire-and-forget: a failed write is logged and otherwise ignored, a failed
//! read means "no update this time".

use crate::ledger::LedgerState;
use crate::storage::RoomBackend;
use crate::types::{Command, CommandId, Intent, RoomId, StateSnapshot};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

pub struct CommandChannel {
    room: RoomId,
    backend: Arc<dyn RoomBackend>,
    /// Highest key already applied; protects against a delete that did not
    /// go through.
    consumed_through: Option<CommandId>,
}

impl CommandChannel {
    pub fn new(room: RoomId, backend: Arc<dyn RoomBackend>) -> Self {
        Self {
            room,
            backend,
            consumed_through: None,
        }
    }

    pub fn room(&self) -> &RoomId {
        &self.room
    }

    /// Queue an intent for the host.
    pub async fn send(&self, intent: Intent) {
        match self.backend.push_command(&self.room, &Command::new(intent)).await {
            Ok(id) => {
                tracing::debug!("Queued {} as {} on {}", intent, id, self.room.commands_path())
            }
            Err(e) => tracing::warn!("Dropped {} for {}: {}", intent, self.room, e),
        }
    }

    /// Consume every queued command in arrival order, handing each intent to
    /// `apply` and then deleting it. Returns how many intents were applied.
    pub async fn drain<F>(&mut self, mut apply: F) -> usize
    where
        F: FnMut(Intent),
    {
        let entries = match self.backend.pending_commands(&self.room).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Could not read {}: {}", self.room.commands_path(), e);
                return 0;
            }
        };

        let mut applied = 0;
        for entry in entries {
            let already_consumed = self.consumed_through.map_or(false, |last| entry.id <= last);

            if !already_consumed {
                match entry.intent() {
                    Some(intent) => {
                        tracing::debug!("Applying {} from {}", intent, self.room.commands_path());
                        apply(intent);
                        applied += 1;
                    }
                    None => tracing::warn!(
                        "Skipping unknown action '{}' in {}",
                        entry.action,
                        self.room.commands_path()
                    ),
                }
                self.consumed_through = Some(entry.id);
            }

            // Deleting is the acknowledgment
            if let Err(e) = self.backend.remove_command(&self.room, entry.id).await {
                tracing::warn!("Could not delete command {}: {}", entry.id, e);
            }
        }

        applied
    }
}

pub struct StateChannel {
    room: RoomId,
    backend: Arc<dyn RoomBackend>,
    publisher: Uuid,
    seq: u64,
    last_applied: Option<(Uuid, u64)>,
}

impl StateChannel {
    pub fn new(room: RoomId, backend: Arc<dyn RoomBackend>) -> Self {
        Self {
            room,
            backend,
            publisher: Uuid::new_v4(),
            seq: 0,
            last_applied: None,
        }
    }

    pub fn publisher(&self) -> Uuid {
        self.publisher
    }

    /// Overwrite the room's state record with a full snapshot.
    pub async fn publish(&mut self, state: &LedgerState) {
        self.seq += 1;
        let snapshot = StateSnapshot {
            state: *state,
            published_at: Utc::now(),
            publisher: self.publisher,
            seq: self.seq,
        };

        match self.backend.write_state(&self.room, &snapshot).await {
            Ok(()) => tracing::debug!("Published seq {} to {}", self.seq, self.room.state_path()),
            Err(e) => tracing::warn!("Dropped snapshot {} for {}: {}", self.seq, self.room, e),
        }
    }

    /// Read the latest snapshot, if there is one worth applying.
    ///
    /// A snapshot older than the last one applied from the same publisher is
    /// ignored. Re-reading the same snapshot returns it again; applying it
    /// twice is harmless.
    pub async fn fetch(&mut self) -> Option<StateSnapshot> {
        let snapshot = match self.backend.read_state(&self.room).await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return None,
            Err(e) => {
                tracing::debug!("No state update from {}: {}", self.room.state_path(), e);
                return None;
            }
        };

        if let Some((publisher, seq)) = self.last_applied {
            if publisher == snapshot.publisher && snapshot.seq < seq {
                tracing::debug!(
                    "Ignoring stale snapshot {} (already at {})",
                    snapshot.seq,
                    seq
                );
                return None;
            }
        }

        self.last_applied = Some((snapshot.publisher, snapshot.seq));
        Some(snapshot)
    }
}
