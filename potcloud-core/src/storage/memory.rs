use crate::error::{PotError, Result};
use crate::storage::RoomBackend;
use crate::types::{Command, CommandEntry, CommandId, RoomId, StateSnapshot};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
struct RoomData {
    commands: BTreeMap<CommandId, CommandEntry>,
    state: Option<StateSnapshot>,
}

#[derive(Debug, Default)]
struct Rooms {
    rooms: HashMap<RoomId, RoomData>,
    next_id: CommandId,
}

/// Rooms held in process memory. Share one instance (behind an `Arc`)
/// between tables to connect them.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    inner: RwLock<Rooms>,
    offline: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail until switched back, like a dropped link.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn command_count(&self, room: &RoomId) -> usize {
        self.inner
            .read()
            .rooms
            .get(room)
            .map_or(0, |data| data.commands.len())
    }

    fn ensure_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(PotError::backend("backend unreachable"));
        }
        Ok(())
    }
}

#[async_trait]
impl RoomBackend for MemoryBackend {
    async fn push_command(&self, room: &RoomId, command: &Command) -> Result<CommandId> {
        self.ensure_online()?;
        let mut inner = self.inner.write();

        inner.next_id += 1;
        let id = inner.next_id;
        let entry = CommandEntry {
            id,
            action: command.action.as_str().to_string(),
            enqueued_at: command.enqueued_at,
        };
        inner
            .rooms
            .entry(room.clone())
            .or_default()
            .commands
            .insert(id, entry);

        Ok(id)
    }

    async fn pending_commands(&self, room: &RoomId) -> Result<Vec<CommandEntry>> {
        self.ensure_online()?;
        let inner = self.inner.read();

        Ok(inner
            .rooms
            .get(room)
            .map(|data| data.commands.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn remove_command(&self, room: &RoomId, id: CommandId) -> Result<()> {
        self.ensure_online()?;
        if let Some(data) = self.inner.write().rooms.get_mut(room) {
            data.commands.remove(&id);
        }
        Ok(())
    }

    async fn write_state(&self, room: &RoomId, snapshot: &StateSnapshot) -> Result<()> {
        self.ensure_online()?;
        self.inner
            .write()
            .rooms
            .entry(room.clone())
            .or_default()
            .state = Some(snapshot.clone());
        Ok(())
    }

    async fn read_state(&self, room: &RoomId) -> Result<Option<StateSnapshot>> {
        self.ensure_online()?;
        Ok(self
            .inner
            .read()
            .rooms
            .get(room)
            .and_then(|data| data.state.clone()))
    }

    async fn clear_room(&self, room: &RoomId) -> Result<()> {
        self.ensure_online()?;
        self.inner.write().rooms.remove(room);
        tracing::debug!("Cleared in-memory room {}", room);
        Ok(())
    }
}
