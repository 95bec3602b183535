//! Room storage: the `rooms/{id}/commands` queue and the `rooms/{id}/state`
//! record, behind one trait so the channels do not care where they live.

pub mod memory;
pub mod room_store;

pub use memory::MemoryBackend;

use crate::error::{PotError, Result};
use crate::types::{Command, CommandEntry, CommandId, RoomId, StateSnapshot};
use async_trait::async_trait;
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;
use tokio::sync::Mutex;

/// Persisted room data addressed by session identifier.
#[async_trait]
pub trait RoomBackend: Send + Sync {
    /// Append to the room's command queue; returns the assigned key.
    async fn push_command(&self, room: &RoomId, command: &Command) -> Result<CommandId>;

    /// Every queued command, oldest first.
    async fn pending_commands(&self, room: &RoomId) -> Result<Vec<CommandEntry>>;

    async fn remove_command(&self, room: &RoomId, id: CommandId) -> Result<()>;

    /// Overwrite the room's state record.
    async fn write_state(&self, room: &RoomId, snapshot: &StateSnapshot) -> Result<()>;

    async fn read_state(&self, room: &RoomId) -> Result<Option<StateSnapshot>>;

    /// Drop the queue and the state record.
    async fn clear_room(&self, room: &RoomId) -> Result<()>;
}

/// SQLite-backed rooms. Several processes can open the same file and share
/// a room.
pub struct Storage {
    conn: Mutex<Connection>,
}

impl Storage {
    pub async fn new(db_path: &Path) -> Result<Self> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PotError::internal(format!("Failed to create directory: {}", e)))?;
        }

        let conn = Connection::open(db_path)?;
        conn.busy_timeout(Duration::from_secs(2))?;
        let mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
        tracing::debug!("Opened room database {} ({})", db_path.display(), mode);

        Self::with_connection(conn).await
    }

    /// A private database that lives as long as this handle.
    pub async fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?).await
    }

    async fn with_connection(conn: Connection) -> Result<Self> {
        let storage = Self {
            conn: Mutex::new(conn),
        };

        storage.init_schema().await?;
        Ok(storage)
    }

    async fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().await;

        // Command queue, AUTOINCREMENT keeps keys increasing after deletes
        conn.execute(
            "CREATE TABLE IF NOT EXISTS room_commands (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                room TEXT NOT NULL,
                action TEXT NOT NULL,
                enqueued_at INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_room_commands_room ON room_commands (room, id)",
            [],
        )?;

        // One overwritten snapshot per room
        conn.execute(
            "CREATE TABLE IF NOT EXISTS room_state (
                room TEXT PRIMARY KEY,
                payload TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;

        Ok(())
    }

    pub async fn get_connection(&self) -> tokio::sync::MutexGuard<'_, Connection> {
        self.conn.lock().await
    }
}
