use crate::error::Result;
use crate::storage::{RoomBackend, Storage};
use crate::types::{Command, CommandEntry, CommandId, RoomId, StateSnapshot};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

#[async_trait]
impl RoomBackend for Storage {
    async fn push_command(&self, room: &RoomId, command: &Command) -> Result<CommandId> {
        let conn = self.get_connection().await;

        conn.execute(
            "INSERT INTO room_commands (room, action, enqueued_at) VALUES (?1, ?2, ?3)",
            params![
                room.as_str(),
                command.action.as_str(),
                command.enqueued_at.timestamp_millis(),
            ],
        )?;

        Ok(conn.last_insert_rowid() as CommandId)
    }

    async fn pending_commands(&self, room: &RoomId) -> Result<Vec<CommandEntry>> {
        let conn = self.get_connection().await;

        let mut stmt = conn.prepare(
            "SELECT id, action, enqueued_at FROM room_commands WHERE room = ?1 ORDER BY id",
        )?;

        let entries = stmt
            .query_map(params![room.as_str()], |row| {
                Ok(CommandEntry {
                    id: row.get::<_, i64>(0)? as CommandId,
                    action: row.get(1)?,
                    enqueued_at: DateTime::from_timestamp_millis(row.get(2)?)
                        .unwrap_or_else(Utc::now),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    async fn remove_command(&self, room: &RoomId, id: CommandId) -> Result<()> {
        let conn = self.get_connection().await;

        conn.execute(
            "DELETE FROM room_commands WHERE room = ?1 AND id = ?2",
            params![room.as_str(), id as i64],
        )?;

        Ok(())
    }

    async fn write_state(&self, room: &RoomId, snapshot: &StateSnapshot) -> Result<()> {
        let payload = serde_json::to_string(snapshot)?;
        let conn = self.get_connection().await;

        conn.execute(
            "INSERT OR REPLACE INTO room_state (room, payload, updated_at) VALUES (?1, ?2, ?3)",
            params![
                room.as_str(),
                payload,
                snapshot.published_at.timestamp_millis(),
            ],
        )?;

        Ok(())
    }

    async fn read_state(&self, room: &RoomId) -> Result<Option<StateSnapshot>> {
        let conn = self.get_connection().await;

        let payload: Option<String> = conn
            .query_row(
                "SELECT payload FROM room_state WHERE room = ?1",
                params![room.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        match payload {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    async fn clear_room(&self, room: &RoomId) -> Result<()> {
        let conn = self.get_connection().await;

        conn.execute(
            "DELETE FROM room_commands WHERE room = ?1",
            params![room.as_str()],
        )?;
        conn.execute("DELETE FROM room_state WHERE room = ?1", params![room.as_str()])?;

        tracing::info!("Cleared room data under rooms/{}", room);
        Ok(())
    }
}
