use crate::error::SessionError;
use crate::ledger::LedgerState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// One of the two balance holders. Serialized as `1` / `2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Player {
    One,
    Two,
}

impl Player {
    pub fn number(self) -> u8 {
        match self {
            Player::One => 1,
            Player::Two => 2,
        }
    }
}

impl TryFrom<u8> for Player {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(Player::One),
            2 => Ok(Player::Two),
            other => Err(format!("unknown player {}", other)),
        }
    }
}

impl From<Player> for u8 {
    fn from(player: Player) -> Self {
        player.number()
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "player {}", self.number())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Host,
    Remote,
}

/// Normalized session identifier used as the channel key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomId(String);

impl RoomId {
    /// Trim and upper-case a user-entered room name.
    pub fn parse(raw: &str) -> std::result::Result<Self, SessionError> {
        let cleaned = raw.trim().to_uppercase();
        if cleaned.is_empty() {
            return Err(SessionError::EmptyIdentifier);
        }
        Ok(Self(cleaned))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn commands_path(&self) -> String {
        format!("rooms/{}/commands", self.0)
    }

    pub fn state_path(&self) -> String {
        format!("rooms/{}/state", self.0)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A user intent that only the host may turn into a ledger mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Intent {
    Add,
    Subtract,
    Commit,
    DeclareWin(Player),
    Reset,
    Void,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Add => "ADD",
            Intent::Subtract => "SUB",
            Intent::Commit => "COMMIT",
            Intent::DeclareWin(Player::One) => "WIN1",
            Intent::DeclareWin(Player::Two) => "WIN2",
            Intent::Reset => "RESET",
            Intent::Void => "VOID",
        }
    }
}

impl FromStr for Intent {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "ADD" => Ok(Intent::Add),
            "SUB" => Ok(Intent::Subtract),
            "COMMIT" => Ok(Intent::Commit),
            "WIN1" => Ok(Intent::DeclareWin(Player::One)),
            "WIN2" => Ok(Intent::DeclareWin(Player::Two)),
            "RESET" => Ok(Intent::Reset),
            "VOID" => Ok(Intent::Void),
            other => Err(format!("unknown action {}", other)),
        }
    }
}

impl TryFrom<String> for Intent {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Intent> for String {
    fn from(intent: Intent) -> Self {
        intent.as_str().to_string()
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub action: Intent,
    #[serde(rename = "timestamp")]
    pub enqueued_at: DateTime<Utc>,
}

impl Command {
    pub fn new(action: Intent) -> Self {
        Self {
            action,
            enqueued_at: Utc::now(),
        }
    }
}

/// Backend-assigned key of a queued command, increasing in arrival order.
pub type CommandId = u64;

/// A command as it sits in a room's queue.
///
/// `action` stays raw: any participant can write to the queue, so the host
/// decides what it understands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandEntry {
    pub id: CommandId,
    pub action: String,
    pub enqueued_at: DateTime<Utc>,
}

impl CommandEntry {
    pub fn intent(&self) -> Option<Intent> {
        self.action.parse().ok()
    }
}

/// The published copy of the host's ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    #[serde(flatten)]
    pub state: LedgerState,
    #[serde(rename = "lastUpdate")]
    pub published_at: DateTime<Utc>,
    /// Host instance that published this snapshot.
    pub publisher: Uuid,
    /// Publish counter, per publisher.
    pub seq: u64,
}

/// Connection and role for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    Offline,
    Host(RoomId),
    Remote(RoomId),
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Offline => f.write_str("Cloud Offline"),
            ConnectionStatus::Host(room) => write!(f, "Master: {}", room),
            ConnectionStatus::Remote(room) => write!(f, "Remote: {}", room),
        }
    }
}
