use thiserror::Error;

use crate::types::Player;

pub type Result<T> = std::result::Result<T, PotError>;

/// Infrastructure failures: storage, encoding, configuration.
#[derive(Error, Debug)]
pub enum PotError {
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Room backend error: {0}")]
    Backend(String),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PotError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// A ledger guard refused the operation. State is unchanged.
///
/// These are routine outcomes the front end turns into an error cue, not
/// defects.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    #[error("No pending stake to remove")]
    NothingToRemove,

    #[error("Nothing staked to commit")]
    NothingStaked,

    #[error("Insufficient balance for {player}: need {need}, have {available}")]
    InsufficientFunds {
        player: Player,
        need: u64,
        available: u64,
    },

    #[error("The pool is empty")]
    EmptyPool,

    #[error("Amount overflow")]
    Overflow,
}

/// Session dialog validation failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Please enter a room name")]
    EmptyIdentifier,

    #[error("No session is bound")]
    NotBound,
}

impl SessionError {
    /// User-facing message in the requested locale.
    pub fn localized(&self, locale: crate::config::Locale) -> &'static str {
        use crate::config::Locale;

        match (self, locale) {
            (SessionError::EmptyIdentifier, Locale::En) => "Please enter a room name",
            (SessionError::EmptyIdentifier, Locale::Th) => "โปรดระบุชื่อห้อง",
            (SessionError::NotBound, Locale::En) => "Not connected to a room",
            (SessionError::NotBound, Locale::Th) => "ยังไม่ได้เชื่อมต่อห้อง",
        }
    }
}
