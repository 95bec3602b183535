//! POT CLOUD core - a shared pot ledger kept in sync between two displays.
//!
//! One process hosts and owns the authoritative ledger. Remotes queue
//! intents in the room's command channel and mirror the snapshots the host
//! publishes to the room's state channel.

pub mod channel;
pub mod config;
pub mod error;
pub mod ledger;
pub mod session;
pub mod storage;
pub mod types;

pub use config::{LedgerConfig, Locale, TableConfig};
pub use error::{PotError, Rejection, Result, SessionError};
pub use ledger::{Ledger, LedgerState};
pub use session::{Feedback, Session, SessionCoordinator, SyncEvent, Table};
pub use storage::{MemoryBackend, RoomBackend, Storage};
pub use types::{
    Command, CommandEntry, ConnectionStatus, Intent, Player, Role, RoomId, StateSnapshot,
};
