pub mod table;

pub use table::{Feedback, SyncEvent, Table};

use crate::channel::{CommandChannel, StateChannel};
use crate::error::SessionError;
use crate::ledger::LedgerState;
use crate::storage::RoomBackend;
use crate::types::{ConnectionStatus, Intent, Role, RoomId, StateSnapshot};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub room: RoomId,
    pub role: Role,
}

struct Binding {
    session: Session,
    commands: CommandChannel,
    state: StateChannel,
}

/// Binds a room to its channel pair and fixes the local role.
///
/// Unbound until `start_session` succeeds; `end_session` returns to Unbound.
/// The role never changes while bound.
pub struct SessionCoordinator {
    backend: Arc<dyn RoomBackend>,
    binding: Option<Binding>,
}

impl SessionCoordinator {
    pub fn new(backend: Arc<dyn RoomBackend>) -> Self {
        Self {
            backend,
            binding: None,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.binding.as_ref().map(|b| &b.session)
    }

    pub fn role(&self) -> Option<Role> {
        self.session().map(|s| s.role)
    }

    pub fn is_host(&self) -> bool {
        self.role() == Some(Role::Host)
    }

    pub fn status(&self) -> ConnectionStatus {
        match self.session() {
            None => ConnectionStatus::Offline,
            Some(Session {
                room,
                role: Role::Host,
            }) => ConnectionStatus::Host(room.clone()),
            Some(Session {
                room,
                role: Role::Remote,
            }) => ConnectionStatus::Remote(room.clone()),
        }
    }

    /// Validate the identifier and bind to its room.
    ///
    /// A host wipes whatever the room held before it starts consuming.
    pub async fn start_session(
        &mut self,
        identifier: &str,
        role: Role,
    ) -> Result<&Session, SessionError> {
        let room = RoomId::parse(identifier)?;

        if let Some(previous) = self.binding.take() {
            tracing::info!("Leaving room {}", previous.session.room);
        }

        if role == Role::Host {
            if let Err(e) = self.backend.clear_room(&room).await {
                tracing::warn!("Could not clear stale data in room {}: {}", room, e);
            }
        }

        tracing::info!("Joined room {} as {:?}", room, role);

        let binding = self.binding.insert(Binding {
            commands: CommandChannel::new(room.clone(), self.backend.clone()),
            state: StateChannel::new(room.clone(), self.backend.clone()),
            session: Session { room, role },
        });
        Ok(&binding.session)
    }

    pub fn end_session(&mut self) {
        if let Some(binding) = self.binding.take() {
            tracing::info!("Left room {}", binding.session.room);
        }
    }

    /// Remote side: queue an intent for the host.
    pub async fn send(&self, intent: Intent) -> Result<(), SessionError> {
        let binding = self.binding.as_ref().ok_or(SessionError::NotBound)?;
        if binding.session.role == Role::Remote {
            binding.commands.send(intent).await;
        } else {
            tracing::debug!("Host does not queue its own {}", intent);
        }
        Ok(())
    }

    /// Host side: publish the ledger. A no-op for remotes.
    pub async fn publish(&mut self, state: &LedgerState) {
        if let Some(binding) = self.binding.as_mut() {
            if binding.session.role == Role::Host {
                binding.state.publish(state).await;
            }
        }
    }

    /// Host side: consume queued commands. A no-op for remotes.
    pub async fn drain_commands<F>(&mut self, apply: F) -> usize
    where
        F: FnMut(Intent),
    {
        match self.binding.as_mut() {
            Some(binding) if binding.session.role == Role::Host => {
                binding.commands.drain(apply).await
            }
            _ => 0,
        }
    }

    /// Remote side: the latest snapshot worth applying. `None` for hosts.
    pub async fn fetch_state(&mut self) -> Option<StateSnapshot> {
        match self.binding.as_mut() {
            Some(binding) if binding.session.role == Role::Remote => binding.state.fetch().await,
            _ => None,
        }
    }
}
