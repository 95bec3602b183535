//! The per-process runtime the front end talks to.
//!
//! A `Table` owns the local ledger and the session coordinator. Intents go
//! straight to the ledger on the host and into the command queue on a
//! remote. `sync` pumps the channels: the host drains commands, expires the
//! winner marker and publishes; a remote mirrors the latest snapshot.

use crate::config::TableConfig;
use crate::error::{Rejection, SessionError};
use crate::ledger::{Ledger, LedgerState};
use crate::session::{Session, SessionCoordinator};
use crate::storage::RoomBackend;
use crate::types::{ConnectionStatus, Intent, Player, Role};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// What the front end should signal for an intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feedback {
    /// The host ledger changed.
    Applied,
    /// A guard refused; nothing changed.
    Rejected(Rejection),
    /// Queued for the host.
    Sent,
    /// No session bound; the intent went nowhere.
    Offline,
}

impl Feedback {
    pub fn is_success(&self) -> bool {
        matches!(self, Feedback::Applied | Feedback::Sent)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// Host applied a command from the queue.
    Command { intent: Intent, feedback: Feedback },
    /// The winner marker timed out.
    WinnerCleared,
    /// Remote replaced its mirror with a newer snapshot.
    Mirrored,
}

/// Deadline for clearing the last-winner marker. Re-arming replaces the old
/// deadline so an earlier win never clears a later marker.
#[derive(Debug)]
struct WinnerTimer {
    display: Duration,
    deadline: Option<Instant>,
}

impl WinnerTimer {
    fn new(display: Duration) -> Self {
        Self {
            display,
            deadline: None,
        }
    }

    fn arm(&mut self, now: Instant) {
        self.deadline = Some(now + self.display);
    }

    fn cancel(&mut self) {
        self.deadline = None;
    }

    fn take_expired(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

pub struct Table {
    ledger: Ledger,
    coordinator: SessionCoordinator,
    config: TableConfig,
    winner_timer: WinnerTimer,
    /// Last state handed to the state channel while hosting.
    published: Option<LedgerState>,
}

impl Table {
    /// Fails if `config` does not pass `TableConfig::validate`.
    pub fn new(config: TableConfig, backend: Arc<dyn RoomBackend>) -> crate::Result<Self> {
        config.validate()?;

        Ok(Self {
            ledger: Ledger::new(config.ledger.clone()),
            coordinator: SessionCoordinator::new(backend),
            winner_timer: WinnerTimer::new(config.ledger.winner_display()),
            published: None,
            config,
        })
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn snapshot(&self) -> LedgerState {
        *self.ledger.state()
    }

    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    pub fn session(&self) -> Option<&Session> {
        self.coordinator.session()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.coordinator.status()
    }

    /// When the winner marker will clear, if one is showing on this host.
    pub fn winner_clear_deadline(&self) -> Option<Instant> {
        self.winner_timer.deadline
    }

    /// Bind to a room as host or remote.
    ///
    /// The host publishes its current ledger right away so remotes that are
    /// already watching the room pick it up.
    pub async fn start_session(
        &mut self,
        identifier: &str,
        as_host: bool,
    ) -> Result<ConnectionStatus, SessionError> {
        let role = if as_host { Role::Host } else { Role::Remote };
        self.coordinator.start_session(identifier, role).await?;
        self.published = None;

        if as_host {
            self.publish_if_changed().await;
        }

        Ok(self.status())
    }

    pub fn end_session(&mut self) {
        self.coordinator.end_session();
        self.published = None;
    }

    pub async fn increase_pending(&mut self) -> Feedback {
        self.submit(Intent::Add).await
    }

    pub async fn decrease_pending(&mut self) -> Feedback {
        self.submit(Intent::Subtract).await
    }

    pub async fn commit(&mut self) -> Feedback {
        self.submit(Intent::Commit).await
    }

    pub async fn declare_win(&mut self, player: Player) -> Feedback {
        self.submit(Intent::DeclareWin(player)).await
    }

    pub async fn reset(&mut self) -> Feedback {
        self.submit(Intent::Reset).await
    }

    pub async fn void(&mut self) -> Feedback {
        self.submit(Intent::Void).await
    }

    /// Route an intent according to the local role.
    pub async fn submit(&mut self, intent: Intent) -> Feedback {
        match self.coordinator.role() {
            None => Feedback::Offline,
            Some(Role::Remote) => match self.coordinator.send(intent).await {
                Ok(()) => Feedback::Sent,
                Err(_) => Feedback::Offline,
            },
            Some(Role::Host) => {
                let feedback = apply_as_host(
                    &mut self.ledger,
                    &mut self.winner_timer,
                    intent,
                    Instant::now(),
                );
                self.publish_if_changed().await;
                feedback
            }
        }
    }

    /// Pump the channels once.
    pub async fn sync(&mut self) -> Vec<SyncEvent> {
        let mut events = Vec::new();

        match self.coordinator.role() {
            None => {}
            Some(Role::Host) => {
                let now = Instant::now();
                let ledger = &mut self.ledger;
                let timer = &mut self.winner_timer;

                self.coordinator
                    .drain_commands(|intent| {
                        let feedback = apply_as_host(ledger, timer, intent, now);
                        events.push(SyncEvent::Command { intent, feedback });
                    })
                    .await;

                if self.winner_timer.take_expired(Instant::now()) {
                    self.ledger.clear_winner();
                    events.push(SyncEvent::WinnerCleared);
                }

                self.publish_if_changed().await;
            }
            Some(Role::Remote) => {
                if let Some(snapshot) = self.coordinator.fetch_state().await {
                    if snapshot.state != *self.ledger.state() {
                        self.ledger.replace_with(snapshot.state);
                        events.push(SyncEvent::Mirrored);
                    }
                }
            }
        }

        events
    }

    /// Publish unless the ledger matches the last state handed over.
    ///
    /// A write dropped by the backend still counts as handed over, so a lost
    /// publish (for example the winner clear) stays lost until the ledger
    /// changes again.
    async fn publish_if_changed(&mut self) {
        let current = *self.ledger.state();
        if self.published == Some(current) {
            return;
        }
        self.coordinator.publish(&current).await;
        self.published = Some(current);
    }
}

fn apply_as_host(
    ledger: &mut Ledger,
    timer: &mut WinnerTimer,
    intent: Intent,
    now: Instant,
) -> Feedback {
    match ledger.apply(intent) {
        Ok(()) => {
            match intent {
                Intent::DeclareWin(_) => timer.arm(now),
                Intent::Reset => timer.cancel(),
                _ => {}
            }
            Feedback::Applied
        }
        Err(rejection) => {
            tracing::debug!("Rejected {}: {}", intent, rejection);
            Feedback::Rejected(rejection)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PotError;
    use crate::storage::{MemoryBackend, Storage};

    fn pair_backend() -> Arc<MemoryBackend> {
        Arc::new(MemoryBackend::new())
    }

    async fn host_and_remote(backend: Arc<dyn RoomBackend>) -> (Table, Table) {
        let mut host = Table::new(TableConfig::default(), backend.clone()).unwrap();
        let mut remote = Table::new(TableConfig::default(), backend).unwrap();
        host.start_session("poker-1", true).await.unwrap();
        remote.start_session("POKER-1 ", false).await.unwrap();
        (host, remote)
    }

    #[tokio::test]
    async fn test_unbound_table_reports_offline() {
        let mut table = Table::new(TableConfig::default(), pair_backend()).unwrap();
        assert_eq!(table.increase_pending().await, Feedback::Offline);
        assert_eq!(table.snapshot().pending_stake, 0);
        assert!(table.sync().await.is_empty());
    }

    #[tokio::test]
    async fn test_empty_identifier_is_rejected() {
        let mut table = Table::new(TableConfig::default(), pair_backend()).unwrap();
        assert_eq!(
            table.start_session("  ", true).await,
            Err(SessionError::EmptyIdentifier)
        );
        assert_eq!(table.status(), ConnectionStatus::Offline);
    }

    #[tokio::test]
    async fn test_dropped_publish_waits_for_next_change() {
        let backend = pair_backend();
        let (mut host, mut remote) = host_and_remote(backend.clone()).await;

        backend.set_offline(true);
        assert_eq!(host.increase_pending().await, Feedback::Applied);
        backend.set_offline(false);

        host.sync().await;
        remote.sync().await;
        assert_eq!(remote.snapshot().pending_stake, 0);

        host.increase_pending().await;
        remote.sync().await;
        assert_eq!(remote.snapshot().pending_stake, 2_000);
    }

    #[tokio::test]
    async fn test_zero_increment_config_is_refused() {
        let mut config = TableConfig::default();
        config.ledger.stake_increment = 0;
        assert!(matches!(
            Table::new(config, pair_backend()),
            Err(PotError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_host_intents_apply_and_publish() {
        let backend = pair_backend();
        let (mut host, mut remote) = host_and_remote(backend.clone()).await;

        assert_eq!(host.increase_pending().await, Feedback::Applied);
        assert_eq!(host.commit().await, Feedback::Applied);
        assert_eq!(host.snapshot().pool, 2_000);

        assert_eq!(remote.sync().await, vec![SyncEvent::Mirrored]);
        assert_eq!(remote.snapshot(), host.snapshot());
    }

    #[tokio::test]
    async fn test_remote_intents_reach_the_host() {
        let backend = pair_backend();
        let (mut host, mut remote) = host_and_remote(backend.clone()).await;

        assert_eq!(remote.increase_pending().await, Feedback::Sent);
        assert_eq!(remote.commit().await, Feedback::Sent);
        assert_eq!(remote.declare_win(Player::One).await, Feedback::Sent);
        // The mirror does not move until the host answers
        assert_eq!(remote.snapshot().balance1, 10_000);

        let events = host.sync().await;
        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|e| matches!(
            e,
            SyncEvent::Command {
                feedback: Feedback::Applied,
                ..
            }
        )));

        remote.sync().await;
        let state = remote.snapshot();
        assert_eq!(state.balance1, 11_000);
        assert_eq!(state.balance2, 9_000);
        assert_eq!(state.pool, 0);
        assert_eq!(state.last_winner, Some(Player::One));
    }

    #[tokio::test]
    async fn test_remote_rejections_surface_on_the_host() {
        let backend = pair_backend();
        let (mut host, mut remote) = host_and_remote(backend).await;

        remote.decrease_pending().await;
        remote.declare_win(Player::Two).await;

        let events = host.sync().await;
        assert_eq!(
            events,
            vec![
                SyncEvent::Command {
                    intent: Intent::Subtract,
                    feedback: Feedback::Rejected(Rejection::NothingToRemove),
                },
                SyncEvent::Command {
                    intent: Intent::DeclareWin(Player::Two),
                    feedback: Feedback::Rejected(Rejection::EmptyPool),
                },
            ]
        );
        assert_eq!(host.snapshot(), LedgerState::initial(10_000));
    }

    #[tokio::test]
    async fn test_backlog_accumulates_until_host_syncs() {
        let backend = pair_backend();
        let (mut host, mut remote) = host_and_remote(backend.clone()).await;
        let room = host.session().unwrap().room.clone();

        for _ in 0..4 {
            remote.increase_pending().await;
        }
        remote.decrease_pending().await;
        assert_eq!(backend.command_count(&room), 5);

        host.sync().await;
        assert_eq!(host.snapshot().pending_stake, 3_000);
        assert_eq!(backend.command_count(&room), 0);
    }

    #[tokio::test]
    async fn test_snapshot_replacement_is_idempotent() {
        let backend = pair_backend();
        let (mut host, mut remote) = host_and_remote(backend).await;

        host.increase_pending().await;
        assert_eq!(remote.sync().await, vec![SyncEvent::Mirrored]);
        let mirrored = remote.snapshot();

        assert!(remote.sync().await.is_empty());
        assert_eq!(remote.snapshot(), mirrored);
    }

    #[tokio::test]
    async fn test_remote_catches_up_after_outage() {
        let backend = pair_backend();
        let (mut host, mut remote) = host_and_remote(backend.clone()).await;

        backend.set_offline(true);
        host.increase_pending().await;
        assert!(remote.sync().await.is_empty());
        assert_eq!(remote.snapshot().pending_stake, 0);

        backend.set_offline(false);
        host.increase_pending().await;
        remote.sync().await;
        assert_eq!(remote.snapshot().pending_stake, 2_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_winner_marker_clears_after_display() {
        let backend = pair_backend();
        let (mut host, mut remote) = host_and_remote(backend).await;

        host.increase_pending().await;
        host.commit().await;
        host.declare_win(Player::Two).await;
        assert_eq!(host.snapshot().last_winner, Some(Player::Two));

        tokio::time::advance(Duration::from_millis(2_900)).await;
        assert!(host.sync().await.is_empty());
        assert_eq!(host.snapshot().last_winner, Some(Player::Two));

        tokio::time::advance(Duration::from_millis(200)).await;
        assert_eq!(host.sync().await, vec![SyncEvent::WinnerCleared]);
        assert_eq!(host.snapshot().last_winner, None);

        remote.sync().await;
        assert_eq!(remote.snapshot().last_winner, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_win_is_not_cleared_by_first_timer() {
        let backend = pair_backend();
        let (mut host, _remote) = host_and_remote(backend).await;

        host.increase_pending().await;
        host.commit().await;
        host.declare_win(Player::One).await;

        tokio::time::advance(Duration::from_secs(2)).await;
        host.increase_pending().await;
        host.commit().await;
        host.declare_win(Player::Two).await;

        // First win's deadline has passed, the second has not
        tokio::time::advance(Duration::from_millis(1_500)).await;
        host.sync().await;
        assert_eq!(host.snapshot().last_winner, Some(Player::Two));

        tokio::time::advance(Duration::from_secs(2)).await;
        host.sync().await;
        assert_eq!(host.snapshot().last_winner, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_cancels_pending_clear() {
        let backend = pair_backend();
        let (mut host, _remote) = host_and_remote(backend).await;

        host.increase_pending().await;
        host.commit().await;
        host.declare_win(Player::One).await;
        assert!(host.winner_clear_deadline().is_some());

        host.reset().await;
        assert!(host.winner_clear_deadline().is_none());
        assert_eq!(host.snapshot(), LedgerState::initial(10_000));
    }

    #[tokio::test]
    async fn test_new_host_session_resets_the_room() {
        let backend = pair_backend();
        let (mut host, mut remote) = host_and_remote(backend.clone()).await;

        remote.increase_pending().await;
        host.end_session();

        // Rehosting wipes the queued ADD before anyone consumes it
        host.start_session("poker-1", true).await.unwrap();
        assert!(host.sync().await.is_empty());
        assert_eq!(host.snapshot().pending_stake, 0);
    }

    #[tokio::test]
    async fn test_host_and_remote_over_sqlite() {
        let storage: Arc<dyn RoomBackend> = Arc::new(Storage::in_memory().await.unwrap());
        let (mut host, mut remote) = host_and_remote(storage).await;

        remote.increase_pending().await;
        remote.increase_pending().await;
        remote.increase_pending().await;
        host.sync().await;

        let mut expected = LedgerState::initial(10_000);
        expected.pending_stake = 3_000;
        assert_eq!(host.snapshot(), expected);

        remote.sync().await;
        assert_eq!(remote.snapshot(), expected);
    }
}
