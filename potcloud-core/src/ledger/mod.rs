//! Two balances, one pool, one pending stake.
//!
//! The ledger is a plain state machine. Every mutator either applies fully
//! or refuses with a [`Rejection`] and leaves the state untouched; nothing
//! is clamped. Only the host calls these directly, remotes turn the same
//! intents into commands.

use crate::config::LedgerConfig;
use crate::error::Rejection;
use crate::types::{Intent, Player};
use serde::{Deserialize, Serialize};

pub type Outcome = std::result::Result<(), Rejection>;

/// Every field a snapshot carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerState {
    pub balance1: u64,
    pub balance2: u64,
    pub pool: u64,
    pub pending_stake: u64,
    pub last_winner: Option<Player>,
}

impl LedgerState {
    pub fn initial(initial_balance: u64) -> Self {
        Self {
            balance1: initial_balance,
            balance2: initial_balance,
            pool: 0,
            pending_stake: 0,
            last_winner: None,
        }
    }

    pub fn balance(&self, player: Player) -> u64 {
        match player {
            Player::One => self.balance1,
            Player::Two => self.balance2,
        }
    }

    /// Amount that would land in the pool if the pending stake were committed.
    pub fn staged_total(&self) -> u64 {
        self.pending_stake.saturating_mul(2)
    }

    fn balance_mut(&mut self, player: Player) -> &mut u64 {
        match player {
            Player::One => &mut self.balance1,
            Player::Two => &mut self.balance2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Ledger {
    state: LedgerState,
    config: LedgerConfig,
}

impl Ledger {
    pub fn new(config: LedgerConfig) -> Self {
        Self {
            state: LedgerState::initial(config.initial_balance),
            config,
        }
    }

    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn balance(&self, player: Player) -> u64 {
        self.state.balance(player)
    }

    pub fn pool(&self) -> u64 {
        self.state.pool
    }

    pub fn pending_stake(&self) -> u64 {
        self.state.pending_stake
    }

    pub fn last_winner(&self) -> Option<Player> {
        self.state.last_winner
    }

    /// Raise the pending stake by one increment.
    pub fn increase_pending(&mut self) -> Outcome {
        self.state.pending_stake = self
            .state
            .pending_stake
            .checked_add(self.config.stake_increment)
            .ok_or(Rejection::Overflow)?;
        Ok(())
    }

    /// Lower the pending stake by one increment, if there is one to remove.
    pub fn decrease_pending(&mut self) -> Outcome {
        if self.state.pending_stake < self.config.stake_increment {
            return Err(Rejection::NothingToRemove);
        }
        self.state.pending_stake -= self.config.stake_increment;
        Ok(())
    }

    /// Move the pending stake from both balances into the pool.
    pub fn commit(&mut self) -> Outcome {
        let stake = self.state.pending_stake;
        if stake == 0 {
            return Err(Rejection::NothingStaked);
        }

        for player in [Player::One, Player::Two] {
            let available = self.state.balance(player);
            if available < stake {
                return Err(Rejection::InsufficientFunds {
                    player,
                    need: stake,
                    available,
                });
            }
        }

        let pool = stake
            .checked_mul(2)
            .and_then(|total| self.state.pool.checked_add(total))
            .ok_or(Rejection::Overflow)?;

        self.state.balance1 -= stake;
        self.state.balance2 -= stake;
        self.state.pool = pool;
        self.state.pending_stake = 0;

        tracing::debug!("Committed {} per player, pool now {}", stake, pool);
        Ok(())
    }

    /// Pay the whole pool to `player` and mark them as the last winner.
    pub fn declare_win(&mut self, player: Player) -> Outcome {
        let pool = self.state.pool;
        if pool == 0 {
            return Err(Rejection::EmptyPool);
        }

        let credited = self
            .state
            .balance(player)
            .checked_add(pool)
            .ok_or(Rejection::Overflow)?;

        *self.state.balance_mut(player) = credited;
        self.state.pool = 0;
        self.state.last_winner = Some(player);

        tracing::debug!("{} wins pool of {}", player, pool);
        Ok(())
    }

    /// Back to the starting balances with an empty table.
    pub fn reset(&mut self) {
        self.state = LedgerState::initial(self.config.initial_balance);
    }

    /// Forfeit the pool and the pending stake. Nobody is credited.
    pub fn void(&mut self) {
        self.state.pool = 0;
        self.state.pending_stake = 0;
    }

    pub fn clear_winner(&mut self) {
        self.state.last_winner = None;
    }

    /// Run the ledger operation an intent names.
    pub fn apply(&mut self, intent: Intent) -> Outcome {
        match intent {
            Intent::Add => self.increase_pending(),
            Intent::Subtract => self.decrease_pending(),
            Intent::Commit => self.commit(),
            Intent::DeclareWin(player) => self.declare_win(player),
            Intent::Reset => {
                self.reset();
                Ok(())
            }
            Intent::Void => {
                self.void();
                Ok(())
            }
        }
    }

    /// Overwrite every field from a published snapshot.
    pub fn replace_with(&mut self, state: LedgerState) {
        self.state = state;
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new(LedgerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_INTENTS: [Intent; 7] = [
        Intent::Add,
        Intent::Subtract,
        Intent::Commit,
        Intent::DeclareWin(Player::One),
        Intent::DeclareWin(Player::Two),
        Intent::Reset,
        Intent::Void,
    ];

    fn ledger_with(balance1: u64, balance2: u64, pool: u64, pending: u64) -> Ledger {
        let mut ledger = Ledger::default();
        ledger.replace_with(LedgerState {
            balance1,
            balance2,
            pool,
            pending_stake: pending,
            last_winner: None,
        });
        ledger
    }

    #[test]
    fn test_stake_commit_and_win() {
        let mut ledger = Ledger::default();
        assert_eq!(ledger.balance(Player::One), 10_000);
        assert_eq!(ledger.balance(Player::Two), 10_000);
        assert_eq!(ledger.pool(), 0);

        ledger.increase_pending().unwrap();
        assert_eq!(ledger.pending_stake(), 1_000);

        ledger.commit().unwrap();
        assert_eq!(ledger.balance(Player::One), 9_000);
        assert_eq!(ledger.balance(Player::Two), 9_000);
        assert_eq!(ledger.pool(), 2_000);
        assert_eq!(ledger.pending_stake(), 0);

        ledger.declare_win(Player::One).unwrap();
        assert_eq!(ledger.balance(Player::One), 11_000);
        assert_eq!(ledger.balance(Player::Two), 9_000);
        assert_eq!(ledger.pool(), 0);
        assert_eq!(ledger.last_winner(), Some(Player::One));
    }

    #[test]
    fn test_decrease_at_zero_is_rejected() {
        let mut ledger = Ledger::default();
        let before = *ledger.state();

        assert_eq!(ledger.decrease_pending(), Err(Rejection::NothingToRemove));
        assert_eq!(*ledger.state(), before);
    }

    #[test]
    fn test_win_with_empty_pool_is_rejected() {
        let mut ledger = Ledger::default();
        let before = *ledger.state();

        assert_eq!(ledger.declare_win(Player::Two), Err(Rejection::EmptyPool));
        assert_eq!(*ledger.state(), before);
    }

    #[test]
    fn test_commit_with_insufficient_funds_is_rejected() {
        let mut ledger = ledger_with(2_000, 10_000, 0, 3_000);
        let before = *ledger.state();

        assert_eq!(
            ledger.commit(),
            Err(Rejection::InsufficientFunds {
                player: Player::One,
                need: 3_000,
                available: 2_000,
            })
        );
        assert_eq!(*ledger.state(), before);
    }

    #[test]
    fn test_commit_without_stake_is_rejected() {
        let mut ledger = ledger_with(10_000, 10_000, 4_000, 0);
        assert_eq!(ledger.commit(), Err(Rejection::NothingStaked));
        assert_eq!(ledger.pool(), 4_000);
    }

    #[test]
    fn test_commit_exactly_the_balance() {
        let mut ledger = ledger_with(3_000, 5_000, 0, 3_000);
        ledger.commit().unwrap();
        assert_eq!(ledger.balance(Player::One), 0);
        assert_eq!(ledger.balance(Player::Two), 2_000);
        assert_eq!(ledger.pool(), 6_000);
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut ledger = ledger_with(1_000, 19_000, 6_000, 2_000);
        ledger.declare_win(Player::Two).unwrap();

        ledger.reset();
        let once = *ledger.state();
        ledger.reset();

        assert_eq!(*ledger.state(), once);
        assert_eq!(once, LedgerState::initial(10_000));
    }

    #[test]
    fn test_void_forfeits_stakes() {
        let mut ledger = ledger_with(9_000, 9_000, 2_000, 3_000);
        ledger.void();
        assert_eq!(ledger.pool(), 0);
        assert_eq!(ledger.pending_stake(), 0);
        assert_eq!(ledger.balance(Player::One), 9_000);
        assert_eq!(ledger.balance(Player::Two), 9_000);
    }

    #[test]
    fn test_increase_refuses_overflow() {
        let mut ledger = ledger_with(10_000, 10_000, 0, u64::MAX - 10);
        assert_eq!(ledger.increase_pending(), Err(Rejection::Overflow));
        assert_eq!(ledger.pending_stake(), u64::MAX - 10);
    }

    #[test]
    fn test_invariants_hold_over_long_sequences() {
        // Deterministic walk over every intent with a simple LCG.
        let mut seed: u64 = 0x5eed;
        let mut ledger = Ledger::default();
        let increment = ledger.config().stake_increment;

        for _ in 0..5_000 {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let intent = ALL_INTENTS[(seed >> 33) as usize % ALL_INTENTS.len()];
            let before = *ledger.state();

            match ledger.apply(intent) {
                Ok(()) => {}
                Err(_) => assert_eq!(*ledger.state(), before, "rejected {} mutated", intent),
            }

            let state = ledger.state();
            assert_eq!(state.pending_stake % increment, 0);
            // Money only leaves the table through void.
            if !matches!(intent, Intent::Void | Intent::Reset) {
                assert_eq!(
                    state.balance1 + state.balance2 + state.pool,
                    before.balance1 + before.balance2 + before.pool
                );
            }
        }
    }

    #[test]
    fn test_apply_matches_direct_calls() {
        let mut via_apply = Ledger::default();
        let mut direct = Ledger::default();

        for intent in [Intent::Add, Intent::Add, Intent::Subtract, Intent::Commit] {
            via_apply.apply(intent).unwrap();
        }
        direct.increase_pending().unwrap();
        direct.increase_pending().unwrap();
        direct.decrease_pending().unwrap();
        direct.commit().unwrap();

        assert_eq!(via_apply.state(), direct.state());
    }

    #[test]
    fn test_state_json_field_names() {
        let value = serde_json::to_value(LedgerState::initial(10_000)).unwrap();
        assert_eq!(value["balance1"], 10_000);
        assert_eq!(value["pendingStake"], 0);
        assert!(value["lastWinner"].is_null());
    }
}
