//! PrimeAgems balance ledger.

use arena_core::{LedgerError, PlayerId};
use dashmap::DashMap;

/// Per-player balances. Balances outlive connections for the life of the
/// process and are never decremented.
#[derive(Default)]
pub struct BalanceLedger {
    balances: DashMap<PlayerId, u64>,
}

impl BalanceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current balance, initializing it to 0 if absent.
    pub fn get_or_init(&self, player_id: &PlayerId) -> u64 {
        *self.balances.entry(player_id.clone()).or_insert(0)
    }

    /// Current balance without initializing (0 if never referenced).
    pub fn get(&self, player_id: &PlayerId) -> u64 {
        self.balances.get(player_id).map_or(0, |b| *b)
    }

    /// Add `amount` to the balance and return the new total.
    ///
    /// The entry guard holds the shard lock, so concurrent purchases for the
    /// same player serialize.
    pub fn purchase(&self, player_id: &PlayerId, amount: i64) -> Result<u64, LedgerError> {
        let amount = u64::try_from(amount)
            .ok()
            .filter(|a| *a > 0)
            .ok_or(LedgerError::InvalidAmount(amount))?;

        let mut balance = self.balances.entry(player_id.clone()).or_insert(0);
        let next = balance
            .checked_add(amount)
            .ok_or(LedgerError::Overflow {
                balance: *balance,
                amount,
            })?;
        *balance = next;
        Ok(next)
    }

    /// Number of players with a tracked balance.
    pub fn len(&self) -> usize {
        self.balances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }
}
