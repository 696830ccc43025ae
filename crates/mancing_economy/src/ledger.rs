//! # Economy Ledger
//!
//! Owns the player's balance. Every change is written through to the
//! [`KeyValueStore`] before the call returns; the store is the single source
//! of truth across restarts.
//!
//! ## Refund contract
//!
//! A draw debits through [`EconomyLedger::reserve`], which hands back a
//! [`Reservation`]. Committing the reservation keeps the debit. Dropping it
//! uncommitted (the draw produced nothing, or the caller abandoned the draw
//! mid-flight) credits the cost back.
//!
//! The ledger is not built for concurrent mutation: `&mut self` on every
//! mutating call is the single-flight discipline.

use std::sync::Arc;

use crate::error::{GachaError, GachaResult};
use crate::store::KeyValueStore;

/// Store key holding the balance.
pub const BALANCE_KEY: &str = "mancing.balance";

/// Persisted player balance.
pub struct EconomyLedger {
    store: Arc<dyn KeyValueStore>,
    balance: u64,
    starting_balance: u64,
}

impl EconomyLedger {
    /// Opens the ledger, reading the stored balance or `starting_balance`.
    ///
    /// # Errors
    ///
    /// Returns [`GachaError::Storage`] if the store cannot be read. A stored
    /// negative value (hand-edited file) is also rejected.
    pub fn open(store: Arc<dyn KeyValueStore>, starting_balance: u64) -> GachaResult<Self> {
        let default = to_stored(starting_balance)?;
        let stored = store.read_int_or(BALANCE_KEY, default)?;
        let balance = u64::try_from(stored)
            .map_err(|_| GachaError::Storage(format!("stored balance is negative: {stored}")))?;

        tracing::info!(balance, "ledger opened");
        Ok(Self {
            store,
            balance,
            starting_balance,
        })
    }

    /// Current balance.
    #[must_use]
    pub fn balance(&self) -> u64 {
        self.balance
    }

    /// Balance restored by [`reset`](Self::reset).
    #[must_use]
    pub fn starting_balance(&self) -> u64 {
        self.starting_balance
    }

    /// Whether `cost` can be debited right now.
    #[must_use]
    pub fn can_afford(&self, cost: u64) -> bool {
        self.balance >= cost
    }

    /// Debits `cost`, leaving the balance untouched on failure.
    ///
    /// # Errors
    ///
    /// [`GachaError::InsufficientBalance`] when `balance < cost`;
    /// [`GachaError::Storage`] if the new balance cannot be persisted.
    pub fn try_debit(&mut self, cost: u64) -> GachaResult<()> {
        if !self.can_afford(cost) {
            return Err(GachaError::InsufficientBalance {
                balance: self.balance,
                cost,
            });
        }
        self.set_balance(self.balance - cost)?;
        tracing::debug!(cost, balance = self.balance, "debited");
        Ok(())
    }

    /// Credits `amount` (saturating).
    ///
    /// # Errors
    ///
    /// [`GachaError::Storage`] if the new balance cannot be persisted.
    pub fn credit(&mut self, amount: u64) -> GachaResult<()> {
        self.set_balance(self.balance.saturating_add(amount))?;
        tracing::debug!(amount, balance = self.balance, "credited");
        Ok(())
    }

    /// Restores the starting balance.
    ///
    /// # Errors
    ///
    /// [`GachaError::Storage`] if the new balance cannot be persisted.
    pub fn reset(&mut self) -> GachaResult<()> {
        self.set_balance(self.starting_balance)?;
        tracing::info!(balance = self.balance, "ledger reset");
        Ok(())
    }

    /// Debits `cost` and returns a guard that refunds unless committed.
    ///
    /// # Errors
    ///
    /// Same as [`try_debit`](Self::try_debit).
    pub fn reserve(&mut self, cost: u64) -> GachaResult<Reservation<'_>> {
        self.try_debit(cost)?;
        Ok(Reservation {
            ledger: self,
            cost,
            finalized: false,
        })
    }

    /// Persists first, then updates memory, so a failed write changes nothing.
    fn set_balance(&mut self, balance: u64) -> GachaResult<()> {
        self.store.write_int(BALANCE_KEY, to_stored(balance)?)?;
        self.balance = balance;
        Ok(())
    }
}

fn to_stored(balance: u64) -> GachaResult<i64> {
    i64::try_from(balance).map_err(|_| GachaError::Storage(format!("balance overflow: {balance}")))
}

impl std::fmt::Debug for EconomyLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EconomyLedger")
            .field("balance", &self.balance)
            .field("starting_balance", &self.starting_balance)
            .finish_non_exhaustive()
    }
}

/// A debit awaiting a completed draw.
#[must_use = "dropping a reservation refunds it"]
pub struct Reservation<'a> {
    ledger: &'a mut EconomyLedger,
    cost: u64,
    finalized: bool,
}

impl Reservation<'_> {
    /// The reserved amount.
    #[must_use]
    pub fn cost(&self) -> u64 {
        self.cost
    }

    /// Keeps the debit.
    pub fn commit(mut self) {
        self.finalized = true;
    }

    /// Refunds now, surfacing any storage error.
    ///
    /// # Errors
    ///
    /// [`GachaError::Storage`] if the refund cannot be persisted.
    pub fn refund(mut self) -> GachaResult<()> {
        self.finalized = true;
        self.ledger.credit(self.cost)
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        // If not finalized, auto-refund
        if !self.finalized {
            if let Err(err) = self.ledger.credit(self.cost) {
                tracing::error!(cost = self.cost, error = %err, "failed to persist refund");
            } else {
                tracing::info!(cost = self.cost, "uncommitted draw refunded");
            }
        }
    }
}
