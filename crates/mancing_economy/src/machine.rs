//! # Draw Pipeline
//!
//! The single point of contact for a front end. Every draw goes through
//! [`GachaMachine::pull`]:
//!
//! ```text
//! pull(override) ──> 1. Reserve draw cost (ledger, persisted)
//!                    2. Resolve draw (override / remote / local fallback)
//!                    3. Append outcome to history
//!                    4. Commit reservation
//! ```
//!
//! Dropping the `pull` future between steps 1 and 4 drops the reservation,
//! which refunds the cost. `pull` borrows the machine mutably, so at most one
//! draw is ever in flight against the ledger.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;

use crate::catalog::{RarityCatalog, RarityTier};
use crate::config::GachaConfig;
use crate::error::{GachaError, GachaResult};
use crate::history::HistoryLog;
use crate::ledger::EconomyLedger;
use crate::remote::{HttpDrawService, RemoteDrawService};
use crate::resolver::{DrawOutcome, DrawResolver};
use crate::store::KeyValueStore;

/// Outcomes of [`GachaMachine::pull_many`].
#[derive(Clone, Debug, Default)]
pub struct PullBatch {
    /// Completed draws, oldest first.
    pub outcomes: Vec<DrawOutcome>,
    /// Why the batch ended early, if it did.
    pub stopped: Option<GachaError>,
}

/// Ledger, resolver, history and RNG wired into one pipeline.
pub struct GachaMachine {
    ledger: EconomyLedger,
    resolver: DrawResolver,
    history: HistoryLog,
    rng: ChaCha8Rng,
    draw_cost: u64,
}

impl GachaMachine {
    /// Builds the pipeline from a validated config.
    ///
    /// `remote` overrides whatever `config.remote` says; pass `None` for an
    /// offline machine.
    ///
    /// # Errors
    ///
    /// Config/catalog validation errors, or [`GachaError::Storage`] if the
    /// ledger cannot be opened.
    pub fn new(
        config: &GachaConfig,
        store: Arc<dyn KeyValueStore>,
        remote: Option<Arc<dyn RemoteDrawService>>,
    ) -> GachaResult<Self> {
        let catalog = Arc::new(config.validated_catalog()?);

        let timeout = config
            .remote
            .as_ref()
            .map_or(crate::resolver::DEFAULT_REMOTE_TIMEOUT, crate::config::RemoteConfig::timeout);
        let resolver = match remote {
            Some(remote) => DrawResolver::with_remote(catalog, remote, timeout),
            None => DrawResolver::local(catalog),
        };

        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        let ledger = EconomyLedger::open(store, config.starting_balance)?;

        tracing::info!(
            entries = resolver.catalog().len(),
            remote = resolver.has_remote(),
            draw_cost = config.draw_cost,
            "gacha machine ready"
        );

        Ok(Self {
            ledger,
            resolver,
            history: HistoryLog::new(),
            rng,
            draw_cost: config.draw_cost,
        })
    }

    /// Builds the pipeline, creating an HTTP client when `[remote]` is set.
    ///
    /// # Errors
    ///
    /// As [`new`](Self::new), plus HTTP client construction failures.
    pub fn from_config(config: &GachaConfig, store: Arc<dyn KeyValueStore>) -> GachaResult<Self> {
        let remote = match &config.remote {
            Some(remote) => {
                let service = HttpDrawService::new(&remote.url, remote.timeout())?;
                Some(Arc::new(service) as Arc<dyn RemoteDrawService>)
            }
            None => None,
        };
        Self::new(config, store, remote)
    }

    /// Performs one paid draw.
    ///
    /// # Errors
    ///
    /// [`GachaError::InsufficientBalance`] before anything is debited;
    /// [`GachaError::Storage`] if the debit cannot be persisted. Remote
    /// failures never surface here.
    pub async fn pull(&mut self, override_tier: Option<RarityTier>) -> GachaResult<DrawOutcome> {
        let reservation = self.ledger.reserve(self.draw_cost)?;

        let outcome = self.resolver.draw(override_tier, &mut self.rng).await;

        self.history.append(outcome.clone());
        reservation.commit();

        tracing::info!(
            name = %outcome.entry().name,
            rarity = %outcome.rarity(),
            source = outcome.source().as_str(),
            balance = self.ledger.balance(),
            "draw complete"
        );
        Ok(outcome)
    }

    /// Performs up to `count` draws, stopping at the first error.
    pub async fn pull_many(&mut self, count: usize, override_tier: Option<RarityTier>) -> PullBatch {
        let mut batch = PullBatch::default();
        for _ in 0..count {
            match self.pull(override_tier).await {
                Ok(outcome) => batch.outcomes.push(outcome),
                Err(err) => {
                    batch.stopped = Some(err);
                    break;
                }
            }
        }
        batch
    }

    /// Current balance.
    #[must_use]
    pub fn balance(&self) -> u64 {
        self.ledger.balance()
    }

    /// Cost of one draw.
    #[must_use]
    pub fn draw_cost(&self) -> u64 {
        self.draw_cost
    }

    /// Whether one more draw is affordable.
    #[must_use]
    pub fn can_pull(&self) -> bool {
        self.ledger.can_afford(self.draw_cost)
    }

    /// Session history, newest first.
    #[must_use]
    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    /// The catalog in use.
    #[must_use]
    pub fn catalog(&self) -> &RarityCatalog {
        self.resolver.catalog()
    }

    /// The resolver in use.
    #[must_use]
    pub fn resolver(&self) -> &DrawResolver {
        &self.resolver
    }

    /// Restores the starting balance. History is kept.
    ///
    /// # Errors
    ///
    /// [`GachaError::Storage`] if the balance cannot be persisted.
    pub fn reset_balance(&mut self) -> GachaResult<()> {
        self.ledger.reset()
    }
}

impl std::fmt::Debug for GachaMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GachaMachine")
            .field("ledger", &self.ledger)
            .field("resolver", &self.resolver)
            .field("history", &self.history.len())
            .field("draw_cost", &self.draw_cost)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn seeded_config() -> GachaConfig {
        GachaConfig {
            seed: Some(42),
            ..GachaConfig::default()
        }
    }

    #[tokio::test]
    async fn test_pull_debits_and_logs() {
        let mut machine = GachaMachine::new(&seeded_config(), Arc::new(MemoryStore::new()), None).unwrap();
        assert_eq!(machine.balance(), 100);

        let outcome = machine.pull(None).await.unwrap();
        assert_eq!(machine.balance(), 90);
        assert_eq!(machine.history().len(), 1);
        assert_eq!(&machine.history().latest().unwrap().outcome, &outcome);
    }

    #[tokio::test]
    async fn test_insufficient_balance_does_not_draw() {
        let config = GachaConfig {
            starting_balance: 5,
            ..seeded_config()
        };
        let mut machine = GachaMachine::new(&config, Arc::new(MemoryStore::new()), None).unwrap();

        assert!(!machine.can_pull());
        let err = machine.pull(None).await.unwrap_err();
        assert_eq!(err, GachaError::InsufficientBalance { balance: 5, cost: 10 });
        assert_eq!(machine.balance(), 5);
        assert!(machine.history().is_empty());
    }

    #[tokio::test]
    async fn test_pull_many_stops_when_broke() {
        let mut machine = GachaMachine::new(&seeded_config(), Arc::new(MemoryStore::new()), None).unwrap();

        let batch = machine.pull_many(15, None).await;
        assert_eq!(batch.outcomes.len(), 10);
        assert!(matches!(batch.stopped, Some(GachaError::InsufficientBalance { .. })));
        assert_eq!(machine.balance(), 0);

        machine.reset_balance().unwrap();
        assert_eq!(machine.balance(), 100);
        assert_eq!(machine.history().len(), 10);
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected_before_ledger() {
        let config = GachaConfig {
            draw_cost: 0,
            ..seeded_config()
        };
        let store = Arc::new(MemoryStore::new());
        let err = GachaMachine::new(&config, store.clone(), None).unwrap_err();
        assert!(matches!(err, GachaError::InvalidConfig(_)));
        assert_eq!(store.read_int(crate::ledger::BALANCE_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn test_history_matches_committed_debits() {
        let mut machine = GachaMachine::new(&seeded_config(), Arc::new(MemoryStore::new()), None).unwrap();

        for draws in 1..=4u64 {
            machine.pull(None).await.unwrap();
            assert_eq!(machine.history().len() as u64, draws);
            assert_eq!(machine.balance(), 100 - draws * 10);
        }
    }

    #[tokio::test]
    async fn test_same_seed_same_draws() {
        let mut a = GachaMachine::new(&seeded_config(), Arc::new(MemoryStore::new()), None).unwrap();
        let mut b = GachaMachine::new(&seeded_config(), Arc::new(MemoryStore::new()), None).unwrap();

        let first = a.pull_many(10, None).await;
        let second = b.pull_many(10, None).await;
        assert_eq!(first.outcomes, second.outcomes);
    }
}
