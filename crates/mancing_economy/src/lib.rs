//! # MANCING Economy
//!
//! Loot draw and economy logic for the MANCING fishing gacha.
//!
//! ## Design Principles
//!
//! 1. **Draws never fail** - remote trouble always degrades to a local catalog draw
//! 2. **Bounded waits** - the remote call races a timer; no draw can hang
//! 3. **Refund by default** - a debit refunds itself unless the draw completes
//! 4. **External configuration** - all balance data in TOML files
//!
//! ## Non-goals
//!
//! This is a toy. Randomness is seeded `ChaCha8`, the balance is client-held
//! and resettable, and nothing here is meant to resist tampering.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use mancing_economy::{GachaConfig, GachaMachine, JournalStore, RarityTier};
//!
//! let config = GachaConfig::load("config/mancing.toml")?;
//! let store = Arc::new(JournalStore::open("mancing.journal")?);
//! let mut machine = GachaMachine::from_config(&config, store)?;
//!
//! let outcome = machine.pull(None).await?;
//! println!("{} ({})", outcome.entry().name, outcome.rarity());
//!
//! // Operator override for demos
//! let secret = machine.pull(Some(RarityTier::Secret)).await?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod catalog;
pub mod config;
pub mod error;
pub mod history;
pub mod ledger;
pub mod machine;
pub mod remote;
pub mod resolver;
pub mod store;

pub use catalog::{CatalogStatistics, RarityCatalog, RarityEntry, RarityTier};
pub use config::{GachaConfig, RemoteConfig};
pub use error::{GachaError, GachaResult};
pub use history::{HistoryEntry, HistoryLog};
pub use ledger::{EconomyLedger, Reservation, BALANCE_KEY};
pub use machine::{GachaMachine, PullBatch};
pub use remote::{parse_remote_item, HttpDrawService, RemoteDrawService};
pub use resolver::{DrawOutcome, DrawResolver, DrawSource};
pub use store::{JournalStore, KeyValueStore, MemoryStore};
