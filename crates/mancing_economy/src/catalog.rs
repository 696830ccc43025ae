//! # Rarity Catalog
//!
//! **Ordered item table with a cumulative-weight walk**
//!
//! The catalog is the leaf of the draw pipeline. It is built once, validated,
//! and never mutated afterwards. Sampling draws a uniform roll in `[0, 1)` and
//! walks the entries in their fixed order:
//!
//! ```text
//! entries:     Common 0.6 | Rare 0.3 | Secret 0.1
//! cumulative:  0.6        | 0.9      | 1.0
//! roll 0.65 ──────────────────^  first cumulative > roll => Rare
//! ```
//!
//! ## Zero-weight rows
//!
//! An entry with `weight = 0.0` is accepted but is unreachable: the walk skips
//! it and so does the drift fallback. Weights are never renormalized; a
//! warning is logged for every such row when the catalog is built.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use crate::error::{GachaError, GachaResult};

/// Allowed distance between the weight sum and 1.0.
pub const WEIGHT_TOLERANCE: f64 = 1e-6;

/// Rarity tier, ordered by scarcity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
#[repr(u8)]
pub enum RarityTier {
    /// Trash catches (gray).
    Common = 0,
    /// Uncommon catches (green).
    Uncommon = 1,
    /// Rare catches (blue).
    Rare = 2,
    /// Epic catches (purple).
    Epic = 3,
    /// Legendary catches (gold).
    Legendary = 4,
    /// Mythic catches (red).
    Mythic = 5,
    /// Secret catches.
    Secret = 6,
}

impl RarityTier {
    /// All tiers, scarcest last.
    pub const ALL: [Self; 7] = [
        Self::Common,
        Self::Uncommon,
        Self::Rare,
        Self::Epic,
        Self::Legendary,
        Self::Mythic,
        Self::Secret,
    ];

    /// Canonical display name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Common => "Common",
            Self::Uncommon => "Uncommon",
            Self::Rare => "Rare",
            Self::Epic => "Epic",
            Self::Legendary => "Legendary",
            Self::Mythic => "Mythic",
            Self::Secret => "Secret",
        }
    }

    /// Whether the presentation layer should give this tier the special reveal.
    #[inline]
    #[must_use]
    pub const fn is_celebrated(self) -> bool {
        matches!(self, Self::Legendary | Self::Mythic | Self::Secret)
    }
}

impl fmt::Display for RarityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RarityTier {
    type Err = GachaError;

    /// Case-insensitive; `Mitos` and `Mythical` are accepted for [`RarityTier::Mythic`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "common" => Ok(Self::Common),
            "uncommon" => Ok(Self::Uncommon),
            "rare" => Ok(Self::Rare),
            "epic" => Ok(Self::Epic),
            "legendary" => Ok(Self::Legendary),
            "mythic" | "mythical" | "mitos" => Ok(Self::Mythic),
            "secret" => Ok(Self::Secret),
            other => Err(GachaError::InvalidConfig(format!("unknown rarity tier: {other:?}"))),
        }
    }
}

impl TryFrom<String> for RarityTier {
    type Error = GachaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// One row of the catalog.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RarityEntry {
    /// Unique item name.
    pub name: String,
    /// Scarcity tier.
    pub rarity: RarityTier,
    /// Share of the total probability mass, in `[0, 1]`.
    pub weight: f64,
    /// Display/sell value.
    pub price: u64,
    /// Opaque styling key for the presentation layer.
    #[serde(default)]
    pub display_tag: String,
}

impl RarityEntry {
    /// Creates an entry.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        rarity: RarityTier,
        weight: f64,
        price: u64,
        display_tag: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            rarity,
            weight,
            price,
            display_tag: display_tag.into(),
        }
    }

    /// Whether sampling can ever return this entry.
    #[inline]
    #[must_use]
    pub fn is_reachable(&self) -> bool {
        self.weight > 0.0
    }
}

/// Immutable, validated rarity catalog.
#[derive(Clone, Debug)]
pub struct RarityCatalog {
    entries: Vec<RarityEntry>,
    /// Running weight sum, one per entry (pre-calculated).
    cumulative: Vec<f64>,
    /// Index of the last entry with positive weight.
    last_reachable: usize,
}

impl RarityCatalog {
    /// Builds and validates a catalog.
    ///
    /// # Errors
    ///
    /// Returns [`GachaError::InvalidCatalog`] when the table is empty, a name is
    /// blank or duplicated, a weight is outside `[0, 1]`, the weights do not sum
    /// to 1.0 within [`WEIGHT_TOLERANCE`], or no entry is reachable.
    pub fn new(entries: Vec<RarityEntry>) -> GachaResult<Self> {
        if entries.is_empty() {
            return Err(GachaError::InvalidCatalog("catalog has no entries".to_string()));
        }

        let mut seen = HashSet::with_capacity(entries.len());
        for entry in &entries {
            if entry.name.trim().is_empty() {
                return Err(GachaError::InvalidCatalog("entry with empty name".to_string()));
            }
            if !seen.insert(entry.name.as_str()) {
                return Err(GachaError::InvalidCatalog(format!(
                    "duplicate entry name: {}",
                    entry.name
                )));
            }
            if !(0.0..=1.0).contains(&entry.weight) {
                return Err(GachaError::InvalidCatalog(format!(
                    "weight {} of {} is outside [0, 1]",
                    entry.weight, entry.name
                )));
            }
        }

        let mut cumulative = Vec::with_capacity(entries.len());
        let mut running = 0.0;
        for entry in &entries {
            running += entry.weight;
            cumulative.push(running);
        }

        if (running - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(GachaError::InvalidCatalog(format!(
                "weights sum to {running}, expected 1.0"
            )));
        }

        let Some(last_reachable) = entries.iter().rposition(RarityEntry::is_reachable) else {
            return Err(GachaError::InvalidCatalog("no entry has positive weight".to_string()));
        };

        for entry in entries.iter().filter(|e| !e.is_reachable()) {
            tracing::warn!(name = %entry.name, "catalog entry has zero weight and can never be drawn");
        }

        Ok(Self {
            entries,
            cumulative,
            last_reachable,
        })
    }

    /// Entries in their fixed sampling order.
    #[must_use]
    pub fn entries(&self) -> &[RarityEntry] {
        &self.entries
    }

    /// Number of entries (including unreachable ones).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always `false`; construction rejects empty catalogs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all weights.
    #[must_use]
    pub fn total_weight(&self) -> f64 {
        self.cumulative.last().copied().unwrap_or(0.0)
    }

    /// Draws one entry using `rng`.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> &RarityEntry {
        self.pick(rng.gen::<f64>())
    }

    /// Cumulative walk for an explicit roll in `[0, 1)`.
    ///
    /// Returns the first reachable entry whose cumulative weight exceeds
    /// `roll`. A roll past the final sum (float drift) yields the last
    /// reachable entry.
    #[must_use]
    pub fn pick(&self, roll: f64) -> &RarityEntry {
        self.entries
            .iter()
            .zip(&self.cumulative)
            .find(|&(entry, &cumulative)| entry.is_reachable() && cumulative > roll)
            .map_or(&self.entries[self.last_reachable], |(entry, _)| entry)
    }

    /// First entry of `tier` in catalog order.
    #[must_use]
    pub fn find_by_tier(&self, tier: RarityTier) -> Option<&RarityEntry> {
        self.entries.iter().find(|e| e.rarity == tier)
    }

    /// Exact-name lookup.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<&RarityEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Samples `iterations` times and tallies the tiers.
    ///
    /// Used to eyeball a catalog against its configured weights.
    pub fn simulate<R: Rng + ?Sized>(&self, iterations: u32, rng: &mut R) -> CatalogStatistics {
        let mut stats = CatalogStatistics::default();
        for _ in 0..iterations {
            let entry = self.sample(rng);
            stats.total_rolls += 1;
            *stats.tier_counts.entry(entry.rarity).or_insert(0) += 1;
        }
        stats
    }
}

/// Tier histogram produced by [`RarityCatalog::simulate`].
#[derive(Clone, Debug, Default)]
pub struct CatalogStatistics {
    /// Total number of samples taken.
    pub total_rolls: u64,
    /// Samples per tier.
    pub tier_counts: BTreeMap<RarityTier, u64>,
}

impl CatalogStatistics {
    /// Observed share of `tier`, in `[0, 1]`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn share(&self, tier: RarityTier) -> f64 {
        if self.total_rolls == 0 {
            return 0.0;
        }
        self.tier_counts.get(&tier).copied().unwrap_or(0) as f64 / self.total_rolls as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn three_tier_catalog() -> RarityCatalog {
        RarityCatalog::new(vec![
            RarityEntry::new("Sardine", RarityTier::Common, 0.6, 5, "gray"),
            RarityEntry::new("Manta", RarityTier::Rare, 0.3, 50, "blue"),
            RarityEntry::new("Orca", RarityTier::Secret, 0.1, 10_000, "green"),
        ])
        .unwrap()
    }

    #[test]
    fn test_weights_sum_to_one() {
        let catalog = three_tier_catalog();
        assert!((catalog.total_weight() - 1.0).abs() < WEIGHT_TOLERANCE);
    }

    #[test]
    fn test_pick_walks_cumulative_weights() {
        let catalog = three_tier_catalog();
        assert_eq!(catalog.pick(0.0).name, "Sardine");
        assert_eq!(catalog.pick(0.59).name, "Sardine");
        assert_eq!(catalog.pick(0.65).rarity, RarityTier::Rare);
        assert_eq!(catalog.pick(0.95).rarity, RarityTier::Secret);
    }

    #[test]
    fn test_drift_past_total_returns_last_entry() {
        let catalog = three_tier_catalog();
        assert_eq!(catalog.pick(0.999_999_999).name, "Orca");
        assert_eq!(catalog.pick(1.5).name, "Orca");
    }

    #[test]
    fn test_sample_with_fixed_source() {
        let catalog = three_tier_catalog();

        // StepRng yielding 0 produces r = 0.0.
        let mut zero = StepRng::new(0, 0);
        assert_eq!(catalog.sample(&mut zero).name, "Sardine");

        // All bits set produces the largest f64 below 1.0.
        let mut top = StepRng::new(u64::MAX, 0);
        assert_eq!(catalog.sample(&mut top).name, "Orca");
    }

    #[test]
    fn test_seeded_sampling_is_reproducible() {
        let catalog = three_tier_catalog();
        let mut a = ChaCha8Rng::seed_from_u64(7);
        let mut b = ChaCha8Rng::seed_from_u64(7);

        for _ in 0..100 {
            assert_eq!(catalog.sample(&mut a), catalog.sample(&mut b));
        }
    }

    #[test]
    fn test_zero_weight_entry_is_unreachable() {
        let catalog = RarityCatalog::new(vec![
            RarityEntry::new("Ghost", RarityTier::Secret, 0.0, 1, ""),
            RarityEntry::new("Carp", RarityTier::Common, 1.0, 1, ""),
            RarityEntry::new("Phantom", RarityTier::Secret, 0.0, 1, ""),
        ])
        .unwrap();

        assert_eq!(catalog.pick(0.0).name, "Carp");
        assert_eq!(catalog.pick(-0.5).name, "Carp");
        assert_eq!(catalog.pick(2.0).name, "Carp");
        assert_eq!(catalog.len(), 3);
    }

    #[test]
    fn test_rejects_bad_tables() {
        assert!(RarityCatalog::new(vec![]).is_err());

        let unnormalized = vec![
            RarityEntry::new("A", RarityTier::Common, 0.5, 1, ""),
            RarityEntry::new("B", RarityTier::Rare, 0.51, 1, ""),
        ];
        assert!(matches!(
            RarityCatalog::new(unnormalized),
            Err(GachaError::InvalidCatalog(_))
        ));

        let duplicate = vec![
            RarityEntry::new("A", RarityTier::Common, 0.5, 1, ""),
            RarityEntry::new("A", RarityTier::Rare, 0.5, 1, ""),
        ];
        assert!(RarityCatalog::new(duplicate).is_err());

        let negative = vec![
            RarityEntry::new("A", RarityTier::Common, 1.2, 1, ""),
            RarityEntry::new("B", RarityTier::Rare, -0.2, 1, ""),
        ];
        assert!(RarityCatalog::new(negative).is_err());

        let nan = vec![RarityEntry::new("A", RarityTier::Common, f64::NAN, 1, "")];
        assert!(RarityCatalog::new(nan).is_err());
    }

    #[test]
    fn test_lookup_by_tier_prefers_catalog_order() {
        let catalog = RarityCatalog::new(vec![
            RarityEntry::new("Carp", RarityTier::Common, 0.98, 5, ""),
            RarityEntry::new("Hiu", RarityTier::Secret, 0.01, 10_000, ""),
            RarityEntry::new("Orca", RarityTier::Secret, 0.01, 10_000, ""),
        ])
        .unwrap();

        assert_eq!(catalog.find_by_tier(RarityTier::Secret).unwrap().name, "Hiu");
        assert!(catalog.find_by_tier(RarityTier::Epic).is_none());
        assert_eq!(catalog.find_by_name("Orca").unwrap().price, 10_000);
    }

    #[test]
    fn test_tier_parsing_and_order() {
        assert_eq!("mitos".parse::<RarityTier>().unwrap(), RarityTier::Mythic);
        assert_eq!("MYTHICAL".parse::<RarityTier>().unwrap(), RarityTier::Mythic);
        assert_eq!(" Secret ".parse::<RarityTier>().unwrap(), RarityTier::Secret);
        assert!("shiny".parse::<RarityTier>().is_err());

        assert!(RarityTier::Common < RarityTier::Uncommon);
        assert!(RarityTier::Mythic < RarityTier::Secret);
        assert!(RarityTier::Legendary.is_celebrated());
        assert!(!RarityTier::Epic.is_celebrated());
    }

    #[test]
    fn test_simulation_tracks_weights() {
        let catalog = three_tier_catalog();
        let mut rng = ChaCha8Rng::seed_from_u64(1234);
        let stats = catalog.simulate(100_000, &mut rng);

        assert_eq!(stats.total_rolls, 100_000);
        assert!((stats.share(RarityTier::Common) - 0.6).abs() < 0.01);
        assert!((stats.share(RarityTier::Rare) - 0.3).abs() < 0.01);
        assert!((stats.share(RarityTier::Secret) - 0.1).abs() < 0.01);
    }
}
