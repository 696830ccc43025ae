//! # Configuration
//!
//! All balance data lives in an external TOML file, loaded once at startup.
//! See `config/mancing.toml` at the workspace root for the shipped table.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::catalog::{RarityCatalog, RarityEntry, RarityTier};
use crate::error::{GachaError, GachaResult};

/// Remote draw endpoint settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Draw endpoint, answered with one JSON item per `GET`.
    pub url: String,
    /// Time budget for one remote draw.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl RemoteConfig {
    /// `timeout_ms` as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

const fn default_timeout_ms() -> u64 {
    3000
}

/// Top-level configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GachaConfig {
    /// Cost of one draw.
    pub draw_cost: u64,
    /// Balance of a fresh (or reset) save.
    pub starting_balance: u64,
    /// Fixed RNG seed; entropy-seeded when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Remote draw service; offline when absent.
    #[serde(default)]
    pub remote: Option<RemoteConfig>,
    /// Catalog rows in sampling order.
    pub catalog: Vec<RarityEntry>,
}

impl GachaConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// [`GachaError::InvalidConfig`] on syntax or value errors,
    /// [`GachaError::InvalidCatalog`] if the catalog rows are inconsistent.
    pub fn from_toml_str(source: &str) -> GachaResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| GachaError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// As [`from_toml_str`](Self::from_toml_str), plus read failures.
    pub fn load(path: impl AsRef<Path>) -> GachaResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            GachaError::InvalidConfig(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&source)
    }

    /// Checks the economy values and the catalog.
    ///
    /// # Errors
    ///
    /// See [`validated_catalog`](Self::validated_catalog).
    pub fn validate(&self) -> GachaResult<()> {
        self.validated_catalog().map(|_| ())
    }

    /// Checks the economy values, then builds the catalog once.
    ///
    /// # Errors
    ///
    /// [`GachaError::InvalidConfig`] for a zero draw cost or zero timeout;
    /// catalog errors from [`RarityCatalog::new`].
    pub fn validated_catalog(&self) -> GachaResult<RarityCatalog> {
        if self.draw_cost == 0 {
            return Err(GachaError::InvalidConfig("draw_cost must be positive".to_string()));
        }
        if i64::try_from(self.starting_balance).is_err() {
            return Err(GachaError::InvalidConfig("starting_balance is too large".to_string()));
        }
        if let Some(remote) = &self.remote {
            if remote.timeout_ms == 0 {
                return Err(GachaError::InvalidConfig("remote.timeout_ms must be positive".to_string()));
            }
            if remote.url.trim().is_empty() {
                return Err(GachaError::InvalidConfig("remote.url is empty".to_string()));
            }
        }
        self.build_catalog()
    }

    /// Builds the validated catalog.
    ///
    /// # Errors
    ///
    /// See [`RarityCatalog::new`].
    pub fn build_catalog(&self) -> GachaResult<RarityCatalog> {
        RarityCatalog::new(self.catalog.clone())
    }

    /// The built-in seven-fish table.
    ///
    /// Weights are normalized to sum to exactly 1.0.
    #[must_use]
    pub fn default_catalog() -> Vec<RarityEntry> {
        vec![
            RarityEntry::new("Aduh Kamu Dapat Sampah", RarityTier::Common, 0.39, 5, "text-gray-400"),
            RarityEntry::new("Iziin belum Hoki", RarityTier::Uncommon, 0.30, 15, "text-green-400"),
            RarityEntry::new("Sinar Manta", RarityTier::Rare, 0.15, 50, "text-blue-400"),
            RarityEntry::new("Kepiting Ruin", RarityTier::Epic, 0.10, 200, "text-purple-400"),
            RarityEntry::new("Kepiting Laut Runic", RarityTier::Mythic, 0.04, 1000, "text-yellow-400"),
            RarityEntry::new("Hiu Petarung Glaidasi", RarityTier::Secret, 0.01, 10_000, "text-green-500"),
            RarityEntry::new("Orca", RarityTier::Secret, 0.01, 10_000, "text-green-500"),
        ]
    }
}

impl Default for GachaConfig {
    fn default() -> Self {
        Self {
            draw_cost: 10,
            starting_balance: 100,
            seed: None,
            remote: None,
            catalog: Self::default_catalog(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
draw_cost = 25
starting_balance = 500
seed = 9

[remote]
url = "http://127.0.0.1:3000/api/index"

[[catalog]]
name = "Sampah"
rarity = "Common"
weight = 0.9
price = 5
display_tag = "text-gray-400"

[[catalog]]
name = "Kepiting Laut Runic"
rarity = "Mitos"
weight = 0.1
price = 1000
"#;

    #[test]
    fn test_default_config_is_valid() {
        let config = GachaConfig::default();
        config.validate().unwrap();
        let catalog = config.build_catalog().unwrap();
        assert_eq!(catalog.len(), 7);
        assert!((catalog.total_weight() - 1.0).abs() < crate::catalog::WEIGHT_TOLERANCE);
    }

    #[test]
    fn test_parse_sample() {
        let config = GachaConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.draw_cost, 25);
        assert_eq!(config.starting_balance, 500);
        assert_eq!(config.seed, Some(9));

        let remote = config.remote.as_ref().unwrap();
        assert_eq!(remote.timeout(), Duration::from_secs(3));

        assert_eq!(config.catalog[1].rarity, RarityTier::Mythic);
        assert!(config.catalog[1].display_tag.is_empty());
    }

    #[test]
    fn test_rejects_zero_cost() {
        let source = SAMPLE.replace("draw_cost = 25", "draw_cost = 0");
        assert!(matches!(
            GachaConfig::from_toml_str(&source),
            Err(GachaError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_rejects_unnormalized_catalog() {
        let source = SAMPLE.replace("weight = 0.9", "weight = 0.95");
        assert!(matches!(
            GachaConfig::from_toml_str(&source),
            Err(GachaError::InvalidCatalog(_))
        ));
    }

    #[test]
    fn test_rejects_unknown_tier() {
        let source = SAMPLE.replace("\"Mitos\"", "\"Shiny\"");
        assert!(GachaConfig::from_toml_str(&source).is_err());
    }

    #[test]
    fn test_validated_catalog_checks_economy_first() {
        let config = GachaConfig {
            draw_cost: 0,
            ..GachaConfig::default()
        };
        assert!(matches!(config.validated_catalog(), Err(GachaError::InvalidConfig(_))));

        let catalog = GachaConfig::default().validated_catalog().unwrap();
        assert_eq!(catalog.len(), 7);
    }

    #[test]
    fn test_shipped_config_parses() {
        let source = include_str!("../../../config/mancing.toml");
        let config = GachaConfig::from_toml_str(source).unwrap();
        assert_eq!(config.catalog, GachaConfig::default_catalog());
    }
}
