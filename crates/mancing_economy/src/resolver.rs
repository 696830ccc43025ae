//! # Draw Resolver
//!
//! Decides, per draw, where the outcome comes from:
//!
//! ```text
//! override set & tier in catalog ──> ForcedOverride
//!          │ (no match: ignored, warned)
//!          ▼
//! remote configured ──> race(fetch, timer) ──ok──> validate ──ok──> Remote
//!          │                 │ timeout / transport     │ invalid
//!          ▼                 ▼                         ▼
//!       catalog.sample(rng) ─────────────────────> LocalFallback
//! ```
//!
//! The resolver never fails and never retries: one remote attempt, one
//! bounded wait, then fallback. It keeps no state between draws.

use rand::Rng;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::catalog::{RarityCatalog, RarityEntry, RarityTier};
use crate::error::{GachaError, GachaResult};
use crate::remote::{parse_remote_item, RemoteDrawService};

/// Default time budget for the remote call.
pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(3);

/// Where an outcome came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DrawSource {
    /// Returned by the remote draw service.
    Remote,
    /// Sampled from the local catalog.
    LocalFallback,
    /// Pinned by an operator override.
    ForcedOverride,
}

impl DrawSource {
    /// Short label used in logs and the CLI.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::LocalFallback => "local-fallback",
            Self::ForcedOverride => "forced-override",
        }
    }
}

/// The result of one draw. Never mutated after creation.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DrawOutcome {
    entry: RarityEntry,
    source: DrawSource,
}

impl DrawOutcome {
    /// Wraps an entry with its source tag.
    #[must_use]
    pub fn new(entry: RarityEntry, source: DrawSource) -> Self {
        Self { entry, source }
    }

    /// The drawn item.
    #[must_use]
    pub fn entry(&self) -> &RarityEntry {
        &self.entry
    }

    /// Where the item came from.
    #[must_use]
    pub fn source(&self) -> DrawSource {
        self.source
    }

    /// Shorthand for `entry().rarity`.
    #[must_use]
    pub fn rarity(&self) -> RarityTier {
        self.entry.rarity
    }
}

/// Resolves draws against a catalog and an optional remote service.
#[derive(Clone)]
pub struct DrawResolver {
    catalog: Arc<RarityCatalog>,
    remote: Option<Arc<dyn RemoteDrawService>>,
    timeout: Duration,
}

impl DrawResolver {
    /// Creates an offline resolver: every draw is sampled locally.
    #[must_use]
    pub fn local(catalog: Arc<RarityCatalog>) -> Self {
        Self {
            catalog,
            remote: None,
            timeout: DEFAULT_REMOTE_TIMEOUT,
        }
    }

    /// Creates a resolver that tries `remote` first, waiting at most `timeout`.
    #[must_use]
    pub fn with_remote(
        catalog: Arc<RarityCatalog>,
        remote: Arc<dyn RemoteDrawService>,
        timeout: Duration,
    ) -> Self {
        Self {
            catalog,
            remote: Some(remote),
            timeout,
        }
    }

    /// The catalog used for fallback and override lookups.
    #[must_use]
    pub fn catalog(&self) -> &Arc<RarityCatalog> {
        &self.catalog
    }

    /// The remote time budget.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Whether a remote service is configured.
    #[must_use]
    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Resolves one draw. Never fails.
    ///
    /// An `override_tier` with no matching catalog entry is ignored and the
    /// draw proceeds normally.
    pub async fn draw<R: Rng + ?Sized>(
        &self,
        override_tier: Option<RarityTier>,
        rng: &mut R,
    ) -> DrawOutcome {
        if let Some(tier) = override_tier {
            if let Some(entry) = self.catalog.find_by_tier(tier) {
                tracing::debug!(%tier, name = %entry.name, "draw forced by override");
                return DrawOutcome::new(entry.clone(), DrawSource::ForcedOverride);
            }
            tracing::warn!(%tier, "override tier has no catalog entry, ignoring override");
        }

        match self.try_remote().await {
            Some(Ok(entry)) => {
                tracing::debug!(name = %entry.name, rarity = %entry.rarity, "remote draw accepted");
                return DrawOutcome::new(entry, DrawSource::Remote);
            }
            Some(Err(err)) => {
                tracing::warn!(error = %err, "remote draw failed, falling back to local catalog");
            }
            None => {}
        }

        let entry = self.catalog.sample(rng).clone();
        tracing::debug!(name = %entry.name, rarity = %entry.rarity, "local draw");
        DrawOutcome::new(entry, DrawSource::LocalFallback)
    }

    /// One bounded remote attempt. `None` when no service is configured.
    async fn try_remote(&self) -> Option<GachaResult<RarityEntry>> {
        let remote = self.remote.as_ref()?;

        let result = match tokio::time::timeout(self.timeout, remote.fetch()).await {
            Ok(Ok(payload)) => parse_remote_item(&payload, &self.catalog),
            Ok(Err(err)) => Err(err),
            Err(_elapsed) => Err(GachaError::RemoteTimeout(self.timeout)),
        };
        Some(result)
    }
}

impl std::fmt::Debug for DrawResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrawResolver")
            .field("entries", &self.catalog.len())
            .field("remote", &self.remote.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}
