//! # Gacha Error Types
//!
//! All errors that can occur in the draw pipeline.
//!
//! Remote-related variants never leave the [`DrawResolver`](crate::DrawResolver):
//! they are recovered by a local fallback draw. A caller of
//! [`GachaMachine::pull`](crate::GachaMachine::pull) only ever sees
//! [`GachaError::InsufficientBalance`] or a [`GachaError::Storage`] failure.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur in the gacha economy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GachaError {
    /// The remote draw service answered with a payload we cannot use.
    #[error("invalid remote result: {0}")]
    InvalidRemoteResult(String),

    /// The remote draw service did not answer within the time budget.
    #[error("remote draw timed out after {}ms", .0.as_millis())]
    RemoteTimeout(Duration),

    /// The remote draw service could not be reached.
    #[error("remote draw service unavailable: {0}")]
    RemoteUnavailable(String),

    /// The ledger cannot cover the draw cost.
    #[error("insufficient balance: have {balance}, draw costs {cost}")]
    InsufficientBalance {
        /// Balance at the time of the rejected debit.
        balance: u64,
        /// The cost that was requested.
        cost: u64,
    },

    /// The rarity catalog violates one of its construction invariants.
    #[error("invalid catalog: {0}")]
    InvalidCatalog(String),

    /// Invalid configuration file.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The persistence collaborator failed to read or write.
    #[error("storage failure: {0}")]
    Storage(String),
}

impl GachaError {
    /// Returns `true` for the errors the resolver recovers from by falling back.
    #[must_use]
    pub const fn is_remote(&self) -> bool {
        matches!(
            self,
            Self::InvalidRemoteResult(_) | Self::RemoteTimeout(_) | Self::RemoteUnavailable(_)
        )
    }
}

/// Result type for gacha operations.
pub type GachaResult<T> = Result<T, GachaError>;
