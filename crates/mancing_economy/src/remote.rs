//! # Remote Draw Service
//!
//! The remote service is a black box that answers one request with one item
//! record. Its answer is untrusted: [`parse_remote_item`] turns the raw JSON
//! into a [`RarityEntry`] or rejects it with
//! [`GachaError::InvalidRemoteResult`].

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::catalog::{RarityCatalog, RarityEntry, RarityTier};
use crate::error::{GachaError, GachaResult};

/// A source of remote draws.
///
/// Implementations make exactly one attempt per call. Bounding the wait is the
/// resolver's job, not the service's.
#[async_trait]
pub trait RemoteDrawService: Send + Sync {
    /// Requests one draw and returns the raw payload.
    ///
    /// # Errors
    ///
    /// Returns [`GachaError::RemoteUnavailable`] on transport failure.
    async fn fetch(&self) -> GachaResult<Value>;
}

/// HTTP client for the draw endpoint (`GET <url>` answering a JSON item).
#[derive(Clone, Debug)]
pub struct HttpDrawService {
    client: reqwest::Client,
    url: String,
}

impl HttpDrawService {
    /// Creates a client for `url`.
    ///
    /// `connect_timeout` caps the TCP/TLS handshake only; the overall wait is
    /// bounded by the resolver.
    ///
    /// # Errors
    ///
    /// Returns [`GachaError::InvalidConfig`] if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, connect_timeout: Duration) -> GachaResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| GachaError::InvalidConfig(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(url, client))
    }

    /// Wraps an existing client.
    #[must_use]
    pub fn with_client(url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    /// The endpoint this client calls.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl RemoteDrawService for HttpDrawService {
    async fn fetch(&self) -> GachaResult<Value> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| GachaError::RemoteUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GachaError::RemoteUnavailable(format!(
                "draw endpoint answered {status}"
            )));
        }

        // A body that is not JSON at all is the service's fault, not the network's.
        response
            .json::<Value>()
            .await
            .map_err(|e| GachaError::InvalidRemoteResult(format!("body is not JSON: {e}")))
    }
}

/// Validates a remote payload into a catalog-shaped entry.
///
/// A name known to the catalog resolves to the catalog's own row. Unknown
/// names must carry a parseable `rarity`; `price`, `color` and `chance` are
/// optional.
///
/// # Errors
///
/// Returns [`GachaError::InvalidRemoteResult`] when the payload is not an
/// object, has no non-empty `name`, or names an unknown item without a valid
/// `rarity`.
pub fn parse_remote_item(payload: &Value, catalog: &RarityCatalog) -> GachaResult<RarityEntry> {
    let Some(record) = payload.as_object() else {
        return Err(GachaError::InvalidRemoteResult("payload is not an object".to_string()));
    };

    let name = record
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| GachaError::InvalidRemoteResult("missing item name".to_string()))?;

    if let Some(entry) = catalog.find_by_name(name) {
        return Ok(entry.clone());
    }

    let rarity = record
        .get("rarity")
        .and_then(Value::as_str)
        .ok_or_else(|| GachaError::InvalidRemoteResult(format!("{name}: missing rarity")))?
        .parse::<RarityTier>()
        .map_err(|_| GachaError::InvalidRemoteResult(format!("{name}: unknown rarity")))?;

    let price = record.get("price").and_then(Value::as_u64).unwrap_or(0);
    let weight = record
        .get("chance")
        .and_then(Value::as_f64)
        .map_or(0.0, |chance| chance.clamp(0.0, 1.0));
    let display_tag = record
        .get("color")
        .and_then(Value::as_str)
        .unwrap_or_default();

    Ok(RarityEntry::new(name, rarity, weight, price, display_tag))
}
