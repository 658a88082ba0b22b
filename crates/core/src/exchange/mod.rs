pub mod kraken;

use crate::config::Settings;
use crate::domain::snapshot::AccountSnapshot;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;

/// Read-only view of an exchange account. Every call returns the raw JSON body.
#[async_trait::async_trait]
pub trait ExchangeClient: Send + Sync {
    fn exchange_name(&self) -> &'static str;

    async fn accounts(&self) -> Result<Value>;

    async fn open_positions(&self) -> Result<Value>;

    async fn recent_orders(&self, limit: usize) -> Result<Value>;

    async fn open_orders(&self) -> Result<Value>;

    async fn fills(&self, limit: usize) -> Result<Value>;
}

/// Where the generation cycle gets its account data from.
#[derive(Clone)]
pub enum ExchangeSource {
    /// Brochure-only site; no snapshot is fetched or embedded.
    Disabled,
    /// Credentials were missing or the client could not be built; every cycle
    /// writes the fallback snapshot with this reason.
    Unavailable(String),
    Client(Arc<dyn ExchangeClient>),
}

impl std::fmt::Debug for ExchangeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disabled => f.write_str("Disabled"),
            Self::Unavailable(reason) => f.debug_tuple("Unavailable").field(reason).finish(),
            Self::Client(c) => f.debug_tuple("Client").field(&c.exchange_name()).finish(),
        }
    }
}

/// Build the source for a run. Missing credentials do not stop the process; they
/// degrade every cycle to the fallback snapshot.
pub fn source_from_settings(settings: &Settings, enabled: bool) -> ExchangeSource {
    if !enabled {
        return ExchangeSource::Disabled;
    }
    match kraken::KrakenFuturesClient::from_settings(settings) {
        Ok(client) => ExchangeSource::Client(Arc::new(client)),
        Err(err) => {
            tracing::warn!(error = %err, "Kraken client unavailable");
            ExchangeSource::Unavailable(format!("{err:#}"))
        }
    }
}

/// Fetch all five sections. Any failure aborts the whole snapshot; partial data is
/// never returned.
pub async fn fetch_snapshot(
    client: &dyn ExchangeClient,
    history_limit: usize,
    now: DateTime<Utc>,
) -> Result<AccountSnapshot> {
    let exchange = client.exchange_name();

    let accounts = client
        .accounts()
        .await
        .with_context(|| format!("{exchange}: fetch accounts failed"))?;
    tracing::info!(exchange, "fetched account balances");

    let open_positions = client
        .open_positions()
        .await
        .with_context(|| format!("{exchange}: fetch open positions failed"))?;
    tracing::info!(exchange, "fetched open positions");

    let recent_orders = client
        .recent_orders(history_limit)
        .await
        .with_context(|| format!("{exchange}: fetch recent orders failed"))?;
    tracing::info!(exchange, limit = history_limit, "fetched recent orders");

    let open_orders = client
        .open_orders()
        .await
        .with_context(|| format!("{exchange}: fetch open orders failed"))?;
    tracing::info!(exchange, "fetched open orders");

    let fills = client
        .fills(history_limit)
        .await
        .with_context(|| format!("{exchange}: fetch fills failed"))?;
    tracing::info!(exchange, limit = history_limit, "fetched recent fills");

    Ok(AccountSnapshot::new(
        accounts,
        open_positions,
        recent_orders,
        open_orders,
        fills,
        now,
    ))
}

/// Live snapshot when the exchange answers, otherwise the error-marked fallback.
/// Returns `None` only when the source is disabled.
pub async fn snapshot_or_fallback(
    source: &ExchangeSource,
    history_limit: usize,
    now: DateTime<Utc>,
) -> Option<AccountSnapshot> {
    match source {
        ExchangeSource::Disabled => None,
        ExchangeSource::Unavailable(reason) => {
            tracing::warn!(%reason, "exchange unavailable; using fallback snapshot");
            Some(AccountSnapshot::fallback(now, reason))
        }
        ExchangeSource::Client(client) => {
            match fetch_snapshot(client.as_ref(), history_limit, now).await {
                Ok(snapshot) => Some(snapshot),
                Err(err) => {
                    sentry_anyhow::capture_anyhow(&err);
                    tracing::error!(error = %format!("{err:#}"), "exchange fetch failed; using fallback snapshot");
                    Some(AccountSnapshot::fallback(now, &format!("{err:#}")))
                }
            }
        }
    }
}
