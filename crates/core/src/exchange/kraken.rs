//! Kraken Futures REST client for the read-only account endpoints.
//!
//! Private endpoints are signed with `Authent = base64(HMAC-SHA512(base64decode(secret),
//! SHA256(postData + nonce + endpointPath)))`, where `endpointPath` is the request path
//! without the `/derivatives` prefix.

use crate::config::Settings;
use crate::exchange::ExchangeClient;
use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Url;
use serde_json::Value;
use sha2::{Digest, Sha256, Sha512};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

type HmacSha512 = Hmac<Sha512>;

const DEFAULT_BASE_URL: &str = "https://futures.kraken.com";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

const PATH_ACCOUNTS: &str = "/derivatives/api/v3/accounts";
const PATH_OPEN_POSITIONS: &str = "/derivatives/api/v3/openpositions";
const PATH_OPEN_ORDERS: &str = "/derivatives/api/v3/openorders";
const PATH_FILLS: &str = "/derivatives/api/v3/fills";
const PATH_ORDER_HISTORY: &str = "/api/history/v3/orders";

pub struct KrakenFuturesClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    api_secret: String,
    last_nonce: AtomicU64,
}

impl std::fmt::Debug for KrakenFuturesClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KrakenFuturesClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl KrakenFuturesClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let (api_key, api_secret) = settings.require_kraken_credentials()?;

        let base_url = std::env::var("KRAKEN_FUTURES_BASE_URL")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let timeout_secs = std::env::var("KRAKEN_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Self::new(api_key, api_secret, &base_url, Duration::from_secs(timeout_secs))
    }

    pub fn new(api_key: &str, api_secret: &str, base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build Kraken http client")?;

        Ok(Self {
            http,
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
            api_secret: api_secret.to_string(),
            last_nonce: AtomicU64::new(0),
        })
    }

    /// Millisecond timestamp, bumped when two requests land in the same millisecond.
    fn next_nonce(&self) -> u64 {
        let now = chrono::Utc::now().timestamp_millis().max(0) as u64;
        let mut prev = self.last_nonce.load(Ordering::SeqCst);
        loop {
            let next = now.max(prev + 1);
            match self
                .last_nonce
                .compare_exchange(prev, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return next,
                Err(actual) => prev = actual,
            }
        }
    }

    fn url(&self, path: &str, query: &[(&str, String)]) -> Result<Url> {
        let mut url = Url::parse(&format!("{}{}", self.base_url.trim_end_matches('/'), path))
            .with_context(|| format!("invalid Kraken URL for {path}"))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in query {
                pairs.append_pair(k, v);
            }
        }
        Ok(url)
    }

    fn headers(&self, path: &str, post_data: &str) -> Result<HeaderMap> {
        let nonce = self.next_nonce().to_string();
        let authent = sign(&self.api_secret, post_data, &nonce, endpoint_path(path))?;

        let mut headers = HeaderMap::new();
        headers.insert("apikey", HeaderValue::from_str(&self.api_key)?);
        headers.insert("nonce", HeaderValue::from_str(&nonce)?);
        headers.insert("authent", HeaderValue::from_str(&authent)?);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    async fn get_private(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let url = self.url(path, query)?;
        let post_data = url.query().unwrap_or_default().to_string();
        let headers = self.headers(path, &post_data)?;

        let res = self
            .http
            .get(url)
            .headers(headers)
            .send()
            .await
            .with_context(|| format!("Kraken request failed: {path}"))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .with_context(|| format!("failed to read Kraken response: {path}"))?;
        if !status.is_success() {
            anyhow::bail!("Kraken HTTP {status} for {path}: {text}");
        }

        let body = serde_json::from_str::<Value>(&text)
            .with_context(|| format!("Kraken response is not valid JSON ({path}): {text}"))?;
        check_result(path, body)
    }
}

#[async_trait::async_trait]
impl ExchangeClient for KrakenFuturesClient {
    fn exchange_name(&self) -> &'static str {
        "kraken_futures"
    }

    async fn accounts(&self) -> Result<Value> {
        self.get_private(PATH_ACCOUNTS, &[]).await
    }

    async fn open_positions(&self) -> Result<Value> {
        self.get_private(PATH_OPEN_POSITIONS, &[]).await
    }

    async fn recent_orders(&self, limit: usize) -> Result<Value> {
        self.get_private(PATH_ORDER_HISTORY, &[("count", limit.to_string())])
            .await
    }

    async fn open_orders(&self) -> Result<Value> {
        self.get_private(PATH_OPEN_ORDERS, &[]).await
    }

    async fn fills(&self, limit: usize) -> Result<Value> {
        // The fills endpoint has no count parameter.
        let body = self.get_private(PATH_FILLS, &[]).await?;
        Ok(cap_array(body, "fills", limit))
    }
}

fn endpoint_path(path: &str) -> &str {
    path.strip_prefix("/derivatives").unwrap_or(path)
}

fn sign(secret_b64: &str, post_data: &str, nonce: &str, endpoint_path: &str) -> Result<String> {
    let mut sha = Sha256::new();
    sha.update(post_data.as_bytes());
    sha.update(nonce.as_bytes());
    sha.update(endpoint_path.as_bytes());
    let digest = sha.finalize();

    let secret = BASE64
        .decode(secret_b64.trim())
        .context("KRAKEN_SECRET_KEY is not valid base64")?;
    let mut mac = HmacSha512::new_from_slice(&secret)
        .map_err(|e| anyhow::anyhow!("invalid Kraken HMAC key: {e}"))?;
    mac.update(&digest);
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

/// Kraken answers 200 with `"result": "error"` for rejected requests.
fn check_result(path: &str, body: Value) -> Result<Value> {
    if body.get("result").and_then(Value::as_str) == Some("error") {
        let error = body
            .get("error")
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        anyhow::bail!("Kraken API error for {path}: {error}");
    }
    Ok(body)
}

fn cap_array(mut body: Value, key: &str, limit: usize) -> Value {
    if let Some(items) = body.get_mut(key).and_then(Value::as_array_mut) {
        items.truncate(limit);
    }
    body
}
