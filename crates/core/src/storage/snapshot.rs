use crate::domain::snapshot::AccountSnapshot;
use crate::storage::write_atomic;
use anyhow::Context;
use std::path::Path;

pub async fn persist(path: &Path, snapshot: &AccountSnapshot) -> anyhow::Result<u64> {
    let body = serde_json::to_vec_pretty(snapshot).context("serialize snapshot failed")?;
    write_atomic(path, &body).await?;
    tracing::info!(
        path = %path.display(),
        bytes = body.len(),
        fallback = snapshot.is_fallback(),
        "snapshot saved"
    );
    Ok(body.len() as u64)
}

/// Raw file text, as embedded in the prompt.
pub async fn read_raw(path: &Path) -> anyhow::Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("read snapshot {} failed", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn persisted_fallback_is_readable_and_marked() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kraken.json");
        let ts = Utc.with_ymd_and_hms(2026, 2, 2, 2, 2, 2).unwrap();

        persist(&path, &AccountSnapshot::fallback(ts, "offline")).await.unwrap();

        let raw = read_raw(&path).await.unwrap();
        let back: AccountSnapshot = serde_json::from_str(&raw).unwrap();
        assert!(back.is_fallback());
        assert_eq!(back.timestamp, ts);
        assert!(raw.contains("\"error\""));
    }
}
