pub mod snapshot;

use anyhow::Context;
use std::path::Path;
use tokio::io::AsyncWriteExt;

/// Replace `path` with `bytes` without ever exposing a truncated file: the content is
/// written to a sibling temp file, synced, then renamed over the target.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let name = path
        .file_name()
        .with_context(|| format!("not a file path: {}", path.display()))?
        .to_string_lossy();
    let tmp = dir.join(format!(".{name}.{}.tmp", uuid::Uuid::new_v4().simple()));

    let res = async {
        let mut file = tokio::fs::File::create(&tmp)
            .await
            .with_context(|| format!("create {} failed", tmp.display()))?;
        file.write_all(bytes)
            .await
            .with_context(|| format!("write {} failed", tmp.display()))?;
        file.sync_all()
            .await
            .with_context(|| format!("sync {} failed", tmp.display()))?;
        drop(file);
        tokio::fs::rename(&tmp, path)
            .await
            .with_context(|| format!("rename {} -> {} failed", tmp.display(), path.display()))
    }
    .await;

    if res.is_err() {
        let _ = tokio::fs::remove_file(&tmp).await;
    }
    res
}

/// Log existence and size of a written file. Returns the size.
pub async fn verify_file(path: &Path) -> anyhow::Result<u64> {
    let meta = tokio::fs::metadata(path)
        .await
        .with_context(|| format!("{} was not created", path.display()))?;
    tracing::info!(path = %path.display(), bytes = meta.len(), "file verification");
    Ok(meta.len())
}
