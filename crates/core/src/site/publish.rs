use crate::domain::page::GeneratedPage;
use crate::site::{SiteConfig, SiteState};
use crate::storage::{verify_file, write_atomic};
use anyhow::Context;

/// Present only in the placeholder page.
pub const PLACEHOLDER_MARKER: &str = "data-placeholder=\"generating\"";

const PLACEHOLDER_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Primate - generating</title>
<style>
  body { margin: 0; min-height: 100vh; display: flex; align-items: center; justify-content: center;
         font-family: system-ui, sans-serif; background: #1e1e1e; color: #f5f5f5; }
  .spinner { width: 48px; height: 48px; border: 4px solid #555; border-top-color: #3498db;
             border-radius: 50%; animation: spin 1s linear infinite; margin: 0 auto 1.5rem; }
  @keyframes spin { to { transform: rotate(360deg); } }
</style>
</head>
<body data-placeholder="generating">
<main>
  <div class="spinner"></div>
  <p>The site is being generated. This page refreshes automatically.</p>
</main>
<script>setTimeout(function () { window.location.reload(); }, 10000);</script>
</body>
</html>
"#;

/// Write the placeholder unless a page is already there. Returns the state the server
/// starts in: an existing generated page counts as last-known-good.
pub async fn publish_placeholder_if_missing(config: &SiteConfig) -> anyhow::Result<SiteState> {
    let path = config.page_path();
    match tokio::fs::read_to_string(&path).await {
        Ok(existing) if !existing.contains(PLACEHOLDER_MARKER) => {
            tracing::info!(path = %path.display(), "serving previously generated page");
            return Ok(SiteState::ServingLive);
        }
        Ok(_) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => {
            return Err(err).with_context(|| format!("read {} failed", path.display()));
        }
    }

    write_atomic(&path, PLACEHOLDER_HTML.as_bytes()).await?;
    tracing::info!(path = %path.display(), "placeholder page published");
    Ok(SiteState::ServingPlaceholder)
}

/// Replace the live page. Callers only get here with a fully extracted document.
pub async fn publish_page(config: &SiteConfig, page: &GeneratedPage) -> anyhow::Result<u64> {
    let path = config.page_path();
    write_atomic(&path, page.html.as_bytes()).await?;
    let bytes = verify_file(&path).await?;
    tracing::info!(
        path = %path.display(),
        bytes,
        rule = ?page.rule,
        "website generated"
    );

    if let Some(delay) = config.echo_delay {
        echo_lines(&page.html, delay).await;
    }
    Ok(bytes)
}

async fn echo_lines(html: &str, delay: std::time::Duration) {
    for (n, line) in html.lines().enumerate() {
        tracing::debug!(line_no = n + 1, "{line}");
        tokio::time::sleep(delay).await;
    }
}
