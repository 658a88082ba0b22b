use crate::site::{SiteConfig, SiteStatus};
use anyhow::Context;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::{routing::get, Json, Router};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Static files from the serving root, plus two small operational routes. Dotfiles
/// (`.env`, in-flight `.index.html.*.tmp`) are never served.
pub fn router(config: &SiteConfig, status: watch::Receiver<SiteStatus>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/status", get(get_status))
        .fallback_service(ServeDir::new(config.root()))
        .with_state(status)
        .layer(middleware::from_fn(refuse_hidden_paths))
        .layer(TraceLayer::new_for_http())
}

async fn refuse_hidden_paths(req: Request, next: Next) -> Response {
    if is_hidden_path(req.uri().path()) {
        return StatusCode::NOT_FOUND.into_response();
    }
    next.run(req).await
}

/// Any segment starting with `.`, including the percent-encoded form `ServeDir` decodes.
fn is_hidden_path(path: &str) -> bool {
    path.split('/').any(|seg| {
        seg.starts_with('.') || seg.get(..3).is_some_and(|p| p.eq_ignore_ascii_case("%2e"))
    })
}

pub async fn bind(config: &SiteConfig) -> anyhow::Result<TcpListener> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr} failed"))
}

/// Serve until `shutdown` is cancelled.
pub async fn serve(
    listener: TcpListener,
    config: &SiteConfig,
    status: watch::Receiver<SiteStatus>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let addr = listener.local_addr().context("listener has no local address")?;
    let files = served_files(config).await.unwrap_or_default();
    tracing::info!(
        %addr,
        root = %config.root().display(),
        ?files,
        "web server running"
    );

    axum::serve(listener, router(config, status))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("web server failed")?;

    tracing::info!("web server stopped");
    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

async fn get_status(State(status): State<watch::Receiver<SiteStatus>>) -> Json<SiteStatus> {
    Json(status.borrow().clone())
}

/// `.html` and `.json` files directly under the serving root, sorted.
pub async fn served_files(config: &SiteConfig) -> anyhow::Result<Vec<String>> {
    let mut out = Vec::new();
    let mut dir = tokio::fs::read_dir(config.root())
        .await
        .with_context(|| format!("read_dir {} failed", config.root().display()))?;
    while let Some(entry) = dir.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with('.') && (name.ends_with(".html") || name.ends_with(".json")) {
            out.push(name);
        }
    }
    out.sort();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::site::publish::{publish_placeholder_if_missing, PLACEHOLDER_MARKER};
    use crate::site::SiteState;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    async fn get(app: Router, uri: &str) -> (StatusCode, String) {
        let res = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = res.status();
        let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn serves_index_and_snapshot_from_root() {
        let dir = tempfile::tempdir().unwrap();
        let config = SiteConfig::new(dir.path());
        publish_placeholder_if_missing(&config).await.unwrap();
        tokio::fs::write(config.snapshot_path(), b"{\"accounts\":{}}")
            .await
            .unwrap();
        let (_tx, rx) = watch::channel(SiteStatus::new(SiteState::ServingPlaceholder));

        let (code, body) = get(router(&config, rx.clone()), "/").await;
        assert_eq!(code, StatusCode::OK);
        assert!(body.contains(PLACEHOLDER_MARKER));

        let (code, body) = get(router(&config, rx.clone()), "/kraken.json").await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body, "{\"accounts\":{}}");

        let (code, _) = get(router(&config, rx), "/missing.html").await;
        assert_eq!(code, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn dotfiles_in_root_are_not_served() {
        let dir = tempfile::tempdir().unwrap();
        let config = SiteConfig::new(dir.path());
        tokio::fs::write(dir.path().join(".env"), b"KRAKEN_SECRET_KEY=hunter2")
            .await
            .unwrap();
        tokio::fs::write(dir.path().join(".index.html.abc.tmp"), b"<html>half")
            .await
            .unwrap();
        tokio::fs::create_dir(dir.path().join(".git")).await.unwrap();
        tokio::fs::write(dir.path().join(".git").join("config"), b"[core]")
            .await
            .unwrap();
        let (_tx, rx) = watch::channel(SiteStatus::new(SiteState::ServingPlaceholder));

        for uri in ["/.env", "/%2eenv", "/%2Eenv", "/.index.html.abc.tmp", "/.git/config"] {
            let (code, body) = get(router(&config, rx.clone()), uri).await;
            assert_eq!(code, StatusCode::NOT_FOUND, "{uri}");
            assert!(!body.contains("hunter2"), "{uri}");
        }
    }

    #[test]
    fn hidden_path_detection() {
        assert!(is_hidden_path("/.env"));
        assert!(is_hidden_path("/assets/.secret/x.js"));
        assert!(is_hidden_path("/%2Eenv"));
        assert!(!is_hidden_path("/"));
        assert!(!is_hidden_path("/index.html"));
        assert!(!is_hidden_path("/kraken.json"));
    }

    #[tokio::test]
    async fn status_reflects_scheduler_updates() {
        let dir = tempfile::tempdir().unwrap();
        let config = SiteConfig::new(dir.path());
        let (tx, rx) = watch::channel(SiteStatus::new(SiteState::ServingPlaceholder));

        let (code, body) = get(router(&config, rx.clone()), "/status").await;
        assert_eq!(code, StatusCode::OK);
        assert!(body.contains("\"SERVING_PLACEHOLDER\""));

        tx.send_modify(|s| s.state = SiteState::ServingLive);
        let (_, body) = get(router(&config, rx.clone()), "/status").await;
        assert!(body.contains("\"SERVING_LIVE\""));

        let (_, body) = get(router(&config, rx), "/healthz").await;
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn lists_only_html_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let config = SiteConfig::new(dir.path());
        for name in ["index.html", "kraken.json", "notes.txt", ".index.html.tmp"] {
            tokio::fs::write(dir.path().join(name), b"x").await.unwrap();
        }
        assert_eq!(
            served_files(&config).await.unwrap(),
            vec!["index.html".to_string(), "kraken.json".to_string()]
        );
    }

    #[tokio::test]
    async fn serve_stops_on_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SiteConfig::new(dir.path());
        config.port = 0;
        let listener = bind(&config).await.unwrap();
        let (_tx, rx) = watch::channel(SiteStatus::new(SiteState::ServingPlaceholder));
        let shutdown = CancellationToken::new();

        let handle = tokio::spawn({
            let shutdown = shutdown.clone();
            async move { serve(listener, &config, rx, shutdown).await }
        });
        shutdown.cancel();
        handle.await.unwrap().unwrap();
    }
}
