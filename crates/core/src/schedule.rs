//! Hourly refresh loop.
//!
//! `ServingPlaceholder -> Generating -> ServingLive -> (next hour) Generating -> ...`
//! A failed attempt returns to whatever was being served before it started.

use crate::generate::{GenerationReport, Generator};
use crate::llm::error::LlmDiagnosticsError;
use crate::prompt::truncate_chars;
use crate::site::{SiteState, SiteStatus};
use crate::time::clock::{next_hour, remaining_until};
use chrono::{DateTime, Local};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    /// One attempt at startup, then serve whatever is there.
    Once,
    /// Attempt at startup and again at every wall-clock hour.
    Hourly,
}

pub struct RefreshScheduler {
    generator: Arc<Generator>,
    status: watch::Sender<SiteStatus>,
    shutdown: CancellationToken,
    mode: RefreshMode,
}

impl RefreshScheduler {
    pub fn new(
        generator: Arc<Generator>,
        status: watch::Sender<SiteStatus>,
        shutdown: CancellationToken,
        mode: RefreshMode,
    ) -> Self {
        Self {
            generator,
            status,
            shutdown,
            mode,
        }
    }

    /// One generation attempt with state bookkeeping. Never fails the caller.
    pub async fn run_cycle(&self) -> Option<GenerationReport> {
        let serving = match self.status.borrow().state {
            SiteState::Generating => SiteState::ServingPlaceholder,
            other => other,
        };
        self.status.send_modify(|s| s.state = SiteState::Generating);

        match self.generator.run_once(Local::now()).await {
            Ok(report) => {
                tracing::info!(
                    run_id = %report.run_id,
                    bytes = report.page_bytes,
                    snapshot = ?report.snapshot,
                    "site refreshed"
                );
                self.status.send_modify(|s| {
                    s.state = SiteState::ServingLive;
                    s.last_success = Some(report.generated_at);
                    s.last_error = None;
                });
                Some(report)
            }
            Err(err) => {
                sentry_anyhow::capture_anyhow(&err);
                if let Some((stage, preview)) = provider_body_preview(&err) {
                    tracing::warn!(stage, %preview, "provider returned an error body");
                }
                let message = format!("{err:#}");
                tracing::error!(error = %message, state = ?serving, "generation failed; keeping current page");
                self.status.send_modify(|s| {
                    s.state = serving;
                    s.last_error = Some(message);
                });
                None
            }
        }
    }

    pub async fn run(self) {
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                _ = self.run_cycle() => {}
            }

            if self.mode == RefreshMode::Once {
                tracing::info!("single refresh done; scheduler exiting");
                return;
            }

            let next = next_hour(&Local::now());
            tracing::info!(%next, "next refresh scheduled");
            if !self.sleep_until(next).await {
                break;
            }
        }
        tracing::info!("refresh scheduler stopped");
    }

    /// Sleep until the wall clock reads `target`. The tokio timer is monotonic, so a
    /// wake-up that lands while the wall clock still lags sleeps again for the rest.
    /// Returns `false` when cancelled first.
    async fn sleep_until(&self, target: DateTime<Local>) -> bool {
        while let Some(left) = remaining_until(&target, &Local::now()) {
            tokio::select! {
                _ = self.shutdown.cancelled() => return false,
                _ = tokio::time::sleep(left) => {}
            }
        }
        true
    }
}

/// Stage and leading raw body of a provider failure, looked up through any context.
fn provider_body_preview(err: &anyhow::Error) -> Option<(&'static str, String)> {
    let diag = err.downcast_ref::<LlmDiagnosticsError>()?;
    let raw = diag.raw_output.as_deref().unwrap_or_default();
    let (preview, _) = truncate_chars(raw, 500);
    Some((diag.stage, preview.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::ExchangeSource;
    use crate::generate::GenerateOptions;
    use crate::llm::fake::FakeLlm;
    use crate::llm::gemini::GeminiClient;
    use crate::prompt::PromptSpec;
    use crate::site::publish::{publish_placeholder_if_missing, PLACEHOLDER_MARKER};
    use crate::site::server::router;
    use crate::site::SiteConfig;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use std::time::Duration;
    use tower::ServiceExt;

    const CANNED: &str =
        "Here is your site:\n```html\n<!DOCTYPE html>...<html>...</html>\n```\n";

    fn generator(root: &std::path::Path, responses: Vec<Result<String, String>>) -> Arc<Generator> {
        Arc::new(Generator {
            site: SiteConfig::new(root),
            prompt: PromptSpec::default(),
            exchange: ExchangeSource::Disabled,
            llm: Arc::new(FakeLlm::replying(responses)),
            options: GenerateOptions::default(),
        })
    }

    async fn index(config: &SiteConfig, rx: watch::Receiver<SiteStatus>) -> String {
        let res = router(config, rx)
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(body.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn placeholder_is_served_then_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let config = SiteConfig::new(dir.path());
        let initial = publish_placeholder_if_missing(&config).await.unwrap();
        let (tx, rx) = watch::channel(SiteStatus::new(initial));

        let before = index(&config, rx.clone()).await;
        assert!(before.contains(PLACEHOLDER_MARKER));
        assert!(before.contains("location.reload()"));

        let scheduler = RefreshScheduler::new(
            generator(dir.path(), vec![Ok(CANNED.to_string())]),
            tx,
            CancellationToken::new(),
            RefreshMode::Once,
        );
        scheduler.run().await;

        assert_eq!(rx.borrow().state, SiteState::ServingLive);
        assert!(rx.borrow().last_success.is_some());
        let after = index(&config, rx.clone()).await;
        assert_eq!(after, "<!DOCTYPE html>...<html>...</html>");
        assert_ne!(after, before);
        assert!(!after.contains("location.reload()"));
    }

    #[tokio::test]
    async fn failure_reverts_to_previous_serving_state() {
        let dir = tempfile::tempdir().unwrap();
        let config = SiteConfig::new(dir.path());
        let (tx, rx) = watch::channel(SiteStatus::new(
            publish_placeholder_if_missing(&config).await.unwrap(),
        ));

        let scheduler = RefreshScheduler::new(
            generator(
                dir.path(),
                vec![Err("HTTP 503".to_string()), Ok(CANNED.to_string()), Ok("```".to_string())],
            ),
            tx,
            CancellationToken::new(),
            RefreshMode::Hourly,
        );

        assert!(scheduler.run_cycle().await.is_none());
        assert_eq!(rx.borrow().state, SiteState::ServingPlaceholder);
        assert!(rx.borrow().last_error.as_deref().unwrap().contains("HTTP 503"));

        assert!(scheduler.run_cycle().await.is_some());
        assert_eq!(rx.borrow().state, SiteState::ServingLive);
        assert!(rx.borrow().last_error.is_none());

        // Later failures keep serving the last good page.
        assert!(scheduler.run_cycle().await.is_none());
        assert_eq!(rx.borrow().state, SiteState::ServingLive);
        let page = tokio::fs::read_to_string(config.page_path()).await.unwrap();
        assert_eq!(page, "<!DOCTYPE html>...<html>...</html>");
    }

    #[tokio::test]
    async fn provider_error_body_is_reported_and_page_kept() {
        let dir = tempfile::tempdir().unwrap();
        let config = SiteConfig::new(dir.path());
        let (tx, rx) = watch::channel(SiteStatus::new(
            publish_placeholder_if_missing(&config).await.unwrap(),
        ));

        let body = format!(r#"{{"error":"{}"}}"#, "x".repeat(600));
        let base_url = crate::stub::spawn(axum::Router::new().fallback({
            let body = body.clone();
            move || async move { (StatusCode::SERVICE_UNAVAILABLE, body) }
        }))
        .await;
        let gemini = GeminiClient::new("test-key", &base_url, "gemini-test", Duration::from_secs(5))
            .unwrap();
        let generator = Arc::new(Generator {
            site: config.clone(),
            prompt: PromptSpec::default(),
            exchange: ExchangeSource::Disabled,
            llm: Arc::new(gemini),
            options: GenerateOptions::default(),
        });
        let scheduler = RefreshScheduler::new(
            generator.clone(),
            tx,
            CancellationToken::new(),
            RefreshMode::Once,
        );

        let err = generator.run_once(Local::now()).await.unwrap_err();
        let (stage, preview) = provider_body_preview(&err).unwrap();
        assert_eq!(stage, "http");
        assert_eq!(preview.chars().count(), 500);
        assert!(body.starts_with(&preview));

        assert!(scheduler.run_cycle().await.is_none());
        assert_eq!(rx.borrow().state, SiteState::ServingPlaceholder);
        assert!(rx.borrow().last_error.as_deref().unwrap().contains("stage=http"));
        let page = tokio::fs::read_to_string(config.page_path()).await.unwrap();
        assert!(page.contains(PLACEHOLDER_MARKER));
    }

    #[test]
    fn plain_errors_have_no_provider_preview() {
        assert!(provider_body_preview(&anyhow::anyhow!("connection reset")).is_none());
    }

    #[tokio::test]
    async fn hourly_loop_stops_on_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = watch::channel(SiteStatus::new(SiteState::ServingPlaceholder));
        let shutdown = CancellationToken::new();

        let scheduler = RefreshScheduler::new(
            generator(dir.path(), vec![Ok(CANNED.to_string())]),
            tx,
            shutdown.clone(),
            RefreshMode::Hourly,
        );
        let handle = tokio::spawn(scheduler.run());

        rx.wait_for(|s| s.state == SiteState::ServingLive)
            .await
            .unwrap();
        shutdown.cancel();
        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .expect("scheduler did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn cancel_before_start_skips_generation() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = watch::channel(SiteStatus::new(SiteState::ServingPlaceholder));
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        RefreshScheduler::new(
            generator(dir.path(), vec![Ok(CANNED.to_string())]),
            tx,
            shutdown,
            RefreshMode::Hourly,
        )
        .run()
        .await;

        assert_eq!(rx.borrow().state, SiteState::ServingPlaceholder);
        assert!(!dir.path().join("index.html").exists());
    }
}
