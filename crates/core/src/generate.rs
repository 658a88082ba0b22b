//! One generation attempt: snapshot → prompt → completion → extraction → publish.

use crate::domain::page::GeneratedPage;
use crate::exchange::{self, ExchangeSource};
use crate::llm::html::{extract_html, ExtractRule, Extraction};
use crate::llm::LlmClient;
use crate::prompt::{truncate_chars, PromptInput, PromptSpec};
use crate::site::publish::publish_page;
use crate::site::SiteConfig;
use crate::storage::{self, snapshot};
use crate::time::clock::lightness_level;
use anyhow::Context;
use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::Instrument;

const RESPONSE_PREVIEW_CHARS: usize = 500;

#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Cap for recent orders and fills.
    pub history_limit: usize,
    /// Inline the clock-derived lightness level into the brief.
    pub theme: bool,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            history_limit: crate::exchange::kraken::DEFAULT_HISTORY_LIMIT,
            theme: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotKind {
    Skipped,
    Live,
    Fallback,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreparedPrompt {
    pub prompt: String,
    pub snapshot: SnapshotKind,
    pub lightness: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationReport {
    pub run_id: uuid::Uuid,
    pub snapshot: SnapshotKind,
    pub rule: ExtractRule,
    pub page_bytes: u64,
    pub generated_at: DateTime<Utc>,
}

/// Refresh the snapshot file (live or fallback) and build the prompt from it.
/// Nothing here touches the published page.
pub async fn prepare_prompt(
    site: &SiteConfig,
    spec: &PromptSpec,
    source: &ExchangeSource,
    options: &GenerateOptions,
    now: DateTime<Local>,
) -> anyhow::Result<PreparedPrompt> {
    let now_utc = now.with_timezone(&Utc);
    let snap = exchange::snapshot_or_fallback(source, options.history_limit, now_utc).await;

    let (snapshot_json, kind) = match snap {
        None => (None, SnapshotKind::Skipped),
        Some(snap) => {
            let path = site.snapshot_path();
            snapshot::persist(&path, &snap).await?;
            storage::verify_file(&path).await?;
            let kind = if snap.is_fallback() {
                SnapshotKind::Fallback
            } else {
                SnapshotKind::Live
            };
            (Some(snapshot::read_raw(&path).await?), kind)
        }
    };

    let lightness = options.theme.then(|| lightness_level(&now));
    let prompt = spec.build(PromptInput {
        snapshot_json: snapshot_json.as_deref(),
        lightness,
    });

    Ok(PreparedPrompt {
        prompt,
        snapshot: kind,
        lightness,
    })
}

pub struct Generator {
    pub site: SiteConfig,
    pub prompt: PromptSpec,
    pub exchange: ExchangeSource,
    pub llm: Arc<dyn LlmClient>,
    pub options: GenerateOptions,
}

impl Generator {
    pub async fn prepare_prompt(&self, now: DateTime<Local>) -> anyhow::Result<PreparedPrompt> {
        prepare_prompt(&self.site, &self.prompt, &self.exchange, &self.options, now).await
    }

    pub async fn run_once(&self, now: DateTime<Local>) -> anyhow::Result<GenerationReport> {
        let run_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!("generate", %run_id, provider = ?self.llm.provider());
        self.run_inner(run_id, now).instrument(span).await
    }

    async fn run_inner(
        &self,
        run_id: uuid::Uuid,
        now: DateTime<Local>,
    ) -> anyhow::Result<GenerationReport> {
        let prepared = self.prepare_prompt(now).await?;
        tracing::info!(
            snapshot = ?prepared.snapshot,
            lightness = ?prepared.lightness,
            prompt_chars = prepared.prompt.chars().count(),
            "generating website"
        );

        let response = self
            .llm
            .complete(&prepared.prompt)
            .await
            .context("completion request failed")?;

        let (preview, _) = truncate_chars(&response, RESPONSE_PREVIEW_CHARS);
        tracing::info!(response_chars = response.chars().count(), "raw response received");
        tracing::debug!(%preview, "raw response preview");

        let (html, rule) = match extract_html(Some(&response)) {
            Extraction::Html { html, rule } => (html, rule),
            Extraction::Malformed(reason) => {
                anyhow::bail!("malformed model response: {reason}")
            }
            Extraction::Empty => anyhow::bail!("model response contained no HTML"),
        };
        tracing::info!(?rule, html_chars = html.chars().count(), "extracted HTML");

        let page = GeneratedPage {
            html,
            rule,
            generated_at: Utc::now(),
        };
        let page_bytes = publish_page(&self.site, &page).await?;

        Ok(GenerationReport {
            run_id,
            snapshot: prepared.snapshot,
            rule,
            page_bytes,
            generated_at: page.generated_at,
        })
    }
}
