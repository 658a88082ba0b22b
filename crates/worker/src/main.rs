use anyhow::Context;
use clap::Parser;
use primate_core::exchange;
use primate_core::generate::{self, GenerateOptions, Generator};
use primate_core::llm::{self, Provider};
use primate_core::prompt::{PromptSpec, DEFAULT_SNAPSHOT_BUDGET};
use primate_core::site::SiteConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "primate_worker")]
struct Args {
    /// Directory the page and snapshot are written to.
    #[arg(long, env = "SITE_ROOT", default_value = "public")]
    root: PathBuf,

    /// Completion provider: gemini, deepseek or anthropic.
    #[arg(long, env = "LLM_PROVIDER", default_value = "gemini")]
    provider: Provider,

    /// Brochure site only; skip the Kraken snapshot.
    #[arg(long)]
    no_exchange: bool,

    /// Add the clock-derived lightness level to the brief.
    #[arg(long)]
    theme: bool,

    #[arg(long, env = "KRAKEN_HISTORY_LIMIT", default_value_t = exchange::kraken::DEFAULT_HISTORY_LIMIT)]
    history_limit: usize,

    #[arg(long, default_value_t = DEFAULT_SNAPSHOT_BUDGET)]
    snapshot_budget: usize,

    /// Refresh the snapshot and print the prompt; no completion call, no publish.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = primate_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    tokio::fs::create_dir_all(&args.root)
        .await
        .with_context(|| format!("create site root {} failed", args.root.display()))?;

    let site = SiteConfig::new(&args.root);
    let prompt = PromptSpec {
        snapshot_file: site.snapshot_file.clone(),
        snapshot_budget: args.snapshot_budget,
        ..Default::default()
    };
    let source = exchange::source_from_settings(&settings, !args.no_exchange);
    let options = GenerateOptions {
        history_limit: args.history_limit,
        theme: args.theme,
    };
    let now = chrono::Local::now();

    if args.dry_run {
        let prepared = generate::prepare_prompt(&site, &prompt, &source, &options, now).await?;
        tracing::info!(
            dry_run = true,
            snapshot = ?prepared.snapshot,
            lightness = ?prepared.lightness,
            prompt_chars = prepared.prompt.chars().count(),
            "prompt prepared"
        );
        println!("{}", prepared.prompt);
        return Ok(());
    }

    let generator = Generator {
        site,
        prompt,
        exchange: source,
        llm: llm::client_from_settings(args.provider, &settings)?,
        options,
    };

    match generator.run_once(now).await {
        Ok(report) => {
            tracing::info!(
                run_id = %report.run_id,
                bytes = report.page_bytes,
                rule = ?report.rule,
                snapshot = ?report.snapshot,
                "website generated"
            );
            Ok(())
        }
        Err(err) => {
            sentry_anyhow::capture_anyhow(&err);
            tracing::error!(error = %format!("{err:#}"), "website generation failed; previous page left in place");
            Err(err)
        }
    }
}

fn init_sentry(settings: &primate_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
