use anyhow::Context;
use clap::Parser;
use primate_core::exchange;
use primate_core::generate::{GenerateOptions, Generator};
use primate_core::llm::{self, Provider};
use primate_core::prompt::{PromptSpec, DEFAULT_SNAPSHOT_BUDGET};
use primate_core::schedule::{RefreshMode, RefreshScheduler};
use primate_core::site::{publish, server, SiteConfig, SiteStatus, DEFAULT_PORT};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "primate_site")]
struct Args {
    /// Directory served over HTTP; the page and snapshot are written here.
    #[arg(long, env = "SITE_ROOT", default_value = "public")]
    root: PathBuf,

    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Completion provider: gemini, deepseek or anthropic.
    #[arg(long, env = "LLM_PROVIDER", default_value = "gemini")]
    provider: Provider,

    /// Brochure site only; skip the Kraken snapshot.
    #[arg(long)]
    no_exchange: bool,

    /// Add the clock-derived lightness level to the brief.
    #[arg(long)]
    theme: bool,

    /// Generate once at startup instead of every hour.
    #[arg(long)]
    once: bool,

    #[arg(long, env = "KRAKEN_HISTORY_LIMIT", default_value_t = exchange::kraken::DEFAULT_HISTORY_LIMIT)]
    history_limit: usize,

    /// Characters of snapshot JSON inlined into the prompt.
    #[arg(long, default_value_t = DEFAULT_SNAPSHOT_BUDGET)]
    snapshot_budget: usize,

    /// Log the published page line by line with this pause (ms).
    #[arg(long)]
    echo_delay_ms: Option<u64>,
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

    let mut site = SiteConfig::new(&args.root);
    site.port = args.port;
    site.echo_delay = args.echo_delay_ms.map(Duration::from_millis);

    let llm = llm::client_from_settings(args.provider, &settings)?;
    let generator = Arc::new(Generator {
        site: site.clone(),
        prompt: PromptSpec {
            snapshot_file: site.snapshot_file.clone(),
            snapshot_budget: args.snapshot_budget,
            ..Default::default()
        },
        exchange: exchange::source_from_settings(&settings, !args.no_exchange),
        llm,
        options: GenerateOptions {
            history_limit: args.history_limit,
            theme: args.theme,
        },
    });

    let initial = publish::publish_placeholder_if_missing(&site).await?;
    let (status_tx, status_rx) = watch::channel(SiteStatus::new(initial));
    let shutdown = CancellationToken::new();

    let listener = server::bind(&site).await?;
    let mut server_task = tokio::spawn({
        let site = site.clone();
        let shutdown = shutdown.clone();
        async move { server::serve(listener, &site, status_rx, shutdown).await }
    });

    let mode = if args.once {
        RefreshMode::Once
    } else {
        RefreshMode::Hourly
    };
    let scheduler_task = tokio::spawn(
        RefreshScheduler::new(generator, status_tx, shutdown.clone(), mode).run(),
    );

    tracing::info!(port = site.port, ?mode, "press Ctrl+C to stop");
    tokio::select! {
        _ = shutdown_signal() => tracing::info!("shutting down"),
        res = &mut server_task => {
            shutdown.cancel();
            scheduler_task.await.context("scheduler task panicked")?;
            return res.context("server task panicked")?;
        }
    }

    shutdown.cancel();
    scheduler_task.await.context("scheduler task panicked")?;
    server_task.await.context("server task panicked")??;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
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
