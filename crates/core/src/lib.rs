pub mod domain;
pub mod exchange;
pub mod generate;
pub mod llm;
pub mod prompt;
pub mod schedule;
pub mod site;
pub mod storage;
pub mod time;

pub mod config {
    use anyhow::Context;

    #[derive(Debug, Clone, Default)]
    pub struct Settings {
        pub kraken_api_key: Option<String>,
        pub kraken_secret_key: Option<String>,
        pub google_api_key: Option<String>,
        pub deepseek_api_key: Option<String>,
        pub anthropic_api_key: Option<String>,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                kraken_api_key: non_empty_var("KRAKEN_API_KEY"),
                kraken_secret_key: non_empty_var("KRAKEN_SECRET_KEY"),
                google_api_key: non_empty_var("GOOGLE_API_KEY"),
                // One provider's key is conventionally exported in lower case.
                deepseek_api_key: non_empty_var("DEEPSEEK_API_KEY")
                    .or_else(|| non_empty_var("deepseek_api_key")),
                anthropic_api_key: non_empty_var("ANTHROPIC_API_KEY"),
                sentry_dsn: non_empty_var("SENTRY_DSN"),
            })
        }

        pub fn require_kraken_credentials(&self) -> anyhow::Result<(&str, &str)> {
            let key = self
                .kraken_api_key
                .as_deref()
                .context("KRAKEN_API_KEY is required")?;
            let secret = self
                .kraken_secret_key
                .as_deref()
                .context("KRAKEN_SECRET_KEY is required")?;
            Ok((key, secret))
        }

        pub fn require_google_api_key(&self) -> anyhow::Result<&str> {
            self.google_api_key
                .as_deref()
                .context("GOOGLE_API_KEY is required")
        }

        pub fn require_deepseek_api_key(&self) -> anyhow::Result<&str> {
            self.deepseek_api_key
                .as_deref()
                .context("DEEPSEEK_API_KEY is required")
        }

        pub fn require_anthropic_api_key(&self) -> anyhow::Result<&str> {
            self.anthropic_api_key
                .as_deref()
                .context("ANTHROPIC_API_KEY is required")
        }
    }

    fn non_empty_var(name: &str) -> Option<String> {
        std::env::var(name)
            .ok()
            .filter(|v| !v.trim().is_empty())
    }

}

#[cfg(test)]
pub(crate) mod stub {
    use axum::Router;

    /// Serve `app` on an ephemeral loopback port and return its base URL.
    pub async fn spawn(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{addr}")
    }
}
