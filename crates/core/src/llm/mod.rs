pub mod anthropic;
pub mod chat;
pub mod error;
pub mod gemini;
pub mod html;

use crate::config::Settings;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Gemini,
    ChatCompletions,
    Anthropic,
}

impl std::str::FromStr for Provider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" => Ok(Self::Gemini),
            "chat" | "deepseek" | "chat_completions" => Ok(Self::ChatCompletions),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            other => anyhow::bail!("unknown completion provider: {other}"),
        }
    }
}

/// Single-turn text completion. One request per call; no retry, no streaming.
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    fn provider(&self) -> Provider;

    async fn complete(&self, prompt: &str) -> anyhow::Result<String>;
}

pub fn client_from_settings(
    provider: Provider,
    settings: &Settings,
) -> anyhow::Result<Arc<dyn LlmClient>> {
    Ok(match provider {
        Provider::Gemini => Arc::new(gemini::GeminiClient::from_settings(settings)?),
        Provider::ChatCompletions => Arc::new(chat::ChatCompletionsClient::from_settings(settings)?),
        Provider::Anthropic => Arc::new(anthropic::AnthropicClient::from_settings(settings)?),
    })
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_provider_aliases() {
        assert_eq!("gemini".parse::<Provider>().unwrap(), Provider::Gemini);
        assert_eq!("DeepSeek".parse::<Provider>().unwrap(), Provider::ChatCompletions);
        assert_eq!("claude".parse::<Provider>().unwrap(), Provider::Anthropic);
        assert!("bard".parse::<Provider>().is_err());
    }

    #[test]
    fn missing_key_fails_client_construction() {
        let settings = Settings::default();
        let err = client_from_settings(Provider::Gemini, &settings).err().unwrap();
        assert_eq!(err.to_string(), "GOOGLE_API_KEY is required");
    }
}
