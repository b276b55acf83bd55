use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::Value;

use super::base::{Completion, ConfigKey, Provider, ProviderMetadata};
use super::errors::ProviderError;
use super::formats::openai::{
    create_request, get_model, get_usage, handle_response_openai_compat, response_to_text,
};
use crate::config::Config;
use crate::message::Message;
use crate::model::ModelConfig;

pub const GROQ_DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";
pub const GROQ_KNOWN_MODELS: &[&str] = &["llama-3.3-70b-versatile", "qwen/qwen3-32b"];

pub const GROQ_DOC_URL: &str = "https://console.groq.com/docs/models";

#[derive(Debug)]
pub struct GroqProvider {
    client: Client,
    host: String,
    api_key: String,
    model: ModelConfig,
}

impl GroqProvider {
    pub fn from_env(model: ModelConfig) -> anyhow::Result<Self> {
        let config = Config::global();
        let api_key: String = config.get_secret("GROQ_API_KEY")?;
        let host: String = config
            .get_param("GROQ_HOST")
            .unwrap_or_else(|_| "https://api.groq.com".to_string());
        let timeout_secs: u64 = config.get_param("GROQ_TIMEOUT").unwrap_or(60);

        Self::new(host, api_key, model, timeout_secs)
    }

    pub fn new(
        host: String,
        api_key: String,
        model: ModelConfig,
        timeout_secs: u64,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            client,
            host,
            api_key,
            model,
        })
    }

    async fn post(&self, payload: &Value) -> Result<Response, ProviderError> {
        let url = format!("{}/openai/v1/chat/completions", self.host);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(payload)
            .send()
            .await?;

        Ok(response)
    }
}

#[async_trait]
impl Provider for GroqProvider {
    fn metadata() -> ProviderMetadata {
        ProviderMetadata::new(
            "groq",
            "Groq",
            "Groq-hosted open-weight models",
            GROQ_DEFAULT_MODEL,
            GROQ_KNOWN_MODELS.to_vec(),
            GROQ_DOC_URL,
            vec![
                ConfigKey::new("GROQ_API_KEY", true, true, None),
                ConfigKey::new("GROQ_HOST", false, false, Some("https://api.groq.com")),
                ConfigKey::new("GROQ_TIMEOUT", false, false, Some("60")),
            ],
        )
    }

    fn name(&self) -> &'static str {
        "groq"
    }

    fn model_config(&self) -> &ModelConfig {
        &self.model
    }

    async fn complete(&self, messages: &[Message]) -> Result<Completion, ProviderError> {
        let payload = create_request(&self.model, messages);
        let response = self.post(&payload).await?;
        let response_data = handle_response_openai_compat(response).await?;

        Ok(Completion {
            text: response_to_text(&response_data)?,
            model: get_model(&response_data),
            usage: get_usage(&response_data),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_groq_metadata() {
        let metadata = GroqProvider::metadata();
        assert_eq!(metadata.name, "groq");
        assert_eq!(metadata.default_model, "llama-3.3-70b-versatile");
        let api_key = metadata
            .config_keys
            .iter()
            .find(|k| k.name == "GROQ_API_KEY")
            .unwrap();
        assert!(api_key.required);
        assert!(api_key.secret);
    }

    #[tokio::test]
    async fn test_complete_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/openai/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "llama-3.3-70b-versatile",
                "choices": [{"message": {"role": "assistant", "content": "Paris."}}],
                "usage": {"prompt_tokens": 10, "completion_tokens": 2, "total_tokens": 12}
            })))
            .mount(&server)
            .await;

        let provider = GroqProvider::new(
            server.uri(),
            "test-key".to_string(),
            ModelConfig::new(GROQ_DEFAULT_MODEL),
            5,
        )
        .unwrap();

        let completion = provider
            .complete(&[
                Message::system("Answer truthfully."),
                Message::user("Capital of France?"),
            ])
            .await
            .unwrap();

        assert_eq!(completion.text, "Paris.");
        assert_eq!(completion.usage.total_tokens, Some(12));
    }

    #[tokio::test]
    async fn test_rate_limit_maps_to_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/openai/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let provider = GroqProvider::new(
            server.uri(),
            "test-key".to_string(),
            ModelConfig::new(GROQ_DEFAULT_MODEL),
            5,
        )
        .unwrap();

        let err = provider
            .complete(&[Message::user("Capital of France?")])
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::RateLimitExceeded(_)));
    }
}
