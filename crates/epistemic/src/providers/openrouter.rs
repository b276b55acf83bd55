use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::Value;
use url::Url;

use super::base::{Completion, ConfigKey, Provider, ProviderMetadata};
use super::errors::ProviderError;
use super::formats::openai::{
    create_request, get_model, get_usage, handle_response_openai_compat, response_to_text,
};
use crate::config::Config;
use crate::message::Message;
use crate::model::ModelConfig;

pub const OPENROUTER_DEFAULT_MODEL: &str = "mistralai/mistral-large-2407";

// OpenRouter can route many models, we suggest the default
pub const OPENROUTER_KNOWN_MODELS: &[&str] = &[OPENROUTER_DEFAULT_MODEL];
pub const OPENROUTER_DOC_URL: &str = "https://openrouter.ai/models";

#[derive(Debug)]
pub struct OpenRouterProvider {
    client: Client,
    host: String,
    api_key: String,
    model: ModelConfig,
}

impl OpenRouterProvider {
    pub fn from_env(model: ModelConfig) -> anyhow::Result<Self> {
        let config = Config::global();
        let api_key: String = config.get_secret("OPENROUTER_API_KEY")?;
        let host: String = config
            .get_param("OPENROUTER_HOST")
            .unwrap_or_else(|_| "https://openrouter.ai".to_string());
        let timeout_secs: u64 = config.get_param("OPENROUTER_TIMEOUT").unwrap_or(60);

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
        let base_url = Url::parse(&self.host)
            .map_err(|e| ProviderError::RequestFailed(format!("Invalid base URL: {e}")))?;
        let url = base_url.join("api/v1/chat/completions").map_err(|e| {
            ProviderError::RequestFailed(format!("Failed to construct endpoint URL: {e}"))
        })?;

        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(payload)
            .send()
            .await?;

        Ok(response)
    }
}

#[async_trait]
impl Provider for OpenRouterProvider {
    fn metadata() -> ProviderMetadata {
        ProviderMetadata::new(
            "openrouter",
            "OpenRouter",
            "Router for many model providers",
            OPENROUTER_DEFAULT_MODEL,
            OPENROUTER_KNOWN_MODELS.to_vec(),
            OPENROUTER_DOC_URL,
            vec![
                ConfigKey::new("OPENROUTER_API_KEY", true, true, None),
                ConfigKey::new(
                    "OPENROUTER_HOST",
                    false,
                    false,
                    Some("https://openrouter.ai"),
                ),
                ConfigKey::new("OPENROUTER_TIMEOUT", false, false, Some("60")),
            ],
        )
    }

    fn name(&self) -> &'static str {
        "openrouter"
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
