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

pub const DEEPSEEK_DEFAULT_MODEL: &str = "deepseek-chat";
pub const DEEPSEEK_KNOWN_MODELS: &[&str] = &["deepseek-chat", "deepseek-reasoner"];

pub const DEEPSEEK_DOC_URL: &str = "https://api-docs.deepseek.com/";

#[derive(Debug)]
pub struct DeepSeekProvider {
    client: Client,
    host: String,
    base_path: String,
    api_key: String,
    model: ModelConfig,
}

impl DeepSeekProvider {
    pub fn from_env(model: ModelConfig) -> anyhow::Result<Self> {
        let config = Config::global();
        let api_key: String = config.get_secret("DEEPSEEK_API_KEY")?;
        let host: String = config
            .get_param("DEEPSEEK_HOST")
            .unwrap_or_else(|_| "https://api.deepseek.com".to_string());
        let base_path: String = config
            .get_param("DEEPSEEK_BASE_PATH")
            .unwrap_or_else(|_| "v1/chat/completions".to_string());
        let timeout_secs: u64 = config.get_param("DEEPSEEK_TIMEOUT").unwrap_or(60);

        Self::new(host, base_path, api_key, model, timeout_secs)
    }

    pub fn new(
        host: String,
        base_path: String,
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
            base_path,
            api_key,
            model,
        })
    }

    async fn post(&self, payload: &Value) -> Result<Response, ProviderError> {
        let url = format!("{}/{}", self.host, self.base_path);
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
impl Provider for DeepSeekProvider {
    fn metadata() -> ProviderMetadata {
        ProviderMetadata::new(
            "deepseek",
            "DeepSeek",
            "DeepSeek AI models including DeepSeek-V3 and DeepSeek-R1",
            DEEPSEEK_DEFAULT_MODEL,
            DEEPSEEK_KNOWN_MODELS.to_vec(),
            DEEPSEEK_DOC_URL,
            vec![
                ConfigKey::new("DEEPSEEK_API_KEY", true, true, None),
                ConfigKey::new(
                    "DEEPSEEK_HOST",
                    false,
                    false,
                    Some("https://api.deepseek.com"),
                ),
                ConfigKey::new(
                    "DEEPSEEK_BASE_PATH",
                    false,
                    false,
                    Some("v1/chat/completions"),
                ),
                ConfigKey::new("DEEPSEEK_TIMEOUT", false, false, Some("60")),
            ],
        )
    }

    fn name(&self) -> &'static str {
        "deepseek"
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
