use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::errors::ProviderError;
use crate::message::Message;
use crate::model::ModelConfig;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Usage {
    pub input_tokens: Option<i32>,
    pub output_tokens: Option<i32>,
    pub total_tokens: Option<i32>,
}

impl Usage {
    pub fn new(
        input_tokens: Option<i32>,
        output_tokens: Option<i32>,
        total_tokens: Option<i32>,
    ) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens,
        }
    }
}

/// The result of one chat-completion call: the raw generated text plus
/// the model name the provider reported and its token accounting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Completion {
    pub text: String,
    pub model: String,
    pub usage: Usage,
}

#[derive(Debug, Clone)]
pub struct ConfigKey {
    pub name: &'static str,
    pub required: bool,
    pub secret: bool,
    pub default: Option<&'static str>,
}

impl ConfigKey {
    pub fn new(
        name: &'static str,
        required: bool,
        secret: bool,
        default: Option<&'static str>,
    ) -> Self {
        Self {
            name,
            required,
            secret,
            default,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProviderMetadata {
    pub name: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    pub default_model: &'static str,
    pub known_models: Vec<&'static str>,
    pub doc_url: &'static str,
    pub config_keys: Vec<ConfigKey>,
}

impl ProviderMetadata {
    pub fn new(
        name: &'static str,
        display_name: &'static str,
        description: &'static str,
        default_model: &'static str,
        known_models: Vec<&'static str>,
        doc_url: &'static str,
        config_keys: Vec<ConfigKey>,
    ) -> Self {
        Self {
            name,
            display_name,
            description,
            default_model,
            known_models,
            doc_url,
            config_keys,
        }
    }
}

#[async_trait]
pub trait Provider: Send + Sync {
    fn metadata() -> ProviderMetadata
    where
        Self: Sized;

    fn name(&self) -> &'static str;

    fn model_config(&self) -> &ModelConfig;

    /// Issue one chat completion. Callers await each item before the
    /// next, so there is never more than one request in flight.
    async fn complete(&self, messages: &[Message]) -> Result<Completion, ProviderError>;
}
