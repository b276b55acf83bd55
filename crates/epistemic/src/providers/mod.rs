pub mod base;
pub mod deepseek;
pub mod errors;
pub mod formats;
pub mod groq;
pub mod openrouter;

use anyhow::Result;

use crate::model::ModelConfig;
use base::{Provider, ProviderMetadata};
use deepseek::DeepSeekProvider;
use groq::GroqProvider;
use openrouter::OpenRouterProvider;

pub fn providers() -> Vec<ProviderMetadata> {
    vec![
        DeepSeekProvider::metadata(),
        GroqProvider::metadata(),
        OpenRouterProvider::metadata(),
    ]
}

pub fn create(name: &str, model: ModelConfig) -> Result<Box<dyn Provider + Send + Sync>> {
    match name {
        "deepseek" => Ok(Box::new(DeepSeekProvider::from_env(model)?)),
        "groq" => Ok(Box::new(GroqProvider::from_env(model)?)),
        "openrouter" => Ok(Box::new(OpenRouterProvider::from_env(model)?)),
        _ => Err(anyhow::anyhow!("Unknown provider: {}", name)),
    }
}
