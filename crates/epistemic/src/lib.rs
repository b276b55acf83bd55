pub mod config;
pub mod extract;
pub mod message;
pub mod metrics;
pub mod model;
pub mod providers;

pub use config::{Config, ConfigError};
pub use message::{Message, Role};
pub use model::ModelConfig;
pub use providers::base::{Completion, Provider, Usage};
pub use providers::errors::ProviderError;
