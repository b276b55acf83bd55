use std::str::FromStr;

use once_cell::sync::OnceCell;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable '{0}' not found")]
    NotFound(String),
    #[error("Invalid value for '{0}': '{1}'")]
    InvalidValue(String, String),
}

/// Process-wide configuration backed by environment variables.
///
/// Credentials are read at process start (after a best-effort `.env`
/// load in the binary); a missing secret for a targeted provider is a
/// fatal error surfaced through `get_secret`.
pub struct Config;

static GLOBAL_CONFIG: OnceCell<Config> = OnceCell::new();

impl Config {
    pub fn global() -> &'static Config {
        GLOBAL_CONFIG.get_or_init(|| Config)
    }

    /// Fetch a required secret such as an API key. Empty values count as
    /// absent so a blank line in `.env` does not masquerade as a key.
    pub fn get_secret(&self, key: &str) -> Result<String, ConfigError> {
        match std::env::var(key) {
            Ok(val) if !val.trim().is_empty() => Ok(val),
            _ => Err(ConfigError::NotFound(key.to_string())),
        }
    }

    /// Fetch an optional parameter, parsed from its string form.
    pub fn get_param<T: FromStr>(&self, key: &str) -> Result<T, ConfigError> {
        let raw = std::env::var(key).map_err(|_| ConfigError::NotFound(key.to_string()))?;
        raw.parse::<T>()
            .map_err(|_| ConfigError::InvalidValue(key.to_string(), raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_secret_is_an_error() {
        let config = Config::global();
        let err = config.get_secret("EPISTEMIC_TEST_NO_SUCH_KEY").unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_blank_secret_counts_as_absent() {
        std::env::set_var("EPISTEMIC_TEST_BLANK_KEY", "  ");
        let config = Config::global();
        assert!(config.get_secret("EPISTEMIC_TEST_BLANK_KEY").is_err());
        std::env::remove_var("EPISTEMIC_TEST_BLANK_KEY");
    }

    #[test]
    fn test_get_param_parses() {
        std::env::set_var("EPISTEMIC_TEST_TIMEOUT", "45");
        let config = Config::global();
        let timeout: u64 = config.get_param("EPISTEMIC_TEST_TIMEOUT").unwrap();
        assert_eq!(timeout, 45);
        std::env::remove_var("EPISTEMIC_TEST_TIMEOUT");
    }
}
