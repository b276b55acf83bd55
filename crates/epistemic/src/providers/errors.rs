use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Context length exceeded: {0}")]
    ContextLengthExceeded(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),
}

fn is_network_error(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_timeout() || (err.status().is_none() && err.is_request())
}

impl From<reqwest::Error> for ProviderError {
    fn from(error: reqwest::Error) -> Self {
        if is_network_error(&error) {
            let msg = if error.is_timeout() {
                "Request timed out".to_string()
            } else if error.is_connect() {
                match error.url().and_then(|u| u.host_str().map(str::to_string)) {
                    Some(host) => format!("Could not connect to {}", host),
                    None => "Could not connect to the provider".to_string(),
                }
            } else {
                "Network error".to_string()
            };
            return ProviderError::NetworkError(msg);
        }

        match error.status() {
            Some(status) => {
                ProviderError::RequestFailed(format!("{} (status: {})", error, status))
            }
            None => ProviderError::RequestFailed(error.to_string()),
        }
    }
}
