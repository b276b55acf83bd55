//! Request/response plumbing for OpenAI-compatible chat completion
//! endpoints. Groq, OpenRouter and DeepSeek all speak this format.

use reqwest::{Response, StatusCode};
use serde_json::{json, Value};

use crate::message::Message;
use crate::model::ModelConfig;
use crate::providers::base::Usage;
use crate::providers::errors::ProviderError;

pub fn create_request(model_config: &ModelConfig, messages: &[Message]) -> Value {
    let messages_spec: Vec<Value> = messages
        .iter()
        .map(|m| serde_json::to_value(m).expect("message serialization is infallible"))
        .collect();

    let mut payload = json!({
        "model": model_config.model_name,
        "messages": messages_spec,
    });

    let obj = payload.as_object_mut().expect("payload is an object");
    if let Some(temperature) = model_config.temperature {
        obj.insert("temperature".to_string(), json!(temperature));
    }
    if let Some(max_tokens) = model_config.max_tokens {
        obj.insert("max_tokens".to_string(), json!(max_tokens));
    }

    payload
}

pub async fn handle_response_openai_compat(response: Response) -> Result<Value, ProviderError> {
    let status = response.status();
    let payload: Option<Value> = response.json().await.ok();

    match status {
        StatusCode::OK => payload.ok_or_else(|| {
            ProviderError::RequestFailed("Response body is not valid JSON".to_string())
        }),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Err(ProviderError::Authentication(format!(
                "Authentication failed. Please ensure your API key is valid. Status: {}. Response: {:?}",
                status, payload
            )))
        }
        StatusCode::BAD_REQUEST => {
            let mut message = "Unknown error".to_string();
            if let Some(payload) = &payload {
                if let Some(error) = payload.get("error") {
                    message = error
                        .get("message")
                        .and_then(|m| m.as_str())
                        .unwrap_or("Unknown error")
                        .to_string();

                    if let Some(code) = error.get("code").and_then(|c| c.as_str()) {
                        if code == "context_length_exceeded" || code == "string_above_max_length" {
                            return Err(ProviderError::ContextLengthExceeded(message));
                        }
                    }
                }
            }
            Err(ProviderError::RequestFailed(format!(
                "Request failed with status: {}. Message: {}",
                status, message
            )))
        }
        StatusCode::TOO_MANY_REQUESTS => {
            Err(ProviderError::RateLimitExceeded(format!("{:?}", payload)))
        }
        StatusCode::INTERNAL_SERVER_ERROR | StatusCode::SERVICE_UNAVAILABLE => {
            Err(ProviderError::ServerError(format!("{:?}", payload)))
        }
        _ => {
            tracing::debug!(
                "Provider request failed with status: {}. Payload: {:?}",
                status,
                payload
            );
            Err(ProviderError::RequestFailed(format!(
                "Request failed with status: {}",
                status
            )))
        }
    }
}

/// Pull the generated text out of a chat-completion body. An empty
/// completion is treated as a failure so downstream records never carry
/// an empty-but-present response.
pub fn response_to_text(response: &Value) -> Result<String, ProviderError> {
    let content = response
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(|content| content.as_str())
        .ok_or_else(|| {
            ProviderError::RequestFailed("Response did not contain a completion".to_string())
        })?;

    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(ProviderError::RequestFailed(
            "Provider returned an empty completion".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

pub fn get_model(response: &Value) -> String {
    response
        .get("model")
        .and_then(|m| m.as_str())
        .unwrap_or("unknown")
        .to_string()
}

pub fn get_usage(response: &Value) -> Usage {
    let usage = match response.get("usage") {
        Some(usage) => usage,
        None => return Usage::default(),
    };

    let read = |key: &str| usage.get(key).and_then(|v| v.as_i64()).map(|v| v as i32);
    Usage::new(
        read("prompt_tokens"),
        read("completion_tokens"),
        read("total_tokens"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_response() -> Value {
        json!({
            "model": "llama-3.3-70b-versatile",
            "choices": [{
                "message": {"role": "assistant", "content": "The capital of France is Paris."}
            }],
            "usage": {"prompt_tokens": 21, "completion_tokens": 8, "total_tokens": 29}
        })
    }

    #[test]
    fn test_create_request_shape() {
        let model = ModelConfig::new("deepseek-chat").with_max_tokens(700);
        let payload = create_request(
            &model,
            &[
                Message::system("Answer truthfully."),
                Message::user("Capital of France?"),
            ],
        );

        assert_eq!(payload["model"], "deepseek-chat");
        assert_eq!(payload["temperature"], 0.0);
        assert_eq!(payload["max_tokens"], 700);
        assert_eq!(payload["messages"][0]["role"], "system");
        assert_eq!(payload["messages"][1]["content"], "Capital of France?");
    }

    #[test]
    fn test_response_to_text() {
        let text = response_to_text(&sample_response()).unwrap();
        assert_eq!(text, "The capital of France is Paris.");
    }

    #[test]
    fn test_empty_completion_is_an_error() {
        let response = json!({"choices": [{"message": {"content": "   "}}]});
        assert!(response_to_text(&response).is_err());
    }

    #[test]
    fn test_get_usage() {
        let usage = get_usage(&sample_response());
        assert_eq!(usage.input_tokens, Some(21));
        assert_eq!(usage.total_tokens, Some(29));
    }

    #[test]
    fn test_get_usage_missing_block() {
        let usage = get_usage(&json!({"choices": []}));
        assert_eq!(usage, Usage::default());
    }
}
