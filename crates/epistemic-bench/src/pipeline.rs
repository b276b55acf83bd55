//! The shared inference loop: one request per dataset item, strictly
//! sequential and in input order, fail-and-continue per item.

use std::path::Path;

use anyhow::Result;
use epistemic::{Message, Provider};

use crate::io;
use crate::records::ResponseRecord;

/// A fully rendered prompt for one dataset item.
#[derive(Debug, Clone)]
pub struct PromptItem {
    pub index: usize,
    pub id: Option<String>,
    pub system: String,
    pub user: String,
}

/// Run every prompt through the provider, one at a time. A failed call
/// is logged and recorded with a null response; there is no retry. Each
/// record is appended to `log_path` as it completes, so an interrupted
/// run still leaves a usable trail.
pub async fn run_prompts(
    provider: &dyn Provider,
    prompts: &[PromptItem],
    log_path: &Path,
) -> Result<Vec<ResponseRecord>> {
    let provider_name = provider.name();
    let model_name = provider.model_config().model_name.clone();

    let mut records = Vec::with_capacity(prompts.len());
    for prompt in prompts {
        let mut messages = Vec::with_capacity(2);
        if !prompt.system.is_empty() {
            messages.push(Message::system(&prompt.system));
        }
        messages.push(Message::user(&prompt.user));

        let record = match provider.complete(&messages).await {
            Ok(completion) => {
                tracing::info!(
                    index = prompt.index,
                    id = prompt.id.as_deref().unwrap_or("-"),
                    "completed item {}/{}",
                    prompt.index + 1,
                    prompts.len()
                );
                ResponseRecord::success(
                    prompt.index,
                    prompt.id.clone(),
                    completion.text,
                    provider_name,
                    &model_name,
                )
            }
            Err(e) => {
                tracing::warn!(
                    index = prompt.index,
                    id = prompt.id.as_deref().unwrap_or("-"),
                    "request failed, recording null response: {}",
                    e
                );
                ResponseRecord::failure(
                    prompt.index,
                    prompt.id.clone(),
                    e.to_string(),
                    provider_name,
                    &model_name,
                )
            }
        };

        io::append_jsonl(log_path, &record)?;
        records.push(record);
    }

    Ok(records)
}
