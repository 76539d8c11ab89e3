use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use super::{CallOptions, GenerationOracle, OracleError, classify_reqwest_error, normalize_err_body};

/// OpenAI-compatible `/chat/completions` backend.
pub struct HostedChatOracle {
    client: Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl HostedChatOracle {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build hosted oracle http client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            timeout,
        })
    }
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

impl GenerationOracle for HostedChatOracle {
    fn backend(&self) -> &'static str {
        "hosted"
    }

    fn call(&self, prompt: &str, options: &CallOptions<'_>) -> Result<String, OracleError> {
        #[derive(Serialize)]
        struct ChatRequest<'a> {
            model: &'a str,
            messages: Vec<ChatMessage>,
            max_tokens: usize,
            temperature: f32,
            stream: bool,
        }

        #[derive(Deserialize)]
        struct ChatCompletionResponse {
            choices: Vec<Choice>,
        }

        #[derive(Deserialize)]
        struct Choice {
            message: ChatMessage,
        }

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&ChatRequest {
                model: options.model,
                messages: vec![
                    ChatMessage {
                        role: "system".to_string(),
                        content: options.instruction.to_string(),
                    },
                    ChatMessage {
                        role: "user".to_string(),
                        content: prompt.to_string(),
                    },
                ],
                max_tokens: options.max_tokens,
                temperature: options.temperature,
                stream: false,
            })
            .send()
            .map_err(|err| classify_reqwest_error(err, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(OracleError::Status {
                status: status.as_u16(),
                body: normalize_err_body(&body),
            });
        }

        let response = response
            .json::<ChatCompletionResponse>()
            .map_err(|err| classify_reqwest_error(err, self.timeout))?;

        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.trim().to_string())
            .ok_or(OracleError::Empty)
    }
}
