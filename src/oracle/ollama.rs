use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use super::{CallOptions, GenerationOracle, OracleError, classify_reqwest_error, normalize_err_body};

pub struct OllamaOracle {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl OllamaOracle {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build ollama http client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }
}

impl GenerationOracle for OllamaOracle {
    fn backend(&self) -> &'static str {
        "ollama"
    }

    fn call(&self, prompt: &str, options: &CallOptions<'_>) -> Result<String, OracleError> {
        #[derive(Serialize)]
        struct GenerateReq<'a> {
            model: &'a str,
            system: &'a str,
            prompt: &'a str,
            stream: bool,
            options: GenerateOptions,
        }

        #[derive(Serialize)]
        struct GenerateOptions {
            num_predict: usize,
            temperature: f32,
        }

        #[derive(Deserialize)]
        struct GenerateResp {
            response: String,
        }

        let url = format!("{}/api/generate", self.base_url);
        let response = self
            .client
            .post(url)
            .json(&GenerateReq {
                model: options.model,
                system: options.instruction,
                prompt,
                stream: false,
                options: GenerateOptions {
                    num_predict: options.max_tokens,
                    temperature: options.temperature,
                },
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
            .json::<GenerateResp>()
            .map_err(|err| classify_reqwest_error(err, self.timeout))?;

        Ok(response.response.trim().to_string())
    }
}
