use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::debug;

use crate::model::OracleRoute;

mod hosted;
mod ollama;
#[cfg(test)]
pub(crate) mod testing;

pub use hosted::HostedChatOracle;
pub use ollama::OllamaOracle;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle call timed out after {0:?}")]
    Timeout(Duration),
    #[error("oracle unreachable: {0}")]
    Transport(String),
    #[error("oracle returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode oracle response: {0}")]
    Decode(String),
    #[error("oracle returned an empty response")]
    Empty,
}

#[derive(Debug, Clone, Copy)]
pub struct CallOptions<'a> {
    pub model: &'a str,
    pub instruction: &'a str,
    pub temperature: f32,
    pub max_tokens: usize,
}

/// One text-generation backend. Implementations perform a single blocking
/// request and never retry on their own.
pub trait GenerationOracle {
    fn backend(&self) -> &'static str;

    fn call(&self, prompt: &str, options: &CallOptions<'_>) -> Result<String, OracleError>;
}

pub struct OracleEndpoint {
    pub oracle: Box<dyn GenerationOracle>,
    pub model: String,
}

/// Routes calls to the primary or secondary oracle with a shared system
/// instruction.
pub struct GenerationClient {
    primary: OracleEndpoint,
    secondary: OracleEndpoint,
    instruction: String,
}

impl GenerationClient {
    pub fn new(
        primary: OracleEndpoint,
        secondary: OracleEndpoint,
        instruction: impl Into<String>,
    ) -> Self {
        Self {
            primary,
            secondary,
            instruction: instruction.into(),
        }
    }

    pub fn model(&self, route: OracleRoute) -> &str {
        &self.endpoint(route).model
    }

    pub fn generate(
        &self,
        route: OracleRoute,
        prompt: &str,
        temperature: f32,
        max_tokens: usize,
    ) -> Result<String, OracleError> {
        let endpoint = self.endpoint(route);
        let options = CallOptions {
            model: &endpoint.model,
            instruction: &self.instruction,
            temperature,
            max_tokens,
        };

        let started = Instant::now();
        let result = endpoint.oracle.call(prompt, &options);
        debug!(
            route = route.as_str(),
            backend = endpoint.oracle.backend(),
            model = %endpoint.model,
            temperature,
            max_tokens,
            elapsed_ms = started.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "oracle call finished"
        );

        let text = result?;
        if text.trim().is_empty() {
            return Err(OracleError::Empty);
        }
        Ok(text)
    }

    fn endpoint(&self, route: OracleRoute) -> &OracleEndpoint {
        match route {
            OracleRoute::Primary => &self.primary,
            OracleRoute::Secondary => &self.secondary,
        }
    }
}

pub(crate) fn classify_reqwest_error(err: reqwest::Error, timeout: Duration) -> OracleError {
    if err.is_timeout() {
        OracleError::Timeout(timeout)
    } else if err.is_decode() {
        OracleError::Decode(err.to_string())
    } else {
        OracleError::Transport(err.to_string())
    }
}

pub(crate) fn normalize_err_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty body>".to_string();
    }

    if let Ok(json) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Some(err) = json.get("error").and_then(|v| v.as_str()) {
            return err.to_string();
        }
        if let Some(err) = json
            .get("error")
            .and_then(|v| v.get("message"))
            .and_then(|v| v.as_str())
        {
            return err.to_string();
        }
    }

    trimmed.to_string()
}
