use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use reqwest::Url;

use crate::cli::{GenerateArgs, OracleBackend};
use crate::model::{OracleRouteManifest, RunFilters};
use crate::oracle::{
    GenerationClient, GenerationOracle, HostedChatOracle, OllamaOracle, OracleEndpoint,
};
use crate::pipeline::{PipelineSettings, SYSTEM_INSTRUCTION};

const MAX_TEMPERATURE: f32 = 2.0;

#[derive(Debug, Clone)]
pub struct OracleRouteConfig {
    pub backend: OracleBackend,
    pub endpoint: Url,
    pub model: String,
}

impl OracleRouteConfig {
    pub fn manifest(&self) -> OracleRouteManifest {
        OracleRouteManifest {
            backend: self.backend.as_str().to_string(),
            endpoint: self.endpoint.to_string(),
            model: self.model.clone(),
        }
    }
}

#[derive(Clone)]
struct ApiKey(String);

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

/// Generation settings resolved from the command line and environment.
#[derive(Debug, Clone)]
pub struct GenerateConfig {
    pub cache_root: PathBuf,
    pub corpus_db_path: PathBuf,
    pub results_db_path: PathBuf,
    pub manifest_dir: PathBuf,
    pub manifest_path: Option<PathBuf>,
    pub filters: RunFilters,
    pub primary: OracleRouteConfig,
    pub secondary: OracleRouteConfig,
    api_key: Option<ApiKey>,
    pub timeout: Duration,
    pub prompt_template_path: Option<PathBuf>,
    pub settings: PipelineSettings,
}

impl GenerateConfig {
    pub fn from_args(args: &GenerateArgs) -> Result<Self> {
        let cache_root = args.cache_root.clone();
        let corpus_db_path = args
            .corpus_db_path
            .clone()
            .unwrap_or_else(|| cache_root.join("corpus.sqlite"));
        let results_db_path = args
            .results_db_path
            .clone()
            .unwrap_or_else(|| cache_root.join("explanations.sqlite"));

        if !corpus_db_path.is_file() {
            bail!("chapter database not found: {}", corpus_db_path.display());
        }
        if let Some(path) = &args.prompt_template_path
            && !path.is_file()
        {
            bail!("prompt template not found: {}", path.display());
        }

        let primary = OracleRouteConfig {
            backend: args.primary_backend,
            endpoint: parse_endpoint(&args.primary_endpoint, "primary")?,
            model: non_empty(&args.primary_model, "--primary-model")?,
        };
        let secondary = OracleRouteConfig {
            backend: args.secondary_backend.unwrap_or(args.primary_backend),
            endpoint: parse_endpoint(
                args.secondary_endpoint
                    .as_deref()
                    .unwrap_or(&args.primary_endpoint),
                "secondary",
            )?,
            model: non_empty(&args.secondary_model, "--secondary-model")?,
        };

        let api_key = args
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(|key| ApiKey(key.to_string()));
        let needs_key = [primary.backend, secondary.backend].contains(&OracleBackend::Hosted);
        if needs_key && api_key.is_none() {
            bail!("the hosted backend needs --api-key or VERSEGLOSS_API_KEY");
        }

        if !(0.0..=MAX_TEMPERATURE).contains(&args.temperature) {
            bail!(
                "--temperature must be between 0 and {MAX_TEMPERATURE}, got {}",
                args.temperature
            );
        }
        if args.timeout_secs == 0 {
            bail!("--timeout-secs must be positive");
        }
        if args.target_words == Some(0) {
            bail!("--target-words must be positive");
        }
        if args.limit == Some(0) {
            bail!("--limit must be positive");
        }

        Ok(Self {
            manifest_dir: cache_root.join("manifests"),
            cache_root,
            corpus_db_path,
            results_db_path,
            manifest_path: args.manifest_path.clone(),
            filters: RunFilters {
                corpus: args.corpus.clone(),
                unit: args.unit.clone(),
                chapter: args.chapter,
                limit: args.limit,
                force: args.force,
            },
            primary,
            secondary,
            api_key,
            timeout: Duration::from_secs(args.timeout_secs),
            prompt_template_path: args.prompt_template_path.clone(),
            settings: PipelineSettings {
                mode: args.mode,
                base_temperature: args.temperature,
                target_words_override: args.target_words,
                escalate_score: args.escalate_score,
                prompt_version: args.prompt_version.clone(),
            },
        })
    }

    pub fn build_client(&self) -> Result<GenerationClient> {
        let primary = OracleEndpoint {
            oracle: self.build_oracle(&self.primary)?,
            model: self.primary.model.clone(),
        };
        let secondary = OracleEndpoint {
            oracle: self.build_oracle(&self.secondary)?,
            model: self.secondary.model.clone(),
        };
        Ok(GenerationClient::new(primary, secondary, SYSTEM_INSTRUCTION))
    }

    fn build_oracle(&self, route: &OracleRouteConfig) -> Result<Box<dyn GenerationOracle>> {
        let base_url = route.endpoint.as_str().trim_end_matches('/').to_string();
        Ok(match route.backend {
            OracleBackend::Ollama => Box::new(OllamaOracle::new(base_url, self.timeout)?),
            OracleBackend::Hosted => {
                let api_key = self
                    .api_key
                    .as_ref()
                    .context("hosted backend configured without an api key")?;
                Box::new(HostedChatOracle::new(base_url, api_key.0.clone(), self.timeout)?)
            }
        })
    }
}

fn parse_endpoint(raw: &str, route: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .with_context(|| format!("invalid {route} oracle endpoint: {raw}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("{route} oracle endpoint must be http or https: {raw}");
    }
    Ok(url)
}

fn non_empty(value: &str, flag: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        bail!("{flag} must not be empty");
    }
    Ok(trimmed.to_string())
}
