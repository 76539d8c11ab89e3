use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "versegloss",
    version,
    about = "Quality-gated chapter explanation generation"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Generate(GenerateArgs),
    Status(StatusArgs),
}

impl Commands {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Generate(_) => "generate",
            Self::Status(_) => "status",
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum OperatingMode {
    /// Chapters that stay below the word floor are recorded as errors.
    Standard,
    /// Short chapters are accepted and left to the confidence band.
    Relaxed,
}

impl OperatingMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Relaxed => "relaxed",
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum OracleBackend {
    /// Local Ollama-style `/api/generate` endpoint.
    Ollama,
    /// Hosted OpenAI-compatible `/chat/completions` endpoint.
    Hosted,
}

impl OracleBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::Hosted => "hosted",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    #[arg(long, default_value = ".cache/versegloss")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub corpus_db_path: Option<PathBuf>,

    #[arg(long)]
    pub results_db_path: Option<PathBuf>,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    #[arg(long)]
    pub corpus: Option<String>,

    #[arg(long)]
    pub unit: Option<String>,

    #[arg(long)]
    pub chapter: Option<u32>,

    #[arg(long)]
    pub limit: Option<usize>,

    #[arg(long, default_value_t = false)]
    pub force: bool,

    #[arg(long, value_enum, default_value_t = OperatingMode::Standard)]
    pub mode: OperatingMode,

    #[arg(long, value_enum, default_value_t = OracleBackend::Ollama)]
    pub primary_backend: OracleBackend,

    #[arg(long, value_enum)]
    pub secondary_backend: Option<OracleBackend>,

    #[arg(
        long,
        env = "VERSEGLOSS_PRIMARY_ENDPOINT",
        default_value = "http://127.0.0.1:11434"
    )]
    pub primary_endpoint: String,

    #[arg(long, env = "VERSEGLOSS_SECONDARY_ENDPOINT")]
    pub secondary_endpoint: Option<String>,

    #[arg(long, env = "VERSEGLOSS_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[arg(long, default_value = "qwen2.5:14b-instruct")]
    pub primary_model: String,

    #[arg(long, default_value = "qwen2.5:32b-instruct")]
    pub secondary_model: String,

    #[arg(long, default_value_t = 0.3)]
    pub temperature: f32,

    #[arg(long, default_value_t = 120)]
    pub timeout_secs: u64,

    #[arg(long)]
    pub target_words: Option<usize>,

    #[arg(long, default_value_t = 9)]
    pub escalate_score: u32,

    #[arg(long)]
    pub prompt_template_path: Option<PathBuf>,

    #[arg(long, default_value = "v1")]
    pub prompt_version: String,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = ".cache/versegloss")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub results_db_path: Option<PathBuf>,

    #[arg(long)]
    pub prompt_version: Option<String>,
}
