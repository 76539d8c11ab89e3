use std::collections::HashSet;
use std::time::Instant;

use anyhow::Result;
use tracing::{info, warn};

use crate::cli::GenerateArgs;
use crate::config::GenerateConfig;
use crate::model::{
    ChapterKey, ChapterRunSummary, ExplanationMetadata, ExplanationRecord, GenerationRunManifest,
    OracleRoute, RecordStatus, RetryFlags, RunCounts, RunFilters,
};
use crate::pipeline::{CapitalizedTermExtractor, ChapterOutcome, ExplanationPipeline, PromptTemplate};
use crate::store::{ChapterStore, ResultStore};
use crate::util::{RunStamp, now_utc_string, sha256_text, write_json_pretty};

mod batch;
mod run;

use batch::*;

pub(crate) use run::{COMMAND, run};
