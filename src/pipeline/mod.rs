use std::collections::{HashMap, HashSet};
use std::fs;
use std::ops::Range;
use std::path::Path;

use anyhow::{Context, Result, bail};
use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::cli::OperatingMode;
use crate::model::{
    AttemptTrace, ChapterPayload, CitationReport, ComplexityAssessment, ConfidenceBand,
    ConfidenceResult, CrossLink, ExplanationMetadata, GenerationAttempt, GroundingReport,
    MetaTalkReport, OracleRoute, ParseStrategy, PayloadTier, QualityReport, RecordStatus,
    RetryFlags, SentenceReport, TargetMode, TruncationReport, WordPolicy,
};
use crate::oracle::{GenerationClient, OracleError};

mod citation;
mod complexity;
mod confidence;
mod grounding;
mod orchestrator;
mod parse;
mod prompt;
mod quality;
mod tiering;
mod word_policy;
#[cfg(test)]
mod tests;

pub use grounding::{CapitalizedTermExtractor, TermExtractor};
pub use orchestrator::{ChapterOutcome, ExplanationPipeline, PipelineSettings};
pub use prompt::{PromptTemplate, SYSTEM_INSTRUCTION};

use citation::*;
use complexity::*;
use confidence::*;
use grounding::*;
use parse::*;
use prompt::*;
use quality::*;
use tiering::*;
use word_policy::*;

pub(crate) fn normalize_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<&str>>().join(" ")
}
