use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChapterKey {
    pub corpus: String,
    pub unit: String,
    pub chapter: u32,
}

impl fmt::Display for ChapterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.corpus, self.unit, self.chapter)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verse {
    pub number: u32,
    pub reference: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    pub entity_type: String,
    pub aliases: Vec<String>,
    pub mention_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossLink {
    pub target_reference: String,
    pub relation: String,
}

/// Everything the pipeline knows about one chapter. Entities are ordered by
/// mention count, most frequent first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterPayload {
    pub key: ChapterKey,
    pub verses: Vec<Verse>,
    pub entities: Vec<Entity>,
    pub cross_links: Vec<CrossLink>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplexityAssessment {
    pub score: u32,
    pub verse_count: usize,
    pub total_chars: usize,
    pub entity_count: usize,
    pub entity_density: f64,
    pub avg_verse_chars: f64,
    pub list_heavy_ratio: f64,
    pub list_heavy_semantic: bool,
    pub list_heavy: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadTier {
    Full,
    NoAliases,
    Compact,
}

impl PayloadTier {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::NoAliases => "no_aliases",
            Self::Compact => "compact",
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetMode {
    Dynamic,
    Override,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordPolicy {
    pub chapter_words: usize,
    pub chapter_words_estimated: bool,
    pub target_words: usize,
    pub prompt_target_words: usize,
    pub min_words: usize,
    pub max_words: usize,
    pub list_heavy: bool,
    pub target_mode: TargetMode,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OracleRoute {
    Primary,
    Secondary,
}

impl OracleRoute {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseStrategy {
    StrictJson,
    BraceSpan,
    FieldRegex,
    PlainProse,
}

impl ParseStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StrictJson => "strict_json",
            Self::BraceSpan => "brace_span",
            Self::FieldRegex => "field_regex",
            Self::PlainProse => "plain_prose",
        }
    }

    /// Strict strategies found a well-formed object; the rest are coercions.
    pub fn is_strict(self) -> bool {
        matches!(self, Self::StrictJson | Self::BraceSpan)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationAttempt {
    pub purpose: String,
    pub route: OracleRoute,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: usize,
    pub raw_output: String,
    pub explanation: String,
    pub strategy: ParseStrategy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptTrace {
    pub purpose: String,
    pub route: OracleRoute,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: usize,
    pub outcome: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetaTalkReport {
    pub passed: bool,
    pub hit_count: usize,
    pub terms: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TruncationReport {
    pub passed: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SentenceReport {
    pub passed: bool,
    pub sentence_count: usize,
    pub min_sentences: usize,
    pub max_sentences: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CitationReport {
    pub passed: bool,
    pub block_count: usize,
    pub block_positions: Vec<usize>,
    pub trailing_block: bool,
    pub anchors_in_trailing_block: usize,
    pub total_anchors: usize,
    pub orphan_mentions: usize,
    pub issues: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroundingReport {
    pub passed: bool,
    pub hits: Vec<String>,
    pub required_hits: usize,
    pub anchor_count: usize,
    pub vocabulary_ok: bool,
    pub denied_phrases: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QualityReport {
    pub word_count: usize,
    pub min_words: usize,
    pub max_words: usize,
    pub meta_talk: MetaTalkReport,
    pub truncation: TruncationReport,
    pub sentences: SentenceReport,
    pub citation: CitationReport,
    pub grounding: GroundingReport,
    pub hedging_terms: Vec<String>,
}

impl QualityReport {
    pub fn below_floor(&self) -> bool {
        self.word_count < self.min_words
    }

    pub fn above_ceiling(&self) -> bool {
        self.word_count > self.max_words
    }

    pub fn all_passed(&self) -> bool {
        !self.below_floor()
            && !self.above_ceiling()
            && self.meta_talk.passed
            && self.truncation.passed
            && self.sentences.passed
            && self.citation.passed
            && self.grounding.passed
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceBand {
    High,
    Medium,
    Low,
}

impl ConfidenceBand {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceResult {
    pub score: u32,
    pub band: ConfidenceBand,
    pub penalties: Vec<String>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Ready,
    Error,
}

impl RecordStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Error => "error",
        }
    }
}

/// Which corrective regenerations a chapter consumed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryFlags {
    pub json_invalid_retry: bool,
    pub lenient_parse: bool,
    pub fallback_used: bool,
    pub truncation_retry: bool,
    pub meta_talk_retry: bool,
    pub grounding_retry: bool,
    pub short_retry: bool,
    pub short_escalated_retry: bool,
    pub long_retry: bool,
    pub sentence_retry: bool,
    pub citation_normalized: bool,
    pub citation_format_retry: bool,
    pub post_normalize_length_retry: bool,
    pub final_rescue_retry: bool,
    pub call_failures: usize,
}

impl RetryFlags {
    /// Corrective regenerations consumed, one per kind.
    pub fn retry_kinds_used(&self) -> usize {
        [
            self.json_invalid_retry,
            self.truncation_retry,
            self.meta_talk_retry,
            self.grounding_retry,
            self.short_retry,
            self.short_escalated_retry,
            self.long_retry,
            self.sentence_retry,
            self.citation_format_retry,
            self.post_normalize_length_retry,
            self.final_rescue_retry,
        ]
        .iter()
        .filter(|used| **used)
        .count()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplanationMetadata {
    pub mode: String,
    pub primary_model: String,
    pub secondary_model: String,
    pub prompt_version: String,
    pub tier: Option<PayloadTier>,
    pub assessment: Option<ComplexityAssessment>,
    pub policy: Option<WordPolicy>,
    pub report: Option<QualityReport>,
    pub confidence: Option<ConfidenceResult>,
    pub retries: RetryFlags,
    /// The attempt whose text was kept, if any call produced one.
    #[serde(default)]
    pub final_attempt: Option<GenerationAttempt>,
    pub attempts: Vec<AttemptTrace>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplanationRecord {
    pub key: ChapterKey,
    pub model: String,
    pub prompt_version: String,
    pub status: RecordStatus,
    pub explanation: Option<String>,
    pub metadata: ExplanationMetadata,
    pub error: Option<String>,
    pub raw_output: Option<String>,
    pub duration_ms: u128,
}

#[derive(Debug, Clone, Serialize)]
pub struct OracleRouteManifest {
    pub backend: String,
    pub endpoint: String,
    pub model: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunFilters {
    pub corpus: Option<String>,
    pub unit: Option<String>,
    pub chapter: Option<u32>,
    pub limit: Option<usize>,
    pub force: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunCounts {
    pub selected: usize,
    pub ok: usize,
    pub error: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChapterRunSummary {
    pub key: ChapterKey,
    pub status: String,
    pub confidence_score: Option<u32>,
    pub confidence_band: Option<String>,
    pub duration_ms: u128,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub mode: String,
    pub prompt_version: String,
    pub prompt_template_sha256: String,
    pub primary: OracleRouteManifest,
    pub secondary: OracleRouteManifest,
    pub corpus_db_path: String,
    pub results_db_path: String,
    pub filters: RunFilters,
    pub counts: RunCounts,
    pub chapters: Vec<ChapterRunSummary>,
    pub warnings: Vec<String>,
}
