use super::*;

/// Work already completed before the run started. Read once; chapters
/// finished during this run are not added back.
pub(super) struct RunContext {
    filters: RunFilters,
    ready: HashSet<ChapterKey>,
}

impl RunContext {
    pub(super) fn load(
        results: &ResultStore,
        pipeline: &ExplanationPipeline,
        filters: &RunFilters,
    ) -> Result<Self> {
        let ready = if filters.force {
            HashSet::new()
        } else {
            results.load_ready_keys(
                pipeline.client().model(OracleRoute::Primary),
                &pipeline.settings().prompt_version,
            )?
        };

        Ok(Self {
            filters: filters.clone(),
            ready,
        })
    }

    fn is_ready(&self, key: &ChapterKey) -> bool {
        self.ready.contains(key)
    }
}

#[derive(Debug, Default)]
pub(super) struct BatchReport {
    pub(super) counts: RunCounts,
    pub(super) chapters: Vec<ChapterRunSummary>,
}

/// Explains every selected chapter in order and writes one record each.
/// Chapter failures are recorded and the batch continues; only a failed
/// listing or write stops it.
pub(super) fn process_batch(
    chapters: &ChapterStore,
    results: &ResultStore,
    pipeline: &ExplanationPipeline,
    context: &RunContext,
) -> Result<BatchReport> {
    let keys = chapters.list_chapters(&context.filters)?;
    let total = keys.len();
    let mut report = BatchReport {
        counts: RunCounts {
            selected: total,
            ..RunCounts::default()
        },
        chapters: Vec::with_capacity(total),
    };

    for (index, key) in keys.iter().enumerate() {
        if context.is_ready(key) {
            report.counts.skipped += 1;
            info!(chapter = %key, position = index + 1, total, "chapter already ready");
            continue;
        }

        let started = Instant::now();
        let outcome = explain_chapter(chapters, pipeline, key);
        let duration_ms = started.elapsed().as_millis();

        let summary = ChapterRunSummary {
            key: key.clone(),
            status: outcome.status.as_str().to_string(),
            confidence_score: outcome.metadata.confidence.as_ref().map(|value| value.score),
            confidence_band: outcome
                .metadata
                .confidence
                .as_ref()
                .map(|value| value.band.as_str().to_string()),
            duration_ms,
            error: outcome.error.clone(),
        };

        results.upsert(&ExplanationRecord {
            key: key.clone(),
            model: pipeline.client().model(OracleRoute::Primary).to_string(),
            prompt_version: pipeline.settings().prompt_version.clone(),
            status: outcome.status,
            explanation: outcome.explanation,
            metadata: outcome.metadata,
            error: outcome.error,
            raw_output: outcome.raw_output,
            duration_ms,
        })?;

        match outcome.status {
            RecordStatus::Ready => {
                report.counts.ok += 1;
                info!(
                    chapter = %key,
                    position = index + 1,
                    total,
                    confidence = summary.confidence_score.unwrap_or_default(),
                    band = summary.confidence_band.as_deref().unwrap_or("none"),
                    duration_ms,
                    "chapter explained"
                );
            }
            RecordStatus::Error => {
                report.counts.error += 1;
                warn!(
                    chapter = %key,
                    position = index + 1,
                    total,
                    error = summary.error.as_deref().unwrap_or_default(),
                    duration_ms,
                    "chapter failed"
                );
            }
        }
        report.chapters.push(summary);
    }

    Ok(report)
}

fn explain_chapter(
    chapters: &ChapterStore,
    pipeline: &ExplanationPipeline,
    key: &ChapterKey,
) -> ChapterOutcome {
    let outcome = chapters
        .load_payload(key)
        .and_then(|payload| pipeline.explain(&payload));

    outcome.unwrap_or_else(|err| ChapterOutcome {
        status: RecordStatus::Error,
        explanation: None,
        metadata: bare_metadata(pipeline),
        error: Some(format!("{err:#}")),
        raw_output: None,
    })
}

/// Metadata for a chapter that never reached the oracle.
pub(super) fn bare_metadata(pipeline: &ExplanationPipeline) -> ExplanationMetadata {
    let settings = pipeline.settings();
    ExplanationMetadata {
        mode: settings.mode.as_str().to_string(),
        primary_model: pipeline.client().model(OracleRoute::Primary).to_string(),
        secondary_model: pipeline.client().model(OracleRoute::Secondary).to_string(),
        prompt_version: settings.prompt_version.clone(),
        tier: None,
        assessment: None,
        policy: None,
        report: None,
        confidence: None,
        retries: RetryFlags::default(),
        final_attempt: None,
        attempts: Vec::new(),
    }
}
