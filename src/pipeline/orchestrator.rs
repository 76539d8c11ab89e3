use super::*;

const TRUNCATION_TOKEN_FACTOR: f64 = 1.5;
const VERBOSITY_TOKEN_FACTOR: f64 = 1.3;
const STRONG_VERBOSITY_TOKEN_FACTOR: f64 = 1.6;
const RESCUE_TOKEN_FACTOR: f64 = 1.5;
const TEMPERATURE_STEP: f32 = 0.2;
const MAX_TEMPERATURE: f32 = 1.0;

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub mode: OperatingMode,
    pub base_temperature: f32,
    pub target_words_override: Option<usize>,
    /// Chapters scoring at or above this start on the secondary oracle.
    pub escalate_score: u32,
    pub prompt_version: String,
}

#[derive(Debug, Clone)]
pub struct ChapterOutcome {
    pub status: RecordStatus,
    pub explanation: Option<String>,
    pub metadata: ExplanationMetadata,
    pub error: Option<String>,
    pub raw_output: Option<String>,
}

#[derive(Debug, Error)]
pub enum ChapterError {
    #[error("oracle call failed: {0}")]
    Transport(String),
    #[error("oracle output could not be reduced to an explanation")]
    Parse,
    #[error("explanation has {words} words, below the floor of {min_words}")]
    BelowFloor { words: usize, min_words: usize },
}

pub struct ExplanationPipeline {
    client: GenerationClient,
    template: PromptTemplate,
    rules: QualityRules,
    parser: OutputParser,
    vocabulary: ListVocabulary,
    extractor: Box<dyn TermExtractor>,
    settings: PipelineSettings,
}

impl ExplanationPipeline {
    pub fn new(
        client: GenerationClient,
        template: PromptTemplate,
        extractor: Box<dyn TermExtractor>,
        settings: PipelineSettings,
    ) -> Result<Self> {
        Ok(Self {
            client,
            template,
            rules: QualityRules::new()?,
            parser: OutputParser::new()?,
            vocabulary: ListVocabulary::new()?,
            extractor,
            settings,
        })
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn client(&self) -> &GenerationClient {
        &self.client
    }

    /// Runs every generation and repair step for one chapter. Errors are
    /// only returned for local failures; oracle and quality failures become
    /// an `error` outcome.
    pub fn explain(&self, payload: &ChapterPayload) -> Result<ChapterOutcome> {
        let assessment = assess_complexity(payload, &self.vocabulary);
        let tier = tier_for_score(assessment.score);
        let (chapter_words, estimated) = chapter_word_count(payload);
        let policy = estimate_word_policy(
            chapter_words,
            estimated,
            assessment.list_heavy,
            self.settings.target_words_override,
        );
        let terms = self.extractor.ranked_terms(payload, tier);

        let reference = chapter_reference(payload);
        let payload_json = render_payload_json(payload, tier)?;
        let base_prompt = self.template.render(&reference, &payload_json, &policy);

        let start_route = if assessment.score >= self.settings.escalate_score {
            OracleRoute::Secondary
        } else {
            OracleRoute::Primary
        };
        let base_tokens =
            base_token_budget(assessment.score).max(policy.prompt_target_words * 2 + 120);

        debug!(
            chapter = %payload.key,
            score = assessment.score,
            tier = tier.as_str(),
            list_heavy = assessment.list_heavy,
            min_words = policy.min_words,
            max_words = policy.max_words,
            route = start_route.as_str(),
            "chapter assessed"
        );

        let mut run = ChapterRun {
            pipeline: self,
            context: EvaluationContext {
                policy: &policy,
                tier,
                terms: &terms,
            },
            reference,
            base_prompt,
            start_route,
            base_tokens,
            current: None,
            last_raw: None,
            flags: RetryFlags::default(),
            attempts: Vec::new(),
        };
        let verdict = run.execute();

        let report = run.current_report();
        let confidence = report
            .as_ref()
            .map(|report| score_confidence(report, &run.flags));
        let explanation = run.current.as_ref().map(|attempt| attempt.explanation.clone());
        let raw_output = run.last_raw.clone();
        let metadata = ExplanationMetadata {
            mode: self.settings.mode.as_str().to_string(),
            primary_model: self.client.model(OracleRoute::Primary).to_string(),
            secondary_model: self.client.model(OracleRoute::Secondary).to_string(),
            prompt_version: self.settings.prompt_version.clone(),
            tier: Some(tier),
            assessment: Some(assessment),
            policy: Some(policy.clone()),
            report,
            confidence,
            retries: run.flags,
            final_attempt: run.current,
            attempts: run.attempts,
        };

        Ok(match verdict {
            Ok(()) => ChapterOutcome {
                status: RecordStatus::Ready,
                explanation,
                metadata,
                error: None,
                raw_output,
            },
            Err(err) => ChapterOutcome {
                status: RecordStatus::Error,
                explanation,
                metadata,
                error: Some(err.to_string()),
                raw_output,
            },
        })
    }
}

struct CallRequest {
    purpose: &'static str,
    route: OracleRoute,
    correction: Option<Correction>,
    temperature: f32,
    max_tokens: usize,
}

struct ChapterRun<'a> {
    pipeline: &'a ExplanationPipeline,
    context: EvaluationContext<'a>,
    reference: String,
    base_prompt: String,
    start_route: OracleRoute,
    base_tokens: usize,
    current: Option<GenerationAttempt>,
    last_raw: Option<String>,
    flags: RetryFlags,
    attempts: Vec<AttemptTrace>,
}

impl ChapterRun<'_> {
    fn execute(&mut self) -> Result<(), ChapterError> {
        self.initial_generation()?;
        let standard = self.pipeline.settings.mode == OperatingMode::Standard;

        if standard {
            self.corrective_steps();
        }

        // Format repair without a call always runs; the format-lock retry is
        // the one regeneration both modes allow.
        self.normalize_current();
        if !self.report().citation.passed {
            self.flags.citation_format_retry = true;
            self.regenerate(self.request(
                "citation_format",
                OracleRoute::Secondary,
                Correction::FormatLock,
                self.temperature(),
                self.base_tokens,
            ));
        }

        if standard {
            if self.report().below_floor() {
                self.flags.post_normalize_length_retry = true;
                self.regenerate(self.request(
                    "post_normalize_length",
                    self.start_route,
                    self.strong_expand(),
                    self.higher_temperature(),
                    scale(self.base_tokens, STRONG_VERBOSITY_TOKEN_FACTOR),
                ));
            }

            if !self.report().all_passed() {
                self.flags.final_rescue_retry = true;
                let (min_sentences, max_sentences) =
                    sentence_bounds(self.context.policy.list_heavy);
                let correction = Correction::Rescue {
                    min_words: self.context.policy.min_words,
                    max_words: self.context.policy.max_words,
                    min_sentences,
                    max_sentences,
                    terms: self.term_labels(),
                };
                self.regenerate(self.request(
                    "final_rescue",
                    OracleRoute::Secondary,
                    correction,
                    self.temperature(),
                    scale(self.base_tokens, RESCUE_TOKEN_FACTOR),
                ));
            }
        }

        let report = self.report();
        if report.below_floor() {
            if standard {
                return Err(ChapterError::BelowFloor {
                    words: report.word_count,
                    min_words: report.min_words,
                });
            }
            warn!(
                words = report.word_count,
                min_words = report.min_words,
                "accepting explanation below the word floor in relaxed mode"
            );
        }

        Ok(())
    }

    fn initial_generation(&mut self) -> Result<(), ChapterError> {
        let first_request = self.request_plain("initial", self.start_route);
        let first_trace = self.attempts.len();
        let first = self.call(&first_request);
        if let Ok(raw) = first.as_deref() {
            match self.parse_strict(raw) {
                Some(parsed) => {
                    self.accept(first_trace, &first_request, raw, parsed);
                    return Ok(());
                }
                None => self.trace_outcome(first_trace, "not a valid object"),
            }
        }

        self.flags.json_invalid_retry = true;
        let repair_request = self.request(
            "json_repair",
            self.start_route,
            Correction::ValidOutputOnly,
            self.temperature(),
            self.base_tokens,
        );
        let repair_trace = self.attempts.len();
        let repair = self.call(&repair_request);
        if let Ok(raw) = repair.as_deref() {
            match self.parse_strict(raw) {
                Some(parsed) => {
                    self.accept(repair_trace, &repair_request, raw, parsed);
                    return Ok(());
                }
                None => self.trace_outcome(repair_trace, "not a valid object"),
            }
        }

        let candidates = [
            (repair_trace, &repair_request, &repair),
            (first_trace, &first_request, &first),
        ];
        for (trace, request, result) in candidates {
            let Ok(raw) = result else {
                continue;
            };
            if let Some(parsed) = self.pipeline.parser.parse(raw) {
                self.flags.lenient_parse = true;
                self.accept(trace, request, raw, parsed);
                return Ok(());
            }
        }

        match (first, repair) {
            (Err(_), Err(err)) => Err(ChapterError::Transport(err.to_string())),
            _ => Err(ChapterError::Parse),
        }
    }

    fn corrective_steps(&mut self) {
        if let Some(reason) = self.report().truncation.reason {
            debug!(reason = %reason, "explanation looks truncated");
            self.flags.truncation_retry = true;
            self.regenerate(self.request(
                "truncation",
                self.start_route,
                Correction::Complete,
                self.temperature(),
                scale(self.base_tokens, TRUNCATION_TOKEN_FACTOR),
            ));
        }

        if !self.report().meta_talk.passed {
            self.flags.meta_talk_retry = true;
            self.regenerate(self.request(
                "meta_talk",
                self.start_route,
                Correction::NoMetaTalk,
                self.temperature(),
                self.base_tokens,
            ));
        }

        if !self.report().grounding.passed {
            self.flags.grounding_retry = true;
            let correction = Correction::GroundInVerses {
                reference: self.reference.clone(),
                terms: self.term_labels(),
            };
            self.regenerate(self.request(
                "grounding",
                OracleRoute::Secondary,
                correction,
                self.temperature(),
                self.base_tokens,
            ));
        }

        if self.report().below_floor() {
            self.flags.short_retry = true;
            let correction = Correction::Expand {
                min_words: self.context.policy.min_words,
                target_words: self.context.policy.prompt_target_words,
            };
            self.regenerate(self.request(
                "short",
                self.start_route,
                correction,
                self.temperature(),
                scale(self.base_tokens, VERBOSITY_TOKEN_FACTOR),
            ));

            if self.report().below_floor() {
                self.flags.short_escalated_retry = true;
                self.regenerate(self.request(
                    "short_escalated",
                    self.start_route,
                    self.strong_expand(),
                    self.higher_temperature(),
                    scale(self.base_tokens, STRONG_VERBOSITY_TOKEN_FACTOR),
                ));
            }
        }

        if self.report().above_ceiling() {
            self.flags.long_retry = true;
            self.regenerate(self.request(
                "long",
                self.start_route,
                Correction::Trim {
                    max_words: self.context.policy.max_words,
                },
                self.temperature(),
                self.base_tokens,
            ));
        }

        if !self.report().sentences.passed {
            self.flags.sentence_retry = true;
            let (min_sentences, max_sentences) = sentence_bounds(self.context.policy.list_heavy);
            self.regenerate(self.request(
                "sentence_count",
                self.start_route,
                Correction::SentenceBounds {
                    min_sentences,
                    max_sentences,
                },
                self.temperature(),
                self.base_tokens,
            ));
        }
    }

    /// One corrective call. Unusable results keep the previous attempt.
    fn regenerate(&mut self, request: CallRequest) {
        let trace = self.attempts.len();
        let Ok(raw) = self.call(&request) else {
            self.flags.fallback_used = true;
            return;
        };

        let parsed = match self.parse_strict(&raw) {
            Some(parsed) => Some(parsed),
            None => {
                let lenient = self.pipeline.parser.parse(&raw);
                if lenient.is_some() {
                    self.flags.lenient_parse = true;
                }
                lenient
            }
        };

        match parsed {
            Some(parsed) => self.accept(trace, &request, &raw, parsed),
            None => {
                self.flags.fallback_used = true;
                self.trace_outcome(trace, "unparseable; kept previous attempt");
            }
        }
    }

    fn call(&mut self, request: &CallRequest) -> Result<String, OracleError> {
        let prompt = match &request.correction {
            Some(correction) => with_correction(&self.base_prompt, correction),
            None => self.base_prompt.clone(),
        };

        self.attempts.push(AttemptTrace {
            purpose: request.purpose.to_string(),
            route: request.route,
            model: self.pipeline.client.model(request.route).to_string(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            outcome: "pending".to_string(),
        });

        let result = self.pipeline.client.generate(
            request.route,
            &prompt,
            request.temperature,
            request.max_tokens,
        );
        match &result {
            Ok(raw) => {
                self.last_raw = Some(raw.clone());
            }
            Err(err) => {
                self.flags.call_failures += 1;
                warn!(
                    purpose = request.purpose,
                    route = request.route.as_str(),
                    error = %err,
                    "oracle call failed"
                );
                let trace = self.attempts.len() - 1;
                self.trace_outcome(trace, &format!("call failed: {err}"));
            }
        }
        result
    }

    fn accept(&mut self, trace: usize, request: &CallRequest, raw: &str, parsed: ParsedOutput) {
        self.trace_outcome(trace, &format!("accepted via {}", parsed.strategy.as_str()));
        self.current = Some(GenerationAttempt {
            purpose: request.purpose.to_string(),
            route: request.route,
            model: self.pipeline.client.model(request.route).to_string(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            raw_output: raw.to_string(),
            explanation: parsed.explanation,
            strategy: parsed.strategy,
        });
        self.normalize_current();
    }

    fn normalize_current(&mut self) {
        let Some(current) = self.current.as_mut() else {
            return;
        };
        let citation = &self.pipeline.rules.citation;
        if citation.evaluate(&current.explanation).passed {
            return;
        }

        let normalized = citation.normalize(&current.explanation);
        if normalized.changed {
            debug!(purpose = %current.purpose, "normalized citation block");
            current.explanation = normalized.text;
            self.flags.citation_normalized = true;
        }
    }

    fn parse_strict(&self, raw: &str) -> Option<ParsedOutput> {
        self.pipeline
            .parser
            .parse(raw)
            .filter(|parsed| parsed.strategy.is_strict())
    }

    fn trace_outcome(&mut self, trace: usize, outcome: &str) {
        if let Some(attempt) = self.attempts.get_mut(trace) {
            attempt.outcome = outcome.to_string();
        }
    }

    fn report(&self) -> QualityReport {
        self.current_report().unwrap_or_default()
    }

    fn current_report(&self) -> Option<QualityReport> {
        self.current
            .as_ref()
            .map(|attempt| self.pipeline.rules.evaluate(&attempt.explanation, &self.context))
    }

    fn request_plain(&self, purpose: &'static str, route: OracleRoute) -> CallRequest {
        CallRequest {
            purpose,
            route,
            correction: None,
            temperature: self.temperature(),
            max_tokens: self.base_tokens,
        }
    }

    fn request(
        &self,
        purpose: &'static str,
        route: OracleRoute,
        correction: Correction,
        temperature: f32,
        max_tokens: usize,
    ) -> CallRequest {
        CallRequest {
            purpose,
            route,
            correction: Some(correction),
            temperature,
            max_tokens,
        }
    }

    fn strong_expand(&self) -> Correction {
        Correction::ExpandStrongly {
            min_words: self.context.policy.min_words,
            target_words: self.context.policy.prompt_target_words,
        }
    }

    fn term_labels(&self) -> Vec<String> {
        self.context
            .terms
            .iter()
            .map(|term| term.label.clone())
            .collect()
    }

    fn temperature(&self) -> f32 {
        self.pipeline.settings.base_temperature
    }

    fn higher_temperature(&self) -> f32 {
        (self.pipeline.settings.base_temperature + TEMPERATURE_STEP).min(MAX_TEMPERATURE)
    }
}

fn scale(tokens: usize, factor: f64) -> usize {
    (tokens as f64 * factor).round() as usize
}
