use super::*;

pub(super) fn sentence_bounds(list_heavy: bool) -> (usize, usize) {
    if list_heavy { (2, 5) } else { (3, 7) }
}

pub(super) struct EvaluationContext<'a> {
    pub policy: &'a WordPolicy,
    pub tier: PayloadTier,
    pub terms: &'a [GroundingTerm],
}

pub(super) struct QualityRules {
    pub citation: CitationRules,
    pub grounding: GroundingRules,
    meta_talk: Regex,
    hedging: Regex,
    citation_opener: Regex,
    terminal_punctuation: Regex,
    sentence_break: Regex,
}

impl QualityRules {
    pub(super) fn new() -> Result<Self> {
        Ok(Self {
            citation: CitationRules::new()?,
            grounding: GroundingRules::new()?,
            meta_talk: Regex::new(
                r"(?i)\b(json|schema|arrays?|payload|input|output|key-value|(?:the|this) (?:provided|given|supplied) (?:verses|text|data|passage|chapter)|this (?:explanation|summary|response)|as an ai|language model)\b",
            )
            .context("failed to compile meta-talk regex")?,
            hedging: Regex::new(
                r"(?i)\b(perhaps|possibly|probably|presumably|arguably|seemingly|it seems|might have|may have|it is unclear|likely)\b",
            )
            .context("failed to compile hedging regex")?,
            citation_opener: Regex::new(r"(?i)(?:\(|\bvv?\.|\bverses?|,)\s*[\d\s,-]*$")
                .context("failed to compile citation opener regex")?,
            terminal_punctuation: Regex::new(r#"[.!?]["'”’]*$"#)
                .context("failed to compile terminal punctuation regex")?,
            sentence_break: Regex::new(r#"[.!?]+["'”’)]*(?:\s+|$)"#)
                .context("failed to compile sentence break regex")?,
        })
    }

    pub(super) fn evaluate(&self, text: &str, context: &EvaluationContext<'_>) -> QualityReport {
        let stripped = self.citation.strip_citations(text);
        let citation = self.citation.evaluate(text);
        let grounding = self.grounding.evaluate(
            text,
            context.terms,
            context.tier,
            context.policy.list_heavy,
            citation.total_anchors,
        );

        QualityReport {
            word_count: count_words(&stripped),
            min_words: context.policy.min_words,
            max_words: context.policy.max_words,
            meta_talk: self.meta_talk(text),
            truncation: self.truncation(text),
            sentences: self.sentences(&stripped, context.policy.list_heavy),
            citation,
            grounding,
            hedging_terms: self.hedging_terms(text),
        }
    }

    pub(super) fn meta_talk(&self, text: &str) -> MetaTalkReport {
        let terms = self
            .meta_talk
            .find_iter(text)
            .map(|found| found.as_str().to_lowercase())
            .collect::<Vec<String>>();

        MetaTalkReport {
            passed: terms.is_empty(),
            hit_count: terms.len(),
            terms,
        }
    }

    pub(super) fn truncation(&self, text: &str) -> TruncationReport {
        let trimmed = text.trim();
        let reason = if trimmed.is_empty() {
            Some("empty text".to_string())
        } else if trimmed.ends_with("...") || trimmed.ends_with('…') {
            Some("ends with an ellipsis".to_string())
        } else if trimmed.matches('(').count() > trimmed.matches(')').count() {
            Some("unclosed citation block".to_string())
        } else if self.citation_opener.is_match(trimmed) {
            Some("ends inside a citation opener".to_string())
        } else if !self.terminal_punctuation.is_match(trimmed) {
            Some("missing terminal punctuation".to_string())
        } else {
            None
        };

        TruncationReport {
            passed: reason.is_none(),
            reason,
        }
    }

    /// Counts sentences in text that has already had citations stripped.
    pub(super) fn sentences(&self, stripped: &str, list_heavy: bool) -> SentenceReport {
        let (min_sentences, max_sentences) = sentence_bounds(list_heavy);
        let sentence_count = self
            .sentence_break
            .split(stripped)
            .filter(|fragment| fragment.chars().any(char::is_alphabetic))
            .count();

        SentenceReport {
            passed: (min_sentences..=max_sentences).contains(&sentence_count),
            sentence_count,
            min_sentences,
            max_sentences,
        }
    }

    pub(super) fn hedging_terms(&self, text: &str) -> Vec<String> {
        self.hedging
            .find_iter(text)
            .map(|found| found.as_str().to_lowercase())
            .collect()
    }
}

pub(super) fn count_words(text: &str) -> usize {
    text.split_whitespace()
        .filter(|token| token.chars().any(char::is_alphanumeric))
        .count()
}
