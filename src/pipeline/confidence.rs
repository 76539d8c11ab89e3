use super::*;

const PENALTY_BELOW_MIN_WORDS: i32 = 25;
const PENALTY_ABOVE_MAX_WORDS: i32 = 10;
const PENALTY_SENTENCE_COUNT: i32 = 10;
const PENALTY_CITATION_FORMAT: i32 = 30;
const PENALTY_GROUNDING: i32 = 20;
const PENALTY_META_TALK: i32 = 15;
const PENALTY_HEDGING: i32 = 5;
const PENALTY_PER_RETRY_KIND: i32 = 3;
const PENALTY_NORMALIZED: i32 = 2;
const BONUS_PER_EXTRA_HIT: i32 = 2;
const BONUS_CAP: i32 = 6;

const HIGH_BAND_MIN: u32 = 85;
const MEDIUM_BAND_MIN: u32 = 65;

pub(super) fn band_for_score(score: u32) -> ConfidenceBand {
    if score >= HIGH_BAND_MIN {
        ConfidenceBand::High
    } else if score >= MEDIUM_BAND_MIN {
        ConfidenceBand::Medium
    } else {
        ConfidenceBand::Low
    }
}

pub(super) fn score_confidence(report: &QualityReport, flags: &RetryFlags) -> ConfidenceResult {
    let mut score = 100i32;
    let mut penalties = Vec::<String>::new();

    let mut penalize = |amount: i32, reason: String| {
        score -= amount;
        penalties.push(reason);
    };

    if report.below_floor() {
        penalize(
            PENALTY_BELOW_MIN_WORDS,
            format!("word count {} below minimum {}", report.word_count, report.min_words),
        );
    } else if report.above_ceiling() {
        penalize(
            PENALTY_ABOVE_MAX_WORDS,
            format!("word count {} above maximum {}", report.word_count, report.max_words),
        );
    }
    if !report.sentences.passed {
        penalize(
            PENALTY_SENTENCE_COUNT,
            format!(
                "{} sentences outside {}-{}",
                report.sentences.sentence_count,
                report.sentences.min_sentences,
                report.sentences.max_sentences
            ),
        );
    }
    if !report.citation.passed {
        penalize(
            PENALTY_CITATION_FORMAT,
            format!("citation format: {}", report.citation.issues.join("; ")),
        );
    }
    if !report.grounding.passed {
        penalize(PENALTY_GROUNDING, "grounding check failed".to_string());
    }
    if !report.meta_talk.passed {
        penalize(
            PENALTY_META_TALK,
            format!("meta-talk: {}", report.meta_talk.terms.join(", ")),
        );
    }
    if !report.hedging_terms.is_empty() {
        penalize(
            PENALTY_HEDGING,
            format!("hedging: {}", report.hedging_terms.join(", ")),
        );
    }

    let retry_kinds = flags.retry_kinds_used() as i32;
    if retry_kinds > 0 {
        penalize(
            PENALTY_PER_RETRY_KIND * retry_kinds,
            format!("{retry_kinds} retry kinds used"),
        );
    }
    if flags.citation_normalized {
        penalize(PENALTY_NORMALIZED, "citation normalized".to_string());
    }

    let extra_hits = report
        .grounding
        .hits
        .len()
        .saturating_sub(report.grounding.required_hits) as i32;
    score += (extra_hits * BONUS_PER_EXTRA_HIT).min(BONUS_CAP);

    let score = score.clamp(0, 100) as u32;
    ConfidenceResult {
        score,
        band: band_for_score(score),
        penalties,
    }
}
