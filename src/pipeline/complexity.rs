use super::*;

const VERSE_COUNT_STEPS: [usize; 3] = [20, 35, 50];
const TOTAL_CHAR_STEPS: [usize; 3] = [3_000, 6_000, 9_000];
const ENTITY_COUNT_STEPS: [usize; 2] = [12, 25];
const ENTITY_DENSITY_STEPS: [f64; 2] = [0.8, 1.5];
const AVG_VERSE_CHAR_STEP: f64 = 180.0;

pub(super) const LIST_HEAVY_RATIO_MIN: f64 = 0.30;
const LIST_VERSE_MIN_COMMAS: usize = 3;
const VOCABULARY_HIT_MIN: usize = 3;
const CONJUNCTION_LINE_MIN: usize = 10;
const COORDINATING_CONJUNCTIONS: [&str; 7] = ["and", "but", "or", "nor", "for", "so", "yet"];

const BASE_TOKEN_BUDGET: usize = 450;
const TOKEN_BUDGET_STEP: usize = 150;

/// Raw size and density measurements of one chapter. Every field is an
/// independent input to [`score_metrics`].
#[derive(Debug, Clone, Default, PartialEq)]
pub(super) struct ChapterMetrics {
    pub verse_count: usize,
    pub total_chars: usize,
    pub entity_count: usize,
    pub entity_density: f64,
    pub avg_verse_chars: f64,
    pub list_heavy_ratio: f64,
}

pub(super) struct ListVocabulary {
    territory: Regex,
    genealogy: Regex,
}

impl ListVocabulary {
    pub(super) fn new() -> Result<Self> {
        Ok(Self {
            territory: Regex::new(
                r"(?i)\b(borders?|boundar(?:y|ies)|territor(?:y|ies)|inheritance|allot(?:ment|ted)|cities|towns|villages|pasture ?lands|went up to|went down to)\b",
            )
            .context("failed to compile territory vocabulary regex")?,
            genealogy: Regex::new(
                r"(?i)\b(begat|begot|fathered|became the father of|sons? of|daughters? of|descendants?|generations?|genealog(?:y|ies)|clans?|lived \d+ years)\b",
            )
            .context("failed to compile genealogy vocabulary regex")?,
        })
    }

    fn territory_hits(&self, text: &str) -> usize {
        self.territory.find_iter(text).count()
    }

    fn genealogy_hits(&self, text: &str) -> usize {
        self.genealogy.find_iter(text).count()
    }
}

pub(super) fn measure_chapter(payload: &ChapterPayload) -> ChapterMetrics {
    let verse_count = payload.verses.len();
    let total_chars = payload
        .verses
        .iter()
        .map(|verse| verse.text.chars().count())
        .sum::<usize>();
    let entity_count = payload.entities.len();
    let list_verses = payload
        .verses
        .iter()
        .filter(|verse| verse.text.matches(',').count() >= LIST_VERSE_MIN_COMMAS)
        .count();

    let (entity_density, avg_verse_chars, list_heavy_ratio) = if verse_count == 0 {
        (0.0, 0.0, 0.0)
    } else {
        let verses = verse_count as f64;
        (
            entity_count as f64 / verses,
            total_chars as f64 / verses,
            list_verses as f64 / verses,
        )
    };

    ChapterMetrics {
        verse_count,
        total_chars,
        entity_count,
        entity_density,
        avg_verse_chars,
        list_heavy_ratio,
    }
}

pub(super) fn score_metrics(metrics: &ChapterMetrics) -> u32 {
    let mut score = 0u32;

    score += VERSE_COUNT_STEPS
        .iter()
        .filter(|step| metrics.verse_count >= **step)
        .count() as u32;
    score += TOTAL_CHAR_STEPS
        .iter()
        .filter(|step| metrics.total_chars >= **step)
        .count() as u32;
    score += ENTITY_COUNT_STEPS
        .iter()
        .filter(|step| metrics.entity_count >= **step)
        .count() as u32;
    score += ENTITY_DENSITY_STEPS
        .iter()
        .filter(|step| metrics.entity_density >= **step)
        .count() as u32;
    if metrics.avg_verse_chars >= AVG_VERSE_CHAR_STEP {
        score += 1;
    }
    if metrics.list_heavy_ratio >= LIST_HEAVY_RATIO_MIN {
        score += 1;
    }

    score
}

pub(super) fn list_heavy_semantic(payload: &ChapterPayload, vocabulary: &ListVocabulary) -> bool {
    let text = payload
        .verses
        .iter()
        .map(|verse| verse.text.as_str())
        .collect::<Vec<&str>>()
        .join("\n");

    if vocabulary.territory_hits(&text) >= VOCABULARY_HIT_MIN
        || vocabulary.genealogy_hits(&text) >= VOCABULARY_HIT_MIN
    {
        return true;
    }

    payload
        .verses
        .iter()
        .filter(|verse| starts_with_conjunction(&verse.text))
        .count()
        >= CONJUNCTION_LINE_MIN
}

fn starts_with_conjunction(text: &str) -> bool {
    let Some(first) = text.split_whitespace().next() else {
        return false;
    };
    let word = first
        .trim_matches(|ch: char| !ch.is_alphabetic())
        .to_lowercase();
    COORDINATING_CONJUNCTIONS.contains(&word.as_str())
}

pub(super) fn assess_complexity(
    payload: &ChapterPayload,
    vocabulary: &ListVocabulary,
) -> ComplexityAssessment {
    let metrics = measure_chapter(payload);
    let score = score_metrics(&metrics);
    let semantic = list_heavy_semantic(payload, vocabulary);

    ComplexityAssessment {
        score,
        verse_count: metrics.verse_count,
        total_chars: metrics.total_chars,
        entity_count: metrics.entity_count,
        entity_density: metrics.entity_density,
        avg_verse_chars: metrics.avg_verse_chars,
        list_heavy_ratio: metrics.list_heavy_ratio,
        list_heavy_semantic: semantic,
        // Comma-dense narrative prose must not be treated as a listing.
        list_heavy: metrics.list_heavy_ratio >= LIST_HEAVY_RATIO_MIN && semantic,
    }
}

pub(super) fn base_token_budget(score: u32) -> usize {
    let mut budget = BASE_TOKEN_BUDGET;
    if score >= 4 {
        budget += TOKEN_BUDGET_STEP;
    }
    if score >= 6 {
        budget += TOKEN_BUDGET_STEP;
    }
    budget
}
