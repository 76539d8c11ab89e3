use super::*;

pub(super) const HARD_MAX_WORDS: usize = 260;
const ESTIMATED_WORDS_PER_VERSE: usize = 26;
const WORD_BAND: usize = 40;
const NARRATIVE_FLOOR: usize = 80;
const LIST_HEAVY_FLOOR: usize = 70;

/// Words in the chapter text, or an estimate when no verse carries text.
pub(super) fn chapter_word_count(payload: &ChapterPayload) -> (usize, bool) {
    let measured = payload
        .verses
        .iter()
        .map(|verse| verse.text.split_whitespace().count())
        .sum::<usize>();

    if measured == 0 {
        (payload.verses.len() * ESTIMATED_WORDS_PER_VERSE, true)
    } else {
        (measured, false)
    }
}

pub(super) fn estimate_word_policy(
    chapter_words: usize,
    chapter_words_estimated: bool,
    list_heavy: bool,
    target_override: Option<usize>,
) -> WordPolicy {
    let floor = if list_heavy {
        LIST_HEAVY_FLOOR
    } else {
        NARRATIVE_FLOOR
    };

    let (target_words, target_mode) = match target_override {
        Some(value) => (value.clamp(floor, HARD_MAX_WORDS), TargetMode::Override),
        None => {
            let words = chapter_words as f64;
            let target = if list_heavy {
                (50.0 + 0.06 * words).round().clamp(95.0, 165.0)
            } else {
                (60.0 + 0.08 * words).round().clamp(110.0, 190.0)
            };
            (target as usize, TargetMode::Dynamic)
        }
    };

    let min_words = floor.max(target_words.saturating_sub(WORD_BAND));
    let max_words = HARD_MAX_WORDS.min(target_words + WORD_BAND);
    // At least WORD_BAND above the floor, never above the ceiling.
    let prompt_target_words = target_words.max(min_words + WORD_BAND).min(max_words);

    WordPolicy {
        chapter_words,
        chapter_words_estimated,
        target_words,
        prompt_target_words,
        min_words,
        max_words,
        list_heavy,
        target_mode,
    }
}
