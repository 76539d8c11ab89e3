use super::*;

const DEFAULT_TERM_LIMIT: usize = 8;
const FULL_TIER_REQUIRED_HITS: usize = 2;
const COMPACT_TIER_REQUIRED_HITS: usize = 1;

const CAPITALIZED_STOPWORDS: [&str; 16] = [
    "The", "And", "But", "Then", "When", "Now", "Thus", "Behold", "Also", "After", "Before",
    "These", "This", "There", "They", "Their",
];

/// Invented narrative framings that earlier runs attached to chapters that
/// contain no such events.
const DENIED_PHRASES: [&str; 13] = [
    "fierce battle",
    "epic battle",
    "great battle was fought",
    "dramatic rescue",
    "miraculous victory",
    "daring escape",
    "secret plan",
    "heroic journey",
    "love story",
    "the people rebelled",
    "a great feast was held",
    "celebrated with a feast",
    "embarked on a journey",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroundingTerm {
    pub label: String,
    pub variants: Vec<String>,
}

/// Chooses the payload terms an explanation must mention to count as grounded.
pub trait TermExtractor {
    fn ranked_terms(&self, payload: &ChapterPayload, tier: PayloadTier) -> Vec<GroundingTerm>;
}

/// Entity names by mention count, then capitalized mid-sentence tokens from
/// the verse text by frequency.
pub struct CapitalizedTermExtractor {
    limit: usize,
    capitalized: Regex,
}

impl CapitalizedTermExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            limit: DEFAULT_TERM_LIMIT,
            capitalized: Regex::new(r"\b\p{Lu}\p{Ll}{2,}(?:-\p{Lu}\p{Ll}+)?\b")
                .context("failed to compile capitalized token regex")?,
        })
    }

    fn capitalized_tokens(&self, payload: &ChapterPayload) -> Vec<String> {
        let mut counts = HashMap::<String, (usize, usize)>::new();
        let mut order = 0usize;

        for verse in &payload.verses {
            for found in self.capitalized.find_iter(&verse.text) {
                let token = found.as_str();
                if CAPITALIZED_STOPWORDS.contains(&token)
                    || is_sentence_initial(&verse.text[..found.start()])
                {
                    continue;
                }
                let entry = counts.entry(token.to_string()).or_insert((0, order));
                entry.0 += 1;
                order += 1;
            }
        }

        let mut ranked = counts.into_iter().collect::<Vec<(String, (usize, usize))>>();
        ranked.sort_by(|left, right| {
            right
                .1
                .0
                .cmp(&left.1.0)
                .then_with(|| left.1.1.cmp(&right.1.1))
        });
        ranked.into_iter().map(|(token, _)| token).collect()
    }
}

impl TermExtractor for CapitalizedTermExtractor {
    fn ranked_terms(&self, payload: &ChapterPayload, tier: PayloadTier) -> Vec<GroundingTerm> {
        let mut entities = payload.entities.iter().collect::<Vec<_>>();
        entities.sort_by(|left, right| right.mention_count.cmp(&left.mention_count));

        let mut seen = HashSet::<String>::new();
        let mut terms = Vec::<GroundingTerm>::new();

        for entity in entities {
            if terms.len() >= self.limit {
                break;
            }
            let name = entity.name.trim();
            if name.is_empty() || !seen.insert(name.to_lowercase()) {
                continue;
            }
            let mut variants = vec![name.to_string()];
            if tier == PayloadTier::Full {
                variants.extend(
                    entity
                        .aliases
                        .iter()
                        .map(|alias| alias.trim().to_string())
                        .filter(|alias| !alias.is_empty()),
                );
            }
            terms.push(GroundingTerm {
                label: name.to_string(),
                variants,
            });
        }

        for token in self.capitalized_tokens(payload) {
            if terms.len() >= self.limit {
                break;
            }
            if !seen.insert(token.to_lowercase()) {
                continue;
            }
            terms.push(GroundingTerm {
                label: token.clone(),
                variants: vec![token],
            });
        }

        terms
    }
}

fn is_sentence_initial(prefix: &str) -> bool {
    match prefix.trim_end().chars().last() {
        None => true,
        Some(ch) => matches!(ch, '.' | '!' | '?' | ':' | ';' | '"' | '“' | '‘' | '\'' | '('),
    }
}

pub(super) fn required_hits(tier: PayloadTier) -> usize {
    match tier {
        PayloadTier::Compact => COMPACT_TIER_REQUIRED_HITS,
        PayloadTier::Full | PayloadTier::NoAliases => FULL_TIER_REQUIRED_HITS,
    }
}

pub(super) struct GroundingRules {
    list_vocabulary: Regex,
}

impl GroundingRules {
    pub(super) fn new() -> Result<Self> {
        Ok(Self {
            list_vocabulary: Regex::new(
                r"(?i)\b(borders?|boundar(?:y|ies)|territor(?:y|ies)|inheritance|allot(?:ment|ted)|cities|towns|villages|clans?|tribes?|genealog(?:y|ies)|descendants?|lineage|generations?|ancestry|famil(?:y|ies))\b",
            )
            .context("failed to compile list vocabulary regex")?,
        })
    }

    pub(super) fn evaluate(
        &self,
        text: &str,
        terms: &[GroundingTerm],
        tier: PayloadTier,
        list_heavy: bool,
        anchor_count: usize,
    ) -> GroundingReport {
        let lower = text.to_lowercase();

        let hits = terms
            .iter()
            .filter(|term| {
                term.variants
                    .iter()
                    .any(|variant| contains_word(&lower, &variant.to_lowercase()))
            })
            .map(|term| term.label.clone())
            .collect::<Vec<String>>();
        let required = required_hits(tier).min(terms.len());
        let vocabulary_ok = !list_heavy || self.list_vocabulary.is_match(text);
        let denied_phrases = DENIED_PHRASES
            .iter()
            .filter(|phrase| lower.contains(**phrase))
            .map(|phrase| phrase.to_string())
            .collect::<Vec<String>>();

        GroundingReport {
            passed: hits.len() >= required
                && anchor_count >= 1
                && vocabulary_ok
                && denied_phrases.is_empty(),
            hits,
            required_hits: required,
            anchor_count,
            vocabulary_ok,
            denied_phrases,
        }
    }
}

fn contains_word(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }

    haystack.match_indices(needle).any(|(start, matched)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + matched.len()..].chars().next();
        !before.map(char::is_alphanumeric).unwrap_or(false)
            && !after.map(char::is_alphanumeric).unwrap_or(false)
    })
}
