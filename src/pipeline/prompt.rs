use super::*;

pub const SYSTEM_INSTRUCTION: &str = "You write short, faithful explanations of scripture chapters for readers. \
Reply with a single JSON object of the form {\"explanation\": \"...\"} and nothing else.";

const DEFAULT_TEMPLATE: &str = r#"Explain {{reference}} for a general reader.

Chapter data:
{{payload_json}}

Rules:
- Write about {{target_words}} words; never fewer than {{min_words}} or more than {{max_words}}.
- Use between {{min_sentences}} and {{max_sentences}} sentences of plain prose.
- Mention the people and places that matter most in this chapter by name.
- Describe only what these verses contain. Do not add events, motives or outcomes.
- Do not mention verse numbers in the body. End with exactly one citation block of two verse anchors, placed before the final period, for example: (v. 1-4, v. 20-24).
- Do not describe the data you were given or the format of your answer.
{{list_heavy_guidance}}
Return {"explanation": "..."} only."#;

const LIST_HEAVY_GUIDANCE: &str = "- This chapter is mostly a list of names, borders or towns. Summarize what the list records and whose it is, name the most prominent entries, and do not invent a story around it.";

const REQUIRED_PLACEHOLDERS: [&str; 2] = ["{{payload_json}}", "{{target_words}}"];

#[derive(Debug, Clone)]
pub struct PromptTemplate {
    text: String,
}

impl PromptTemplate {
    pub fn builtin() -> Self {
        Self {
            text: DEFAULT_TEMPLATE.to_string(),
        }
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::builtin());
        };

        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read prompt template {}", path.display()))?;
        for placeholder in REQUIRED_PLACEHOLDERS {
            if !text.contains(placeholder) {
                bail!(
                    "prompt template {} is missing placeholder {placeholder}",
                    path.display()
                );
            }
        }

        Ok(Self { text })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub(super) fn render(
        &self,
        reference: &str,
        payload_json: &str,
        policy: &WordPolicy,
    ) -> String {
        let (min_sentences, max_sentences) = sentence_bounds(policy.list_heavy);
        let guidance = if policy.list_heavy {
            LIST_HEAVY_GUIDANCE
        } else {
            ""
        };

        self.text
            .replace("{{reference}}", reference)
            .replace("{{target_words}}", &policy.prompt_target_words.to_string())
            .replace("{{min_words}}", &policy.min_words.to_string())
            .replace("{{max_words}}", &policy.max_words.to_string())
            .replace("{{min_sentences}}", &min_sentences.to_string())
            .replace("{{max_sentences}}", &max_sentences.to_string())
            .replace("{{list_heavy_guidance}}", guidance)
            .replace("{{payload_json}}", payload_json)
    }
}

/// Human-readable label such as `Joshua 15`.
pub(super) fn chapter_reference(payload: &ChapterPayload) -> String {
    format!("{} {}", payload.key.unit, payload.key.chapter)
}

/// One corrective instruction appended to the original prompt.
#[derive(Debug, Clone)]
pub(super) enum Correction {
    ValidOutputOnly,
    Complete,
    NoMetaTalk,
    GroundInVerses { reference: String, terms: Vec<String> },
    Expand { min_words: usize, target_words: usize },
    ExpandStrongly { min_words: usize, target_words: usize },
    Trim { max_words: usize },
    SentenceBounds { min_sentences: usize, max_sentences: usize },
    FormatLock,
    Rescue {
        min_words: usize,
        max_words: usize,
        min_sentences: usize,
        max_sentences: usize,
        terms: Vec<String>,
    },
}

impl Correction {
    pub(super) fn instruction(&self) -> String {
        match self {
            Self::ValidOutputOnly => "Your previous reply was not valid. Return only the JSON object {\"explanation\": \"...\"} with no other text, no code fences and no commentary.".to_string(),
            Self::Complete => "Your previous reply was cut off. Write the complete explanation and finish the last sentence, the citation block and the final period.".to_string(),
            Self::NoMetaTalk => "Do not talk about data, formats, fields, lists of objects, inputs, outputs or yourself. Write only about the chapter's content.".to_string(),
            Self::GroundInVerses { reference, terms } => format!(
                "Use only what the verses of {reference} say. Name at least two of: {}. Do not add events that are not in the verses.",
                terms.join(", ")
            ),
            Self::Expand {
                min_words,
                target_words,
            } => format!(
                "Your previous reply was too short. Write about {target_words} words and never fewer than {min_words}, adding detail from the verses."
            ),
            Self::ExpandStrongly {
                min_words,
                target_words,
            } => format!(
                "Your reply is still too short. It must contain at least {min_words} words; aim for {target_words}. Cover the beginning, middle and end of the chapter with concrete names and details from the verses."
            ),
            Self::Trim { max_words } => format!(
                "Your previous reply was too long. Keep it under {max_words} words while keeping the key names."
            ),
            Self::SentenceBounds {
                min_sentences,
                max_sentences,
            } => format!(
                "Use between {min_sentences} and {max_sentences} complete sentences."
            ),
            Self::FormatLock => "Verse numbers may appear only once, inside a single block at the very end, in exactly this form: (v. A-B, v. C-D). Use two anchors, separated by a comma, placed before the final period. Remove every other verse reference.".to_string(),
            Self::Rescue {
                min_words,
                max_words,
                min_sentences,
                max_sentences,
                terms,
            } => format!(
                "Rewrite the explanation from scratch so it meets every rule at once: {min_words} to {max_words} words, {min_sentences} to {max_sentences} sentences, names at least two of {}, describes only what the verses contain, never mentions data or formats, and ends with exactly one block like (v. A-B, v. C-D) before the final period.",
                terms.join(", ")
            ),
        }
    }
}

pub(super) fn with_correction(base_prompt: &str, correction: &Correction) -> String {
    format!("{base_prompt}\n\nCorrection:\n{}", correction.instruction())
}
