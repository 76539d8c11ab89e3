use super::*;

pub(super) const EXPLANATION_FIELD: &str = "explanation";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct ParsedOutput {
    pub explanation: String,
    pub strategy: ParseStrategy,
}

pub(super) struct OutputParser {
    reasoning_block: Regex,
    reasoning_lead: Regex,
    code_fence: Regex,
    field_value: Regex,
    open_field_value: Regex,
    leading_label: Regex,
}

impl OutputParser {
    pub(super) fn new() -> Result<Self> {
        Ok(Self {
            reasoning_block: Regex::new(r"(?is)<(think|thinking|reasoning)>.*?</(?:think|thinking|reasoning)>")
                .context("failed to compile reasoning block regex")?,
            reasoning_lead: Regex::new(r"(?is)^\s*(?:reasoning|thinking|thoughts)\s*:.*?\n\s*\n")
                .context("failed to compile reasoning lead regex")?,
            code_fence: Regex::new(r"(?m)^\s*```[A-Za-z0-9_-]*\s*$")
                .context("failed to compile code fence regex")?,
            field_value: Regex::new(r#""explanation"\s*:\s*"((?:[^"\\]|\\.)*)""#)
                .context("failed to compile explanation field regex")?,
            open_field_value: Regex::new(r#""explanation"\s*:\s*"((?:[^"\\]|\\.)*)$"#)
                .context("failed to compile open explanation field regex")?,
            leading_label: Regex::new(r"(?i)^\s*(?:explanation|answer|summary|output)\s*[:\-]\s*")
                .context("failed to compile leading label regex")?,
        })
    }

    /// Removes a model's reasoning preamble so only the answer is parsed.
    pub(super) fn strip_reasoning(&self, raw: &str) -> String {
        let without_blocks = self.reasoning_block.replace_all(raw, "");
        // An unterminated block means the answer never started.
        let without_blocks = match without_blocks.find("<think>") {
            Some(index) => without_blocks[..index].to_string(),
            None => without_blocks.into_owned(),
        };
        self.reasoning_lead
            .replace(&without_blocks, "")
            .trim()
            .to_string()
    }

    /// Full cascade; strict strategies are tried before lenient ones.
    pub(super) fn parse(&self, raw: &str) -> Option<ParsedOutput> {
        let cleaned = self.strip_reasoning(raw);
        let unfenced = self.code_fence.replace_all(&cleaned, "").trim().to_string();

        self.strict_json(&unfenced)
            .or_else(|| self.brace_span(&unfenced))
            .or_else(|| self.field_regex(&unfenced))
            .or_else(|| self.plain_prose(&unfenced))
    }

    fn strict_json(&self, text: &str) -> Option<ParsedOutput> {
        let value = serde_json::from_str::<serde_json::Value>(text).ok()?;
        explanation_from_value(&value).map(|explanation| ParsedOutput {
            explanation,
            strategy: ParseStrategy::StrictJson,
        })
    }

    fn brace_span(&self, text: &str) -> Option<ParsedOutput> {
        let span = outermost_brace_span(text)?;
        let value = serde_json::from_str::<serde_json::Value>(&text[span]).ok()?;
        explanation_from_value(&value).map(|explanation| ParsedOutput {
            explanation,
            strategy: ParseStrategy::BraceSpan,
        })
    }

    fn field_regex(&self, text: &str) -> Option<ParsedOutput> {
        let captured = self
            .field_value
            .captures(text)
            .or_else(|| self.open_field_value.captures(text))?
            .get(1)?
            .as_str()
            .to_string();

        let explanation = normalize_whitespace(&unescape_json_fragment(&captured));
        if explanation.is_empty() {
            return None;
        }
        Some(ParsedOutput {
            explanation,
            strategy: ParseStrategy::FieldRegex,
        })
    }

    fn plain_prose(&self, text: &str) -> Option<ParsedOutput> {
        // Broken JSON without the field is not prose.
        if text.trim_start().starts_with('{') || text.trim_start().starts_with('[') {
            return None;
        }

        let unlabeled = self.leading_label.replace(text, "");
        let explanation = normalize_whitespace(
            unlabeled
                .trim()
                .trim_matches(|ch: char| matches!(ch, '"' | '“' | '”')),
        );
        if explanation.is_empty() {
            return None;
        }
        Some(ParsedOutput {
            explanation,
            strategy: ParseStrategy::PlainProse,
        })
    }
}

fn explanation_from_value(value: &serde_json::Value) -> Option<String> {
    let explanation = normalize_whitespace(value.get(EXPLANATION_FIELD)?.as_str()?);
    if explanation.is_empty() {
        None
    } else {
        Some(explanation)
    }
}

/// Byte range of the first balanced `{...}` span, ignoring braces in strings.
pub(super) fn outermost_brace_span(text: &str) -> Option<Range<usize>> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(start..start + offset + 1);
                }
            }
            _ => {}
        }
    }

    None
}

fn unescape_json_fragment(fragment: &str) -> String {
    serde_json::from_str::<String>(&format!("\"{fragment}\"")).unwrap_or_else(|_| {
        fragment
            .replace("\\n", " ")
            .replace("\\t", " ")
            .replace("\\\"", "\"")
            .replace("\\\\", "\\")
    })
}
