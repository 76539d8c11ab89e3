use super::*;

const CANONICAL_ANCHORS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(super) struct VerseAnchor {
    pub start: u32,
    pub end: Option<u32>,
}

impl VerseAnchor {
    pub(super) fn new(start: u32, end: Option<u32>) -> Self {
        Self {
            start,
            end: end.filter(|end| *end != start),
        }
    }

    pub(super) fn render(&self) -> String {
        match self.end {
            Some(end) => format!("v. {}-{}", self.start, end),
            None => format!("v. {}", self.start),
        }
    }
}

/// One citation-like mention anywhere in the text, in any style.
#[derive(Debug, Clone)]
pub(super) struct AnchorMention {
    pub span: Range<usize>,
    pub anchor: VerseAnchor,
    pub canonical: bool,
}

/// A parenthesized span holding at least one mention.
#[derive(Debug, Clone)]
pub(super) struct CitationBlock {
    pub span: Range<usize>,
    pub anchors: Vec<VerseAnchor>,
    pub canonical: bool,
}

impl CitationBlock {
    fn distinct_anchors(&self) -> Vec<VerseAnchor> {
        dedupe_anchors(self.anchors.iter().copied())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct NormalizedText {
    pub text: String,
    pub changed: bool,
}

pub(super) struct CitationRules {
    verse_anchor: Regex,
    anchor_item: Regex,
    chapter_verse: Regex,
    paren_block: Regex,
    canonical_block: Regex,
    trailing_tail: Regex,
    leading_preposition: Regex,
    list_gap: Regex,
    open_tail: Regex,
    empty_parens: Regex,
    space_before_punct: Regex,
    dangling_separator: Regex,
    repeated_space: Regex,
    terminal_cluster: Regex,
}

impl CitationRules {
    pub(super) fn new() -> Result<Self> {
        Ok(Self {
            verse_anchor: Regex::new(
                r"(?i)\b(?:vv?\.|verses?)\s*(\d{1,3}\b(?:\s*[-–—]\s*\d{1,3}\b)?(?:\s*(?:,|;|\band\b)\s*\d{1,3}\b(?:\s*[-–—]\s*\d{1,3}\b)?)*)",
            )
            .context("failed to compile verse anchor regex")?,
            anchor_item: Regex::new(r"(\d{1,3})(?:\s*[-–—]\s*(\d{1,3}))?")
                .context("failed to compile anchor item regex")?,
            chapter_verse: Regex::new(r"\b\d{1,3}:(\d{1,3})\b(?:\s*[-–—]\s*(\d{1,3})\b)?")
                .context("failed to compile chapter:verse regex")?,
            paren_block: Regex::new(r"\(([^()]*)\)")
                .context("failed to compile parenthesized block regex")?,
            canonical_block: Regex::new(r"^v\. \d{1,3}(?:-\d{1,3})?, v\. \d{1,3}(?:-\d{1,3})?$")
                .context("failed to compile canonical block regex")?,
            trailing_tail: Regex::new(r#"^[\s.!?"'”’]*$"#)
                .context("failed to compile trailing tail regex")?,
            leading_preposition: Regex::new(
                r"(?i)\b(?:as seen in|as in|see also|see|cf\.|compare|in|at|from|per)\s+$",
            )
            .context("failed to compile leading preposition regex")?,
            list_gap: Regex::new(r"(?i)^\s*(?:[,;]|and)?\s*$")
                .context("failed to compile list gap regex")?,
            open_tail: Regex::new(r"(?i)\((?:\s|\d|[,;:–—-]|vv?\.?|verses?|and)*$")
                .context("failed to compile open tail regex")?,
            empty_parens: Regex::new(r"\(\s*[,;]?\s*\)")
                .context("failed to compile empty parens regex")?,
            space_before_punct: Regex::new(r"\s+([.,;:!?)])")
                .context("failed to compile space-before-punctuation regex")?,
            dangling_separator: Regex::new(r"[,;:]\s*([,.!?])")
                .context("failed to compile dangling separator regex")?,
            repeated_space: Regex::new(r"\s{2,}")
                .context("failed to compile repeated space regex")?,
            terminal_cluster: Regex::new(r#"[.!?]+["'”’]*$"#)
                .context("failed to compile terminal cluster regex")?,
        })
    }

    pub(super) fn find_mentions(&self, text: &str) -> Vec<AnchorMention> {
        let mut mentions = Vec::<AnchorMention>::new();

        // A prefix may govern a list: `vv. 3-4, 24-28` or `verses 3 and 9`.
        for captures in self.verse_anchor.captures_iter(text) {
            let (Some(full), Some(list)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            for (position, item) in self.anchor_item.captures_iter(list.as_str()).enumerate() {
                let Some(found) = item.get(0) else {
                    continue;
                };
                let end = list.start() + found.end();
                // `12:4` belongs to the chapter:verse form.
                if position > 0 && text[end..].starts_with(':') {
                    break;
                }
                let Some(anchor) = anchor_from_captures(&item) else {
                    continue;
                };
                let span = if position == 0 {
                    full.start()..end
                } else {
                    list.start() + found.start()..end
                };
                mentions.push(AnchorMention {
                    canonical: position == 0 && text[span.clone()] == anchor.render(),
                    span,
                    anchor,
                });
            }
        }

        for captures in self.chapter_verse.captures_iter(text) {
            let Some(full) = captures.get(0) else {
                continue;
            };
            let Some(anchor) = anchor_from_captures(&captures) else {
                continue;
            };
            mentions.push(AnchorMention {
                span: full.range(),
                anchor,
                canonical: false,
            });
        }

        mentions.sort_by_key(|mention| mention.span.start);
        let mut out = Vec::<AnchorMention>::with_capacity(mentions.len());
        for mention in mentions {
            if out
                .last()
                .map(|previous| mention.span.start < previous.span.end)
                .unwrap_or(false)
            {
                continue;
            }
            out.push(mention);
        }
        out
    }

    pub(super) fn find_blocks(&self, text: &str, mentions: &[AnchorMention]) -> Vec<CitationBlock> {
        let mut blocks = Vec::<CitationBlock>::new();

        for captures in self.paren_block.captures_iter(text) {
            let (Some(full), Some(inner)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            let span = full.range();
            let anchors = mentions
                .iter()
                .filter(|mention| contains(&span, &mention.span))
                .map(|mention| mention.anchor)
                .collect::<Vec<VerseAnchor>>();
            if anchors.is_empty() {
                continue;
            }

            blocks.push(CitationBlock {
                span,
                anchors,
                canonical: self.canonical_block.is_match(inner.as_str().trim()),
            });
        }

        blocks
    }

    pub(super) fn evaluate(&self, text: &str) -> CitationReport {
        let mentions = self.find_mentions(text);
        let blocks = self.find_blocks(text, &mentions);
        let orphan_mentions = orphan_mentions(&mentions, &blocks).len();

        let last = blocks.last();
        let trailing_block = last
            .map(|block| self.trailing_tail.is_match(&text[block.span.end..]))
            .unwrap_or(false);
        let anchors_in_trailing_block = match last {
            Some(block) if trailing_block => block.distinct_anchors().len(),
            _ => 0,
        };
        let canonical = last.map(|block| block.canonical).unwrap_or(false);

        let mut issues = Vec::<String>::new();
        if blocks.is_empty() {
            issues.push("no citation block".to_string());
        }
        if blocks.len() > 1 {
            issues.push(format!("{} citation blocks", blocks.len()));
        }
        if !blocks.is_empty() && !trailing_block {
            issues.push("citation block is not at the end".to_string());
        }
        if trailing_block && anchors_in_trailing_block != CANONICAL_ANCHORS {
            issues.push(format!(
                "trailing block has {anchors_in_trailing_block} anchors"
            ));
        }
        if trailing_block && !canonical {
            issues.push("trailing block is not in `v. N, v. M` form".to_string());
        }
        if orphan_mentions > 0 {
            issues.push(format!(
                "{orphan_mentions} verse mentions outside the citation block"
            ));
        }

        CitationReport {
            passed: issues.is_empty(),
            block_count: blocks.len(),
            block_positions: blocks.iter().map(|block| block.span.start).collect(),
            trailing_block,
            anchors_in_trailing_block,
            total_anchors: mentions.len(),
            orphan_mentions,
            issues,
        }
    }

    /// Rebuilds the citation into a single trailing `(v. A, v. B)` block.
    pub(super) fn normalize(&self, text: &str) -> NormalizedText {
        let unchanged = NormalizedText {
            text: text.to_string(),
            changed: false,
        };

        if self.evaluate(text).passed {
            return unchanged;
        }

        let mentions = self.find_mentions(text);
        if mentions.is_empty() {
            return unchanged;
        }
        let blocks = self.find_blocks(text, &mentions);
        let anchors = self.select_anchors(text, &mentions, &blocks);

        let body = self.remove_citations(text, &mentions, &blocks);
        let block = format!(
            "({})",
            anchors
                .iter()
                .map(VerseAnchor::render)
                .collect::<Vec<String>>()
                .join(", ")
        );
        let rebuilt = self.attach_block(&body, &block);

        NormalizedText {
            changed: rebuilt != text,
            text: rebuilt,
        }
    }

    /// Text with every citation fragment removed, for counting words and sentences.
    pub(super) fn strip_citations(&self, text: &str) -> String {
        let mentions = self.find_mentions(text);
        if mentions.is_empty() {
            return text.to_string();
        }
        let blocks = self.find_blocks(text, &mentions);
        self.remove_citations(text, &mentions, &blocks)
    }

    fn select_anchors(
        &self,
        text: &str,
        mentions: &[AnchorMention],
        blocks: &[CitationBlock],
    ) -> Vec<VerseAnchor> {
        if let Some(last) = blocks.last() {
            let distinct = last.distinct_anchors();
            if distinct.len() == CANONICAL_ANCHORS
                && self.trailing_tail.is_match(&text[last.span.end..])
            {
                return distinct;
            }
        }

        let mut anchors = dedupe_anchors(mentions.iter().map(|mention| mention.anchor));
        if anchors.len() > CANONICAL_ANCHORS {
            let first = anchors[0];
            let last = anchors[anchors.len() - 1];
            anchors = vec![first, last];
        }

        if let [only] = anchors.as_slice()
            && let Some(end) = only.end
        {
            return vec![VerseAnchor::new(only.start, None), VerseAnchor::new(end, None)];
        }

        anchors
    }

    fn remove_citations(
        &self,
        text: &str,
        mentions: &[AnchorMention],
        blocks: &[CitationBlock],
    ) -> String {
        let mut removals = Vec::<Range<usize>>::new();

        for block in blocks {
            let start = text[..block.span.start].trim_end().len();
            removals.push(start..block.span.end);
        }
        for mention in orphan_mentions(mentions, blocks) {
            let prefix = &text[..mention.span.start];
            let start = self
                .leading_preposition
                .find(prefix)
                .map(|found| found.start())
                .unwrap_or(mention.span.start);
            let start = text[..start].trim_end().len();
            removals.push(start..mention.span.end);
        }
        if let Some(tail) = self.open_tail.find(text) {
            let start = text[..tail.start()].trim_end().len();
            removals.push(start..text.len());
        }

        removals.sort_by_key(|range| range.start);
        let mut merged = Vec::<Range<usize>>::new();
        for range in removals {
            match merged.last_mut() {
                Some(previous)
                    if range.start <= previous.end
                        || self.list_gap.is_match(&text[previous.end..range.start]) =>
                {
                    previous.end = previous.end.max(range.end);
                }
                _ => merged.push(range),
            }
        }

        let mut out = String::with_capacity(text.len());
        let mut cursor = 0usize;
        for range in merged {
            out.push_str(&text[cursor..range.start]);
            out.push(' ');
            cursor = range.end;
        }
        out.push_str(&text[cursor..]);

        self.tidy(&out)
    }

    fn tidy(&self, text: &str) -> String {
        let text = self.empty_parens.replace_all(text, "");
        let text = self.space_before_punct.replace_all(&text, "$1");
        let text = self.dangling_separator.replace_all(&text, "$1");
        let text = self.repeated_space.replace_all(&text, " ");
        text.trim().to_string()
    }

    fn attach_block(&self, body: &str, block: &str) -> String {
        let body = body.trim_end_matches([',', ';', ':', ' ']);
        if body.is_empty() {
            return format!("{block}.");
        }

        match self.terminal_cluster.find(body) {
            Some(cluster) => format!(
                "{} {}{}",
                body[..cluster.start()].trim_end(),
                block,
                &body[cluster.start()..]
            ),
            None => format!("{body} {block}."),
        }
    }
}

fn anchor_from_captures(captures: &regex::Captures<'_>) -> Option<VerseAnchor> {
    let start = captures.get(1)?.as_str().parse::<u32>().ok()?;
    let end = captures
        .get(2)
        .and_then(|value| value.as_str().parse::<u32>().ok());
    Some(VerseAnchor::new(start, end))
}

fn contains(outer: &Range<usize>, inner: &Range<usize>) -> bool {
    outer.start <= inner.start && inner.end <= outer.end
}

fn orphan_mentions<'a>(
    mentions: &'a [AnchorMention],
    blocks: &[CitationBlock],
) -> Vec<&'a AnchorMention> {
    mentions
        .iter()
        .filter(|mention| !blocks.iter().any(|block| contains(&block.span, &mention.span)))
        .collect()
}

fn dedupe_anchors(anchors: impl Iterator<Item = VerseAnchor>) -> Vec<VerseAnchor> {
    let mut seen = HashSet::<VerseAnchor>::new();
    anchors.filter(|anchor| seen.insert(*anchor)).collect()
}
