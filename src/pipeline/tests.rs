use crate::model::{ChapterKey, Entity, Verse};

use super::*;

pub(super) const RUTH_VERSES: [&str; 10] = [
    "In the days when the judges ruled there was a famine in the land and a man went to live in Moab.",
    "His wife was named Naomi and the family settled there while the famine lasted.",
    "The man died and Naomi was left with her two grown boys.",
    "They married Moabite women named Orpah and Ruth and lived there about ten years.",
    "Then both boys died as well and Naomi was left without husband or children.",
    "She heard that the Lord had given food to his people and set out to return home.",
    "Naomi urged Orpah and Ruth to go back to their mothers and find new husbands.",
    "Orpah kissed her and went back but Ruth clung to her.",
    "Ruth said that where Naomi went she would go and that her God would be her God.",
    "So the two women walked on until they came to Bethlehem at the start of the barley harvest.",
];

/// 109 words, 6 sentences, one canonical trailing block.
pub(super) const GOOD_EXPLANATION: &str = "During a famine a man from Bethlehem takes his wife Naomi and their two boys to live in Moab. The man dies there and the boys marry two Moabite women named Orpah and Ruth. About ten years later both boys die as well and Naomi is left alone with her two daughters-in-law. When she hears that food has returned to her homeland she sets out for home and urges both women to go back to their mothers. Orpah kisses her and returns but Ruth refuses to leave and promises that Naomi's people and God will be her own. The two women arrive in Bethlehem as the barley harvest begins (v. 1-5, v. 10).";

/// 29 words, 3 sentences.
pub(super) const SHORT_EXPLANATION: &str = "Naomi loses her husband and both boys while living in Moab. Ruth refuses to leave her and Orpah goes home. The two women reach Bethlehem at the barley harvest (v. 1-5, v. 10).";

pub(super) fn entity(name: &str, entity_type: &str, mention_count: u32) -> Entity {
    Entity {
        name: name.to_string(),
        entity_type: entity_type.to_string(),
        aliases: Vec::new(),
        mention_count,
    }
}

pub(super) fn payload_from(
    unit: &str,
    chapter: u32,
    texts: &[&str],
    entities: Vec<Entity>,
) -> ChapterPayload {
    ChapterPayload {
        key: ChapterKey {
            corpus: "bible".to_string(),
            unit: unit.to_string(),
            chapter,
        },
        verses: texts
            .iter()
            .enumerate()
            .map(|(index, text)| Verse {
                number: index as u32 + 1,
                reference: format!("{unit} {chapter}:{}", index + 1),
                text: text.to_string(),
            })
            .collect(),
        entities,
        cross_links: Vec::new(),
    }
}

pub(super) fn ruth_payload() -> ChapterPayload {
    payload_from(
        "Ruth",
        1,
        &RUTH_VERSES,
        vec![
            entity("Naomi", "person", 5),
            entity("Ruth", "person", 4),
            entity("Moab", "place", 3),
            entity("Orpah", "person", 2),
            entity("Bethlehem", "place", 2),
        ],
    )
}

fn territory_payload() -> ChapterPayload {
    let texts = (0..12)
        .map(|index| {
            if index % 2 == 0 {
                "The border went up to Debir, Gilgal, Adummim, and the waters of En-shemesh."
            } else {
                "These are the towns of the tribe of Judah by their clans."
            }
        })
        .collect::<Vec<&str>>();
    payload_from(
        "Joshua",
        15,
        &texts,
        vec![
            entity("Judah", "tribe", 6),
            entity("Debir", "place", 6),
            entity("Gilgal", "place", 6),
        ],
    )
}

fn narrative_policy() -> WordPolicy {
    estimate_word_policy(180, false, false, None)
}

fn evaluate(text: &str, payload: &ChapterPayload, policy: &WordPolicy) -> QualityReport {
    let rules = QualityRules::new().unwrap();
    let extractor = CapitalizedTermExtractor::new().unwrap();
    let terms = extractor.ranked_terms(payload, PayloadTier::Full);
    rules.evaluate(
        text,
        &EvaluationContext {
            policy,
            tier: PayloadTier::Full,
            terms: &terms,
        },
    )
}

#[test]
fn complexity_is_zero_for_an_empty_chapter() {
    let vocabulary = ListVocabulary::new().unwrap();
    let payload = payload_from("Ruth", 5, &[], Vec::new());

    let assessment = assess_complexity(&payload, &vocabulary);
    assert_eq!(assessment.score, 0);
    assert!(!assessment.list_heavy);
    assert_eq!(base_token_budget(assessment.score), 450);
}

#[test]
fn complexity_is_deterministic() {
    let vocabulary = ListVocabulary::new().unwrap();
    let payload = territory_payload();

    let first = assess_complexity(&payload, &vocabulary);
    let second = assess_complexity(&payload, &vocabulary);
    assert_eq!(first.score, second.score);
    assert_eq!(first.list_heavy, second.list_heavy);
    assert_eq!(measure_chapter(&payload), measure_chapter(&payload));
}

#[test]
fn complexity_score_never_drops_when_one_metric_grows() {
    let base = ChapterMetrics {
        verse_count: 18,
        total_chars: 2_500,
        entity_count: 10,
        entity_density: 0.5,
        avg_verse_chars: 150.0,
        list_heavy_ratio: 0.1,
    };
    let bumps: [fn(&mut ChapterMetrics, usize); 6] = [
        |m, step| m.verse_count += step * 7,
        |m, step| m.total_chars += step * 1_500,
        |m, step| m.entity_count += step * 6,
        |m, step| m.entity_density += step as f64 * 0.4,
        |m, step| m.avg_verse_chars += step as f64 * 25.0,
        |m, step| m.list_heavy_ratio += step as f64 * 0.1,
    ];

    for bump in bumps {
        let mut previous = score_metrics(&base);
        for step in 1..8 {
            let mut metrics = base.clone();
            bump(&mut metrics, step);
            let score = score_metrics(&metrics);
            assert!(score >= previous, "score dropped from {previous} to {score}");
            previous = score;
        }
    }
}

#[test]
fn complexity_thresholds_accumulate() {
    let metrics = ChapterMetrics {
        verse_count: 50,
        total_chars: 9_000,
        entity_count: 25,
        entity_density: 1.5,
        avg_verse_chars: 180.0,
        list_heavy_ratio: 0.3,
    };
    assert_eq!(score_metrics(&metrics), 12);
    assert_eq!(base_token_budget(4), 600);
    assert_eq!(base_token_budget(6), 750);
}

#[test]
fn list_heavy_requires_both_comma_density_and_list_vocabulary() {
    let vocabulary = ListVocabulary::new().unwrap();

    let listing = assess_complexity(&territory_payload(), &vocabulary);
    assert!(listing.list_heavy_ratio >= LIST_HEAVY_RATIO_MIN);
    assert!(listing.list_heavy_semantic);
    assert!(listing.list_heavy);

    let comma_prose = [
        "Naomi rose, wept, kissed them, and turned toward home.",
        "Ruth stayed, Orpah left, Naomi waited, and the road was long.",
        "They walked, rested, ate, and walked again.",
    ];
    let prose = assess_complexity(
        &payload_from("Ruth", 1, &comma_prose, Vec::new()),
        &vocabulary,
    );
    assert!(prose.list_heavy_ratio >= LIST_HEAVY_RATIO_MIN);
    assert!(!prose.list_heavy_semantic);
    assert!(!prose.list_heavy);
}

#[test]
fn list_heavy_semantic_counts_conjunction_openings() {
    let vocabulary = ListVocabulary::new().unwrap();
    let texts = vec!["And Perez was the father of Hezron."; 10];
    assert!(list_heavy_semantic(
        &payload_from("Ruth", 4, &texts, Vec::new()),
        &vocabulary
    ));

    let texts = vec!["And Perez was the father of Hezron."; 9];
    assert!(!list_heavy_semantic(
        &payload_from("Ruth", 4, &texts, Vec::new()),
        &vocabulary
    ));
}

#[test]
fn word_policy_for_long_narrative_chapter() {
    let policy = estimate_word_policy(800, false, false, None);
    assert_eq!(policy.target_words, 124);
    assert_eq!(policy.min_words, 84);
    assert_eq!(policy.max_words, 164);
    assert_eq!(policy.prompt_target_words, 124);
    assert_eq!(policy.target_mode, TargetMode::Dynamic);
}

#[test]
fn word_policy_for_list_heavy_chapter() {
    let policy = estimate_word_policy(500, false, true, None);
    assert_eq!(policy.target_words, 95);
    assert_eq!(policy.min_words, 70);
    assert_eq!(policy.max_words, 135);
    assert_eq!(policy.prompt_target_words, 110);
}

#[test]
fn word_policy_bounds_hold_for_every_input() {
    let overrides = [None, Some(0), Some(60), Some(150), Some(240), Some(1_000)];

    for chapter_words in (0..4_000).step_by(37) {
        for list_heavy in [false, true] {
            for target_override in overrides {
                let policy =
                    estimate_word_policy(chapter_words, false, list_heavy, target_override);
                assert!(policy.min_words <= policy.target_words, "{policy:?}");
                assert!(policy.target_words <= policy.max_words, "{policy:?}");
                assert!(policy.max_words <= HARD_MAX_WORDS, "{policy:?}");
                assert!(policy.prompt_target_words >= policy.min_words, "{policy:?}");
                assert!(policy.prompt_target_words <= policy.max_words, "{policy:?}");
            }
        }
    }
}

#[test]
fn word_policy_override_is_clamped_and_marked() {
    let policy = estimate_word_policy(300, false, false, Some(1_000));
    assert_eq!(policy.target_words, HARD_MAX_WORDS);
    assert_eq!(policy.max_words, HARD_MAX_WORDS);
    assert_eq!(policy.target_mode, TargetMode::Override);
}

#[test]
fn chapter_words_are_estimated_without_verse_text() {
    let payload = payload_from("Ruth", 2, &[""; 10], Vec::new());
    assert_eq!(chapter_word_count(&payload), (260, true));
    assert!(!chapter_word_count(&ruth_payload()).1);
}

#[test]
fn tier_follows_score_bands() {
    assert_eq!(tier_for_score(0), PayloadTier::Full);
    assert_eq!(tier_for_score(3), PayloadTier::Full);
    assert_eq!(tier_for_score(4), PayloadTier::NoAliases);
    assert_eq!(tier_for_score(5), PayloadTier::NoAliases);
    assert_eq!(tier_for_score(6), PayloadTier::Compact);
}

#[test]
fn compact_payload_drops_aliases_and_cross_links() {
    let mut payload = ruth_payload();
    payload.entities[0].aliases = vec!["Mara".to_string()];
    payload.cross_links = vec![CrossLink {
        target_reference: "Ruth 4:17".to_string(),
        relation: "genealogy".to_string(),
    }];

    let full = render_payload_json(&payload, PayloadTier::Full).unwrap();
    assert!(full.contains("Mara"));
    assert!(full.contains("Ruth 4:17"));

    let no_aliases = render_payload_json(&payload, PayloadTier::NoAliases).unwrap();
    assert!(!no_aliases.contains("Mara"));
    assert!(no_aliases.contains("Ruth 4:17"));

    let compact = render_payload_json(&payload, PayloadTier::Compact).unwrap();
    assert!(!compact.contains("Mara"));
    assert!(!compact.contains("cross_links"));
    assert!(compact.contains("Bethlehem"));
}

#[test]
fn prompt_renders_policy_and_list_guidance() {
    let template = PromptTemplate::builtin();
    let payload = ruth_payload();
    let policy = narrative_policy();
    let json = render_payload_json(&payload, PayloadTier::Full).unwrap();

    let prompt = template.render(&chapter_reference(&payload), &json, &policy);
    assert!(prompt.contains("Explain Ruth 1"));
    assert!(prompt.contains("about 120 words"));
    assert!(prompt.contains("fewer than 80 or more than 150"));
    assert!(prompt.contains("between 3 and 7 sentences"));
    assert!(!prompt.contains("{{"));
    assert!(!prompt.contains("mostly a list"));

    let listing = estimate_word_policy(500, false, true, None);
    let prompt = template.render("Joshua 15", &json, &listing);
    assert!(prompt.contains("mostly a list"));
    assert!(prompt.contains("between 2 and 5 sentences"));
}

#[test]
fn correction_is_appended_once_to_the_base_prompt() {
    let prompt = with_correction("BASE", &Correction::Trim { max_words: 150 });
    assert!(prompt.starts_with("BASE\n\nCorrection:\n"));
    assert!(prompt.contains("under 150 words"));
    assert_eq!(prompt.matches("Correction:").count(), 1);
}

#[test]
fn prompt_template_file_must_carry_payload_placeholder() {
    let dir = std::env::temp_dir().join(format!("versegloss-prompt-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    let bad = dir.join("bad.txt");
    fs::write(&bad, "Explain {{reference}} in {{target_words}} words.").unwrap();
    let good = dir.join("good.txt");
    fs::write(&good, "{{payload_json}} in {{target_words}} words.").unwrap();

    assert!(PromptTemplate::load(Some(&bad)).is_err());
    let loaded = PromptTemplate::load(Some(&good)).unwrap();
    assert_eq!(loaded.text(), "{{payload_json}} in {{target_words}} words.");
    assert_eq!(PromptTemplate::load(None).unwrap().text(), PromptTemplate::builtin().text());

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn parser_prefers_strict_json() {
    let parser = OutputParser::new().unwrap();
    let parsed = parser
        .parse(r#"{"explanation": "Ruth stays  with Naomi."}"#)
        .unwrap();
    assert_eq!(parsed.explanation, "Ruth stays with Naomi.");
    assert_eq!(parsed.strategy, ParseStrategy::StrictJson);

    let fenced = "```json\n{\"explanation\": \"Ruth stays.\"}\n```";
    assert_eq!(parser.parse(fenced).unwrap().strategy, ParseStrategy::StrictJson);
}

#[test]
fn parser_falls_back_through_the_cascade() {
    let parser = OutputParser::new().unwrap();

    let wrapped = r#"Here it is: {"explanation": "Ruth stays."} Hope that helps."#;
    let parsed = parser.parse(wrapped).unwrap();
    assert_eq!(parsed.strategy, ParseStrategy::BraceSpan);
    assert!(parsed.strategy.is_strict());

    let broken = r#"{"explanation": "Ruth says \"I will go.\"", "notes": "#;
    let parsed = parser.parse(broken).unwrap();
    assert_eq!(parsed.strategy, ParseStrategy::FieldRegex);
    assert_eq!(parsed.explanation, "Ruth says \"I will go.\"");

    let unterminated = r#"{"explanation": "Ruth stays with Naomi"#;
    let parsed = parser.parse(unterminated).unwrap();
    assert_eq!(parsed.strategy, ParseStrategy::FieldRegex);
    assert_eq!(parsed.explanation, "Ruth stays with Naomi");

    let prose = parser.parse("Explanation: Ruth stays with Naomi.").unwrap();
    assert_eq!(prose.strategy, ParseStrategy::PlainProse);
    assert_eq!(prose.explanation, "Ruth stays with Naomi.");
    assert!(!prose.strategy.is_strict());
}

#[test]
fn parser_rejects_output_without_the_field() {
    let parser = OutputParser::new().unwrap();
    assert!(parser.parse("{}").is_none());
    assert!(parser.parse(r#"{"answer": "Ruth"}"#).is_none());
    assert!(parser.parse("   ").is_none());
    assert!(parser.parse(r#"{"explanation": ""}"#).is_none());
}

#[test]
fn reasoning_is_stripped_before_parsing() {
    let parser = OutputParser::new().unwrap();
    let raw = "<think>The chapter is about Naomi. {\"explanation\": \"wrong\"}</think>\n{\"explanation\": \"Ruth stays.\"}";
    assert_eq!(parser.strip_reasoning(raw), "{\"explanation\": \"Ruth stays.\"}");

    let parsed = parser.parse(raw).unwrap();
    assert_eq!(parsed.explanation, "Ruth stays.");
    assert_eq!(parsed.strategy, ParseStrategy::StrictJson);

    let lead = "Reasoning: keep it short.\n\nRuth stays with Naomi.";
    assert_eq!(parser.strip_reasoning(lead), "Ruth stays with Naomi.");
}

#[test]
fn brace_span_ignores_braces_inside_strings() {
    let text = r#"x {"explanation": "a } b"} y"#;
    let span = outermost_brace_span(text).unwrap();
    assert_eq!(&text[span], r#"{"explanation": "a } b"}"#);
    assert!(outermost_brace_span("{ never closed").is_none());
}

#[test]
fn good_explanation_passes_every_check() {
    let report = evaluate(GOOD_EXPLANATION, &ruth_payload(), &narrative_policy());
    assert_eq!(report.word_count, 109);
    assert_eq!(report.sentences.sentence_count, 6);
    assert!(report.citation.passed, "{:?}", report.citation.issues);
    assert!(report.grounding.passed);
    assert!(report.meta_talk.passed);
    assert!(report.truncation.passed);
    assert!(report.hedging_terms.is_empty());
    assert!(report.all_passed());
}

#[test]
fn truncation_detects_cut_off_endings() {
    let rules = QualityRules::new().unwrap();
    assert!(!rules.truncation("Ruth stays with Naomi (v.").passed);
    assert!(!rules.truncation("Ruth stays with Naomi (v. 3,").passed);
    assert!(!rules.truncation("Ruth stays with Naomi (v. 3, v. 4.").passed);
    assert!(!rules.truncation("Ruth stays with Naomi").passed);
    assert!(!rules.truncation("Ruth stays with Naomi...").passed);
    assert!(!rules.truncation("").passed);
    assert!(rules.truncation("Ruth stays with Naomi (v. 3, v. 4).").passed);
    assert!(rules.truncation("Ruth said, \"I will go.\"").passed);
}

#[test]
fn sentence_bounds_depend_on_list_heaviness() {
    let rules = QualityRules::new().unwrap();
    let two = "Judah receives its towns. The border runs to the sea.";
    assert!(rules.sentences(two, true).passed);
    assert!(!rules.sentences(two, false).passed);
    assert_eq!(rules.sentences(two, false).sentence_count, 2);
}

#[test]
fn meta_talk_names_offending_terms() {
    let rules = QualityRules::new().unwrap();
    let report = rules.meta_talk("Based on the provided verses, the JSON shows that Ruth stays.");
    assert!(!report.passed);
    assert_eq!(report.hit_count, 2);
    assert!(report.terms.contains(&"json".to_string()));
    assert!(rules.meta_talk(GOOD_EXPLANATION).passed);
}

#[test]
fn hedging_terms_are_collected() {
    let rules = QualityRules::new().unwrap();
    let terms = rules.hedging_terms("Ruth perhaps stayed and Orpah likely left.");
    assert_eq!(terms, vec!["perhaps".to_string(), "likely".to_string()]);
}

#[test]
fn citation_with_orphan_mention_is_rebuilt_at_the_end() {
    let rules = CitationRules::new().unwrap();
    let text = "The gate opened in v. 9 and the people rushed in. They settled the land (v. 3-4, v. 24-28).";

    let report = rules.evaluate(text);
    assert!(!report.passed);
    assert_eq!(report.orphan_mentions, 1);
    assert!(report.trailing_block);

    let normalized = rules.normalize(text);
    assert!(normalized.changed);
    assert_eq!(
        normalized.text,
        "The gate opened and the people rushed in. They settled the land (v. 3-4, v. 24-28)."
    );
    assert!(rules.evaluate(&normalized.text).passed);
}

#[test]
fn normalized_text_always_has_one_trailing_block_of_two_anchors() {
    let rules = CitationRules::new().unwrap();
    let inputs = [
        "Joshua divides the land 15:1-12 and Caleb takes Hebron (verses 13-19).",
        "Caleb speaks in v. 6 and again in v. 7 before Joshua blesses him in v. 14.",
        "The tribe receives its land (vv. 1-12).",
        "Ruth gleans in the field (v. 2) and Boaz notices her (v. 5) and feeds her (v. 14)",
        "Naomi returns (v. 1-5, v. 22). Ruth follows.",
    ];

    for input in inputs {
        let normalized = rules.normalize(input);
        let report = rules.evaluate(&normalized.text);
        assert!(normalized.changed, "{input}");
        assert!(report.passed, "{input} -> {} {:?}", normalized.text, report.issues);
        assert_eq!(report.block_count, 1);
        assert_eq!(report.anchors_in_trailing_block, 2);
        assert!(report.trailing_block);
    }
}

#[test]
fn normalizer_keeps_first_and_last_anchor_in_document_order() {
    let rules = CitationRules::new().unwrap();
    let normalized = rules.normalize("Caleb speaks in v. 6 and again in v. 7 before Joshua blesses him in v. 14.");
    assert_eq!(
        normalized.text,
        "Caleb speaks and again before Joshua blesses him (v. 6, v. 14)."
    );

    let split = rules.normalize("The tribe receives its land (vv. 1-12).");
    assert_eq!(split.text, "The tribe receives its land (v. 1, v. 12).");
}

#[test]
fn one_prefix_can_govern_a_list_of_anchors() {
    let rules = CitationRules::new().unwrap();

    let anchors = rules
        .find_mentions("tribes (vv. 3-4, 24-28)")
        .iter()
        .map(|mention| (mention.anchor.start, mention.anchor.end))
        .collect::<Vec<_>>();
    assert_eq!(anchors, vec![(3, Some(4)), (24, Some(28))]);

    let cases = [
        (
            "The land is divided among the tribes (vv. 3-4, 24-28).",
            "The land is divided among the tribes (v. 3-4, v. 24-28).",
        ),
        (
            "Boaz notices Ruth in the field (v. 3, 7).",
            "Boaz notices Ruth in the field (v. 3, v. 7).",
        ),
        (
            "Naomi blesses both women (verses 3 and 9).",
            "Naomi blesses both women (v. 3, v. 9).",
        ),
        (
            "Ruth gleans in vv. 3, 7 and rests at noon.",
            "Ruth gleans and rests at noon (v. 3, v. 7).",
        ),
    ];
    for (input, expected) in cases {
        let normalized = rules.normalize(input);
        assert_eq!(normalized.text, expected, "{input}");
        assert!(rules.evaluate(&normalized.text).passed, "{input}");
    }
}

#[test]
fn unclosed_trailing_citation_is_dropped_before_rebuilding() {
    let rules = CitationRules::new().unwrap();

    for input in [
        "The two women arrive in Bethlehem at harvest (v. 1-5, v.",
        "The two women arrive in Bethlehem at harvest (v. 1-5,",
        "The two women arrive in Bethlehem at harvest (v. 1-5",
    ] {
        let normalized = rules.normalize(input);
        assert_eq!(
            normalized.text,
            "The two women arrive in Bethlehem at harvest (v. 1, v. 5).",
            "{input}"
        );
        assert!(rules.evaluate(&normalized.text).passed);
    }

    let stripped = rules.strip_citations("Ruth stays with Naomi (v. 3,");
    assert_eq!(stripped, "Ruth stays with Naomi");
}

#[test]
fn normalizer_is_a_no_op_without_anchors_or_when_clean() {
    let rules = CitationRules::new().unwrap();

    let bare = rules.normalize("Ruth stays with Naomi.");
    assert!(!bare.changed);
    assert_eq!(bare.text, "Ruth stays with Naomi.");
    assert!(!rules.evaluate("Ruth stays with Naomi.").passed);

    let clean = rules.normalize(GOOD_EXPLANATION);
    assert!(!clean.changed);
    assert_eq!(clean.text, GOOD_EXPLANATION);
}

#[test]
fn citation_mentions_cover_alternate_styles() {
    let rules = CitationRules::new().unwrap();
    let mentions = rules.find_mentions("in v. 9, vv. 3-4, verse 9, verses 3–5 and 12:4");
    let anchors = mentions
        .iter()
        .map(|mention| (mention.anchor.start, mention.anchor.end))
        .collect::<Vec<(u32, Option<u32>)>>();
    assert_eq!(
        anchors,
        vec![(9, None), (3, Some(4)), (9, None), (3, Some(5)), (4, None)]
    );
    assert!(mentions[0].canonical);
    assert!(!mentions[2].canonical);
}

#[test]
fn grounding_requires_payload_terms_and_an_anchor() {
    let payload = ruth_payload();
    let policy = narrative_policy();

    let grounded = evaluate(GOOD_EXPLANATION, &payload, &policy);
    assert!(grounded.grounding.passed);
    assert!(grounded.grounding.hits.len() >= 2);
    assert_eq!(grounded.grounding.required_hits, 2);

    let generic = evaluate(
        "A widow travels home with her daughter-in-law after a hard season abroad (v. 1, v. 22).",
        &payload,
        &policy,
    );
    assert!(!generic.grounding.passed);
    assert!(generic.grounding.hits.is_empty());

    let unanchored = evaluate("Naomi returns with Ruth from Moab.", &payload, &policy);
    assert!(!unanchored.grounding.passed);
    assert_eq!(unanchored.grounding.anchor_count, 0);
}

#[test]
fn grounding_rejects_invented_narrative_in_list_chapter() {
    let rules = GroundingRules::new().unwrap();
    let extractor = CapitalizedTermExtractor::new().unwrap();
    let payload = territory_payload();
    let terms = extractor.ranked_terms(&payload, PayloadTier::Compact);

    let text = "After a fierce battle Judah receives its towns and the border runs past Debir and Gilgal (v. 1, v. 12).";
    let report = rules.evaluate(text, &terms, PayloadTier::Compact, true, 2);
    assert!(report.hits.len() >= 3);
    assert!(report.vocabulary_ok);
    assert_eq!(report.denied_phrases, vec!["fierce battle".to_string()]);
    assert!(!report.passed);

    let plain = "Judah receives its towns and the border runs past Debir and Gilgal (v. 1, v. 12).";
    assert!(rules.evaluate(plain, &terms, PayloadTier::Compact, true, 2).passed);
}

#[test]
fn grounding_requires_list_vocabulary_for_list_chapters() {
    let rules = GroundingRules::new().unwrap();
    let terms = vec![GroundingTerm {
        label: "Judah".to_string(),
        variants: vec!["Judah".to_string()],
    }];
    let text = "Judah is given Debir (v. 1, v. 12).";

    let report = rules.evaluate(text, &terms, PayloadTier::Compact, true, 2);
    assert!(!report.vocabulary_ok);
    assert!(!report.passed);
    assert!(rules.evaluate(text, &terms, PayloadTier::Compact, false, 2).passed);
}

#[test]
fn term_extractor_ranks_entities_then_capitalized_tokens() {
    let extractor = CapitalizedTermExtractor::new().unwrap();
    let mut payload = ruth_payload();
    payload.entities[0].aliases = vec!["Mara".to_string()];

    let full = extractor.ranked_terms(&payload, PayloadTier::Full);
    let labels = full.iter().map(|term| term.label.as_str()).collect::<Vec<&str>>();
    assert_eq!(&labels[..5], &["Naomi", "Ruth", "Moab", "Orpah", "Bethlehem"]);
    assert!(full[0].variants.contains(&"Mara".to_string()));
    assert!(labels.contains(&"God"));
    assert!(!labels.contains(&"The"));

    let compact = extractor.ranked_terms(&payload, PayloadTier::Compact);
    assert_eq!(compact[0].variants, vec!["Naomi".to_string()]);
}

fn passing_report() -> QualityReport {
    QualityReport {
        word_count: 110,
        min_words: 80,
        max_words: 150,
        meta_talk: MetaTalkReport {
            passed: true,
            ..MetaTalkReport::default()
        },
        truncation: TruncationReport {
            passed: true,
            reason: None,
        },
        sentences: SentenceReport {
            passed: true,
            sentence_count: 5,
            min_sentences: 3,
            max_sentences: 7,
        },
        citation: CitationReport {
            passed: true,
            ..CitationReport::default()
        },
        grounding: GroundingReport {
            passed: true,
            hits: vec!["Naomi".to_string(), "Ruth".to_string()],
            required_hits: 2,
            anchor_count: 2,
            vocabulary_ok: true,
            denied_phrases: Vec::new(),
        },
        hedging_terms: Vec::new(),
    }
}

#[test]
fn confidence_is_full_for_a_clean_first_attempt() {
    let result = score_confidence(&passing_report(), &RetryFlags::default());
    assert_eq!(result.score, 100);
    assert_eq!(result.band, ConfidenceBand::High);
    assert!(result.penalties.is_empty());
}

#[test]
fn confidence_penalties_accumulate_and_clamp() {
    let mut report = passing_report();
    report.citation.passed = false;
    report.grounding.passed = false;
    report.word_count = 60;
    let flags = RetryFlags {
        short_retry: true,
        citation_format_retry: true,
        citation_normalized: true,
        lenient_parse: true,
        ..RetryFlags::default()
    };

    let result = score_confidence(&report, &flags);
    // 100 - 25 - 30 - 20 - 2 * 3 - 2
    assert_eq!(result.score, 17);
    assert_eq!(result.band, ConfidenceBand::Low);
    assert_eq!(result.penalties.len(), 5);

    report.meta_talk.passed = false;
    report.sentences.passed = false;
    report.hedging_terms = vec!["perhaps".to_string()];
    assert_eq!(score_confidence(&report, &flags).score, 0);
}

#[test]
fn confidence_bonus_for_extra_grounding_hits_is_capped() {
    let mut report = passing_report();
    report.hedging_terms = vec!["likely".to_string()];
    report.grounding.hits = vec!["Naomi".to_string(), "Ruth".to_string(), "Moab".to_string()];
    assert_eq!(score_confidence(&report, &RetryFlags::default()).score, 97);

    report.grounding.hits = (0..10).map(|index| format!("Term{index}")).collect();
    let flags = RetryFlags {
        long_retry: true,
        sentence_retry: true,
        meta_talk_retry: true,
        truncation_retry: true,
        ..RetryFlags::default()
    };
    // 100 - 5 - 4 * 3 + 6
    assert_eq!(score_confidence(&report, &flags).score, 89);
}

#[test]
fn confidence_bands_have_fixed_edges() {
    assert_eq!(band_for_score(85), ConfidenceBand::High);
    assert_eq!(band_for_score(84), ConfidenceBand::Medium);
    assert_eq!(band_for_score(65), ConfidenceBand::Medium);
    assert_eq!(band_for_score(64), ConfidenceBand::Low);
}
