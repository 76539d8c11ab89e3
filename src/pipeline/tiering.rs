use super::*;

pub(super) fn tier_for_score(score: u32) -> PayloadTier {
    match score {
        0..=3 => PayloadTier::Full,
        4..=5 => PayloadTier::NoAliases,
        _ => PayloadTier::Compact,
    }
}

#[derive(Debug, Serialize)]
pub(super) struct TieredPayload<'a> {
    corpus: &'a str,
    unit: &'a str,
    chapter: u32,
    verses: Vec<TieredVerse<'a>>,
    entities: Vec<TieredEntity<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    cross_links: Vec<&'a CrossLink>,
}

#[derive(Debug, Serialize)]
struct TieredVerse<'a> {
    number: u32,
    reference: &'a str,
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct TieredEntity<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    entity_type: &'a str,
    mentions: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    aliases: Vec<&'a str>,
}

pub(super) fn tiered_payload(payload: &ChapterPayload, tier: PayloadTier) -> TieredPayload<'_> {
    let keep_aliases = tier == PayloadTier::Full;
    let keep_cross_links = tier != PayloadTier::Compact;

    TieredPayload {
        corpus: &payload.key.corpus,
        unit: &payload.key.unit,
        chapter: payload.key.chapter,
        verses: payload
            .verses
            .iter()
            .map(|verse| TieredVerse {
                number: verse.number,
                reference: &verse.reference,
                text: &verse.text,
            })
            .collect(),
        entities: payload
            .entities
            .iter()
            .map(|entity| TieredEntity {
                name: &entity.name,
                entity_type: &entity.entity_type,
                mentions: entity.mention_count,
                aliases: if keep_aliases {
                    entity.aliases.iter().map(String::as_str).collect()
                } else {
                    Vec::new()
                },
            })
            .collect(),
        cross_links: if keep_cross_links {
            payload.cross_links.iter().collect()
        } else {
            Vec::new()
        },
    }
}

pub(super) fn render_payload_json(payload: &ChapterPayload, tier: PayloadTier) -> Result<String> {
    serde_json::to_string_pretty(&tiered_payload(payload, tier))
        .with_context(|| format!("failed to serialize payload for {}", payload.key))
}
