use super::*;

/// Read-only access to verses, entities and cross-links.
pub struct ChapterStore {
    pub(super) connection: Connection,
}

impl ChapterStore {
    pub fn open(path: &Path) -> Result<Self> {
        let connection = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("failed to open {}", path.display()))?;
        Self::from_connection(connection)
    }

    pub(crate) fn from_connection(connection: Connection) -> Result<Self> {
        let store = Self { connection };
        for table in ["verses", "entities", "cross_links"] {
            if !store.has_table(table)? {
                bail!("chapter database is missing table `{table}`");
            }
        }
        Ok(store)
    }

    fn has_table(&self, table: &str) -> Result<bool> {
        let count: i64 = self
            .connection
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![table],
                |row| row.get(0),
            )
            .with_context(|| format!("failed to inspect table {table}"))?;
        Ok(count > 0)
    }

    /// Chapters matching the filters, in the order their verses were stored.
    pub fn list_chapters(&self, filters: &RunFilters) -> Result<Vec<ChapterKey>> {
        let limit = filters.limit.map(|limit| limit as i64).unwrap_or(-1);
        let mut statement = self.connection.prepare(
            "
            SELECT corpus, unit, chapter
            FROM verses
            WHERE (?1 IS NULL OR corpus = ?1)
              AND (?2 IS NULL OR unit = ?2)
              AND (?3 IS NULL OR chapter = ?3)
            GROUP BY corpus, unit, chapter
            ORDER BY MIN(rowid)
            LIMIT ?4
            ",
        )?;

        let rows = statement.query_map(
            params![filters.corpus, filters.unit, filters.chapter, limit],
            |row| {
                Ok(ChapterKey {
                    corpus: row.get(0)?,
                    unit: row.get(1)?,
                    chapter: row.get(2)?,
                })
            },
        )?;

        rows.collect::<rusqlite::Result<Vec<ChapterKey>>>()
            .context("failed to list chapters")
    }

    pub fn load_payload(&self, key: &ChapterKey) -> Result<ChapterPayload> {
        let verses = self
            .load_verses(key)
            .with_context(|| format!("failed to load verses for {key}"))?;
        if verses.is_empty() {
            bail!("chapter {key} has no verses");
        }
        let entities = self
            .load_entities(key)
            .with_context(|| format!("failed to load entities for {key}"))?;
        let cross_links = self
            .load_cross_links(key)
            .with_context(|| format!("failed to load cross-links for {key}"))?;

        Ok(ChapterPayload {
            key: key.clone(),
            verses,
            entities,
            cross_links,
        })
    }

    fn load_verses(&self, key: &ChapterKey) -> Result<Vec<Verse>> {
        let mut statement = self.connection.prepare(
            "
            SELECT verse, reference, text
            FROM verses
            WHERE corpus = ?1 AND unit = ?2 AND chapter = ?3
            ORDER BY verse
            ",
        )?;
        let rows = statement.query_map(params![key.corpus, key.unit, key.chapter], |row| {
            Ok(Verse {
                number: row.get(0)?,
                reference: row.get(1)?,
                text: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<Verse>>>()?)
    }

    fn load_entities(&self, key: &ChapterKey) -> Result<Vec<Entity>> {
        let mut statement = self.connection.prepare(
            "
            SELECT name, entity_type, aliases_json, mention_count
            FROM entities
            WHERE corpus = ?1 AND unit = ?2 AND chapter = ?3
            ORDER BY mention_count DESC, name
            ",
        )?;
        let rows = statement.query_map(params![key.corpus, key.unit, key.chapter], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, u32>(3)?,
            ))
        })?;

        let mut entities = Vec::new();
        for row in rows {
            let (name, entity_type, aliases_json, mention_count) = row?;
            let aliases = serde_json::from_str::<Vec<String>>(&aliases_json)
                .with_context(|| format!("invalid aliases_json for entity {name}"))?;
            entities.push(Entity {
                name,
                entity_type,
                aliases,
                mention_count,
            });
        }
        Ok(entities)
    }

    fn load_cross_links(&self, key: &ChapterKey) -> Result<Vec<CrossLink>> {
        let mut statement = self.connection.prepare(
            "
            SELECT target_reference, relation
            FROM cross_links
            WHERE corpus = ?1 AND unit = ?2 AND chapter = ?3
            ORDER BY rowid
            ",
        )?;
        let rows = statement.query_map(params![key.corpus, key.unit, key.chapter], |row| {
            Ok(CrossLink {
                target_reference: row.get(0)?,
                relation: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<CrossLink>>>()?)
    }
}
