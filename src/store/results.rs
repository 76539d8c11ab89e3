use super::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusCount {
    pub status: String,
    pub band: Option<String>,
    pub count: i64,
}

/// Write side of the pipeline: one row per chapter, model and prompt version.
pub struct ResultStore {
    pub(super) connection: Connection,
}

impl ResultStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            ensure_directory(parent)?;
        }

        let connection = Connection::open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        Self::from_connection(connection)
    }

    pub(crate) fn from_connection(connection: Connection) -> Result<Self> {
        configure_connection(&connection)?;
        ensure_results_schema(&connection)?;
        Ok(Self { connection })
    }

    /// Inserts or replaces the record for its key; reruns never add rows.
    pub fn upsert(&self, record: &ExplanationRecord) -> Result<()> {
        let metadata_json = serde_json::to_string(&record.metadata)
            .with_context(|| format!("failed to serialize metadata for {}", record.key))?;
        let duration_ms = i64::try_from(record.duration_ms).unwrap_or(i64::MAX);

        self.connection
            .execute(
                "
                INSERT INTO chapter_explanations(
                  corpus, unit, chapter, model, prompt_version, status, explanation,
                  metadata_json, error, raw_output, duration_ms, updated_at
                )
                VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                ON CONFLICT(corpus, unit, chapter, model, prompt_version) DO UPDATE SET
                  status=excluded.status,
                  explanation=excluded.explanation,
                  metadata_json=excluded.metadata_json,
                  error=excluded.error,
                  raw_output=excluded.raw_output,
                  duration_ms=excluded.duration_ms,
                  updated_at=excluded.updated_at
                ",
                params![
                    record.key.corpus,
                    record.key.unit,
                    record.key.chapter,
                    record.model,
                    record.prompt_version,
                    record.status.as_str(),
                    record.explanation,
                    metadata_json,
                    record.error,
                    record.raw_output,
                    duration_ms,
                    now_utc_string(),
                ],
            )
            .with_context(|| format!("failed to upsert explanation for {}", record.key))?;

        Ok(())
    }

    /// Keys already `ready` for this model and prompt version.
    pub fn load_ready_keys(&self, model: &str, prompt_version: &str) -> Result<HashSet<ChapterKey>> {
        let mut statement = self.connection.prepare(
            "
            SELECT corpus, unit, chapter
            FROM chapter_explanations
            WHERE status = 'ready' AND model = ?1 AND prompt_version = ?2
            ",
        )?;
        let rows = statement.query_map(params![model, prompt_version], |row| {
            Ok(ChapterKey {
                corpus: row.get(0)?,
                unit: row.get(1)?,
                chapter: row.get(2)?,
            })
        })?;

        rows.collect::<rusqlite::Result<HashSet<ChapterKey>>>()
            .context("failed to load completed chapters")
    }

    pub fn status_counts(&self, prompt_version: Option<&str>) -> Result<Vec<StatusCount>> {
        let mut statement = self.connection.prepare(
            "
            SELECT status, json_extract(metadata_json, '$.confidence.band') AS band, COUNT(*)
            FROM chapter_explanations
            WHERE (?1 IS NULL OR prompt_version = ?1)
            GROUP BY status, band
            ORDER BY status, band
            ",
        )?;
        let rows = statement.query_map(params![prompt_version], |row| {
            Ok(StatusCount {
                status: row.get(0)?,
                band: row.get(1)?,
                count: row.get(2)?,
            })
        })?;

        rows.collect::<rusqlite::Result<Vec<StatusCount>>>()
            .context("failed to count explanations")
    }
}
