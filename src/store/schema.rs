use super::*;

pub(super) fn configure_connection(connection: &Connection) -> Result<()> {
    connection
        .pragma_update(None, "journal_mode", "WAL")
        .context("failed to set journal_mode=WAL")?;
    connection
        .pragma_update(None, "synchronous", "NORMAL")
        .context("failed to set synchronous=NORMAL")?;
    Ok(())
}

/// Layout the chapter store is expected to have. The generator only reads it.
#[cfg(test)]
pub(crate) fn ensure_corpus_schema(connection: &Connection) -> Result<()> {
    connection
        .execute_batch(
            "
        CREATE TABLE IF NOT EXISTS verses (
          corpus TEXT NOT NULL,
          unit TEXT NOT NULL,
          chapter INTEGER NOT NULL,
          verse INTEGER NOT NULL,
          reference TEXT NOT NULL,
          text TEXT NOT NULL DEFAULT '',
          PRIMARY KEY(corpus, unit, chapter, verse)
        );

        CREATE TABLE IF NOT EXISTS entities (
          corpus TEXT NOT NULL,
          unit TEXT NOT NULL,
          chapter INTEGER NOT NULL,
          name TEXT NOT NULL,
          entity_type TEXT NOT NULL DEFAULT 'unknown',
          aliases_json TEXT NOT NULL DEFAULT '[]',
          mention_count INTEGER NOT NULL DEFAULT 0,
          PRIMARY KEY(corpus, unit, chapter, name)
        );

        CREATE TABLE IF NOT EXISTS cross_links (
          corpus TEXT NOT NULL,
          unit TEXT NOT NULL,
          chapter INTEGER NOT NULL,
          target_reference TEXT NOT NULL,
          relation TEXT NOT NULL,
          PRIMARY KEY(corpus, unit, chapter, target_reference, relation)
        );
        ",
        )
        .context("failed to create chapter store schema")?;
    Ok(())
}

pub(super) fn ensure_results_schema(connection: &Connection) -> Result<()> {
    connection
        .execute_batch(
            "
        CREATE TABLE IF NOT EXISTS chapter_explanations (
          corpus TEXT NOT NULL,
          unit TEXT NOT NULL,
          chapter INTEGER NOT NULL,
          model TEXT NOT NULL,
          prompt_version TEXT NOT NULL,
          status TEXT NOT NULL,
          explanation TEXT,
          metadata_json TEXT NOT NULL,
          error TEXT,
          raw_output TEXT,
          duration_ms INTEGER NOT NULL DEFAULT 0,
          updated_at TEXT NOT NULL,
          PRIMARY KEY(corpus, unit, chapter, model, prompt_version)
        );

        CREATE INDEX IF NOT EXISTS idx_chapter_explanations_status
          ON chapter_explanations(status, prompt_version);
        ",
        )
        .context("failed to create result store schema")?;
    Ok(())
}
