use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result, bail};
use rusqlite::{Connection, OpenFlags, params};

use crate::model::{
    ChapterKey, ChapterPayload, CrossLink, Entity, ExplanationRecord, RunFilters, Verse,
};
use crate::util::{ensure_directory, now_utc_string};

mod chapters;
mod results;
mod schema;

pub use chapters::ChapterStore;
pub use results::{ResultStore, StatusCount};
#[cfg(test)]
pub(crate) use schema::ensure_corpus_schema;
use schema::{configure_connection, ensure_results_schema};
