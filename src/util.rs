use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// A single instant shared by a run's id, its manifest name and its
/// `started_at` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunStamp(DateTime<Utc>);

impl RunStamp {
    pub fn now() -> Self {
        Self(Utc::now())
    }

    pub fn at(ts: DateTime<Utc>) -> Self {
        Self(ts)
    }

    pub fn rfc3339(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    /// `20261014T081500Z`; sorts lexically in time order.
    pub fn compact(&self) -> String {
        self.0.format("%Y%m%dT%H%M%SZ").to_string()
    }

    pub fn run_id(&self, command: &str) -> String {
        format!("{command}-{}", self.compact())
    }

    pub fn manifest_file_name(&self, command: &str) -> String {
        format!("{command}_run_{}.json", self.compact())
    }
}

pub fn now_utc_string() -> String {
    RunStamp::now().rfc3339()
}

/// True for names written by [`RunStamp::manifest_file_name`] for `command`.
pub fn is_run_manifest_name(name: &str, command: &str) -> bool {
    name.strip_prefix(command)
        .and_then(|rest| rest.strip_prefix("_run_"))
        .and_then(|rest| rest.strip_suffix(".json"))
        .is_some_and(|stamp| !stamp.is_empty())
}

pub fn ensure_directory(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .with_context(|| format!("failed to create directory: {}", path.display()))
}

pub fn sha256_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Writes pretty JSON next to `path` and renames it into place, so a
/// reader never sees a half-written manifest.
pub fn write_json_pretty<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        ensure_directory(parent)?;
    }

    let mut data = serde_json::to_vec_pretty(value)
        .with_context(|| format!("failed to serialize json: {}", path.display()))?;
    data.push(b'\n');

    let partial = partial_path(path);
    let mut file = File::create(&partial)
        .with_context(|| format!("failed to create json file: {}", partial.display()))?;
    file.write_all(&data)
        .with_context(|| format!("failed to write json file: {}", partial.display()))?;
    file.sync_all()
        .with_context(|| format!("failed to flush json file: {}", partial.display()))?;
    fs::rename(&partial, path)
        .with_context(|| format!("failed to move json file into {}", path.display()))?;

    Ok(())
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}
