use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::commands::generate;
use crate::store::ResultStore;
use crate::util::is_run_manifest_name;

pub fn run(args: StatusArgs) -> Result<()> {
    let manifest_dir = args.cache_root.join("manifests");
    let db_path = args
        .results_db_path
        .clone()
        .unwrap_or_else(|| args.cache_root.join("explanations.sqlite"));

    info!(cache_root = %args.cache_root.display(), "status requested");

    match latest_run_manifest(&manifest_dir)? {
        Some(path) => {
            let raw = fs::read(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let manifest: serde_json::Value = serde_json::from_slice(&raw)
                .with_context(|| format!("failed to parse {}", path.display()))?;
            let counts = &manifest["counts"];

            info!(
                path = %path.display(),
                run_id = manifest["run_id"].as_str().unwrap_or_default(),
                status = manifest["status"].as_str().unwrap_or_default(),
                mode = manifest["mode"].as_str().unwrap_or_default(),
                updated_at = manifest["updated_at"].as_str().unwrap_or_default(),
                ok = counts["ok"].as_u64().unwrap_or(0),
                error = counts["error"].as_u64().unwrap_or(0),
                skipped = counts["skipped"].as_u64().unwrap_or(0),
                "loaded latest generation manifest"
            );
        }
        None => warn!(path = %manifest_dir.display(), "no generation manifest found"),
    }

    if !db_path.exists() {
        warn!(path = %db_path.display(), "result database missing");
        return Ok(());
    }

    let store = ResultStore::open(&db_path)?;
    let counts = store.status_counts(args.prompt_version.as_deref())?;
    let total = counts.iter().map(|count| count.count).sum::<i64>();

    for count in &counts {
        info!(
            status = %count.status,
            band = count.band.as_deref().unwrap_or("none"),
            count = count.count,
            "explanations"
        );
    }
    info!(
        path = %db_path.display(),
        prompt_version = args.prompt_version.as_deref().unwrap_or("any"),
        total,
        "result database status"
    );

    Ok(())
}

/// Manifest names embed a compact UTC stamp, so the lexically greatest is
/// the newest.
fn latest_run_manifest(manifest_dir: &Path) -> Result<Option<PathBuf>> {
    if !manifest_dir.is_dir() {
        return Ok(None);
    }

    let mut latest: Option<PathBuf> = None;
    for entry in fs::read_dir(manifest_dir)
        .with_context(|| format!("failed to read {}", manifest_dir.display()))?
    {
        let path = entry?.path();
        let is_run_manifest = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| is_run_manifest_name(name, generate::COMMAND));
        if is_run_manifest && latest.as_ref().is_none_or(|current| path > *current) {
            latest = Some(path);
        }
    }
    Ok(latest)
}
