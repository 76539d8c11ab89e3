use super::*;

pub(crate) const COMMAND: &str = "generate";

pub fn run(args: GenerateArgs) -> Result<()> {
    let config = GenerateConfig::from_args(&args)?;

    let chapters = ChapterStore::open(&config.corpus_db_path)?;
    let results = ResultStore::open(&config.results_db_path)?;
    let template = PromptTemplate::load(config.prompt_template_path.as_deref())?;
    let prompt_template_sha256 = sha256_text(template.text());
    let pipeline = ExplanationPipeline::new(
        config.build_client()?,
        template,
        Box::new(CapitalizedTermExtractor::new()?),
        config.settings.clone(),
    )?;

    let stamp = RunStamp::now();
    let run_id = stamp.run_id(COMMAND);
    info!(
        run_id = %run_id,
        mode = config.settings.mode.as_str(),
        primary = %config.primary.model,
        secondary = %config.secondary.model,
        prompt_version = %config.settings.prompt_version,
        force = config.filters.force,
        "generation run started"
    );

    let context = RunContext::load(&results, &pipeline, &config.filters)?;
    let report = process_batch(&chapters, &results, &pipeline, &context)?;

    let mut warnings = Vec::<String>::new();
    if report.counts.selected == 0 {
        warnings.push("no chapters matched the run filters".to_string());
    }

    let status = if report.counts.error == 0 {
        "completed"
    } else {
        "completed_with_errors"
    };
    let manifest = GenerationRunManifest {
        manifest_version: 1,
        run_id,
        status: status.to_string(),
        started_at: stamp.rfc3339(),
        updated_at: now_utc_string(),
        mode: config.settings.mode.as_str().to_string(),
        prompt_version: config.settings.prompt_version.clone(),
        prompt_template_sha256,
        primary: config.primary.manifest(),
        secondary: config.secondary.manifest(),
        corpus_db_path: config.corpus_db_path.display().to_string(),
        results_db_path: config.results_db_path.display().to_string(),
        filters: config.filters.clone(),
        counts: report.counts.clone(),
        chapters: report.chapters,
        warnings,
    };

    let manifest_path = config
        .manifest_path
        .clone()
        .unwrap_or_else(|| config.manifest_dir.join(stamp.manifest_file_name(COMMAND)));
    write_json_pretty(&manifest_path, &manifest)?;

    info!(
        path = %manifest_path.display(),
        selected = report.counts.selected,
        ok = report.counts.ok,
        error = report.counts.error,
        skipped = report.counts.skipped,
        "generation run completed"
    );
    println!(
        "ok={} error={} skipped={}",
        report.counts.ok, report.counts.error, report.counts.skipped
    );

    Ok(())
}
