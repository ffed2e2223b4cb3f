//! Index command implementation.

use std::fmt;
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::cli::output::{IndexStats, get_formatter};
use crate::error::IndexError;
use crate::models::{Config, OutputFormat};
use crate::services::{BatchUpserter, VectorStore, open_store};
use crate::sources::{FileOutcome, LocalSource, WalkRules};

/// Where per-file index/skip decisions are reported.
///
/// JSON output keeps stdout for the single result document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileLog {
    Quiet,
    Stdout,
    Stderr,
}

impl FileLog {
    pub fn new(verbose: bool, format: OutputFormat) -> Self {
        match (verbose, format) {
            (false, _) => FileLog::Quiet,
            (true, OutputFormat::Text) => FileLog::Stdout,
            (true, OutputFormat::Json) => FileLog::Stderr,
        }
    }

    fn line(self, args: fmt::Arguments<'_>) {
        match self {
            FileLog::Quiet => {}
            FileLog::Stdout => println!("{args}"),
            FileLog::Stderr => eprintln!("{args}"),
        }
    }
}

pub fn handle_index(
    directory: &Path,
    config: &Config,
    format: OutputFormat,
    verbose: bool,
    dry_run: bool,
) -> Result<()> {
    let formatter = get_formatter(format);
    let rules =
        WalkRules::from_config(&config.indexing).context("invalid indexing configuration")?;
    let source = LocalSource::new(directory.to_path_buf(), rules);
    let log = FileLog::new(verbose, format);

    if dry_run {
        let paths = collect_indexable(&source, log);
        print!("{}", formatter.format_dry_run(&paths));
        return Ok(());
    }

    if format == OutputFormat::Text {
        println!(
            "{}",
            formatter.format_message(&format!("Indexing {} ...", directory.display()))
        );
    }

    let mut store =
        open_store(directory, &config.embedding).context("failed to open vector store")?;

    let pb = if verbose {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {pos} files")
                .context("invalid progress template")?,
        );
        pb
    };

    let result = index_tree(&source, &mut store, config.indexing.batch_size, log, &pb);
    pb.finish_and_clear();
    let mut stats = result.context("indexing failed")?;

    stats.total_documents = store.count().context("failed to count documents")?;
    info!(
        indexed = stats.files_indexed,
        skipped = stats.files_skipped,
        batches = stats.batches,
        duration_ms = stats.duration_ms,
        "indexing finished"
    );

    print!("{}", formatter.format_index_stats(&stats));

    Ok(())
}

/// Walk `source` and upsert every included file into `store`.
///
/// `total_documents` is left for the caller, which owns the store afterwards.
pub fn index_tree<S: VectorStore + ?Sized>(
    source: &LocalSource,
    store: &mut S,
    batch_size: usize,
    log: FileLog,
    pb: &ProgressBar,
) -> Result<IndexStats, IndexError> {
    if !source.root().is_dir() {
        return Err(IndexError::NotADirectory(source.root().display().to_string()));
    }

    let start_time = Instant::now();
    let mut stats = IndexStats {
        collection: store.collection().to_string(),
        directory: source.root().display().to_string(),
        ..Default::default()
    };

    let mut upserter = BatchUpserter::new(store, batch_size);

    for outcome in source.walk() {
        pb.inc(1);
        match outcome {
            FileOutcome::Included(record) => {
                log.line(format_args!("  index {}", record.path()));
                upserter.push(record)?;
            }
            FileOutcome::Skipped { path, reason } => {
                log.line(format_args!("  skip  {} ({})", path, reason));
                stats.files_skipped += 1;
            }
        }
    }

    let summary = upserter.finish()?;
    stats.files_indexed = summary.records;
    stats.batches = summary.batches;
    stats.duration_ms = start_time.elapsed().as_millis() as u64;
    Ok(stats)
}

fn collect_indexable(source: &LocalSource, log: FileLog) -> Vec<String> {
    source
        .walk()
        .filter_map(|outcome| match outcome {
            FileOutcome::Included(record) => Some(record.metadata.path),
            FileOutcome::Skipped { path, reason } => {
                log.line(format_args!("  skip  {} ({})", path, reason));
                None
            }
        })
        .collect()
}
