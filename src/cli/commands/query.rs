use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};

use crate::cli::output::get_formatter;
use crate::error::QueryError;
use crate::models::{Config, OutputFormat, QueryResult, QueryResults};
use crate::services::{VectorStore, open_store};

pub fn handle_query(
    directory: &Path,
    config: &Config,
    query: &str,
    num_results: Option<u32>,
    format: OutputFormat,
    verbose: bool,
) -> Result<()> {
    let query = query.trim();
    if query.is_empty() {
        return Err(QueryError::InvalidQuery("query cannot be empty".to_string()).into());
    }

    let formatter = get_formatter(format);
    let limit = num_results.unwrap_or(config.search.default_limit);

    if verbose {
        eprintln!("Query: \"{query}\"");
        eprintln!("  Limit: {limit}");
    }

    let store = open_store(directory, &config.embedding).context("failed to open vector store")?;

    let start_time = Instant::now();
    let results = run_query(&store, query, limit as usize)?;
    let duration_ms = start_time.elapsed().as_millis() as u64;

    if verbose {
        eprintln!("  Search: {duration_ms}ms");
        eprintln!();
    }

    let results = QueryResults::new(query.to_string(), results, duration_ms);
    print!("{}", formatter.format_query_results(&results));

    Ok(())
}

/// Ask `store` for the `limit` nearest records, refusing an empty collection.
pub fn run_query<S: VectorStore + ?Sized>(
    store: &S,
    query: &str,
    limit: usize,
) -> Result<Vec<QueryResult>, QueryError> {
    if store.count()? == 0 {
        return Err(QueryError::EmptyCollection);
    }

    let matches = store.query(query, limit)?;
    Ok(matches
        .into_iter()
        .map(|m| QueryResult::from_distance(m.id, m.metadata.path, m.distance))
        .collect())
}
