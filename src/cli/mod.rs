//! CLI module for dirsearch.

pub mod commands;
pub mod output;

use std::path::PathBuf;

use clap::{ArgGroup, Parser};

use crate::models::{CONFIG_ENV_VAR, OutputFormat};

/// Index files into a local vector store and query them by semantic similarity.
#[derive(Debug, Parser)]
#[command(name = "dirsearch")]
#[command(author, version, about, long_about = None)]
#[command(group(ArgGroup::new("mode").required(true).args(["index", "query"])))]
pub struct Cli {
    /// Target directory to index / query
    #[arg(value_parser = parse_directory)]
    pub directory: PathBuf,

    /// Walk the directory and add/update every text file in the collection
    #[arg(long)]
    pub index: bool,

    /// Semantic query; returns the most related file paths
    #[arg(long, value_name = "TEXT", value_parser = parse_query)]
    pub query: Option<String>,

    #[arg(
        long,
        short = 'n',
        value_parser = clap::value_parser!(u32).range(1..),
        help = "Number of results to return (default: 5)"
    )]
    pub num_results: Option<u32>,

    #[arg(long, short = 'v', help = "Print each file as it is processed")]
    pub verbose: bool,

    #[arg(long, short = 'f', help = "Output format: text or json")]
    pub format: Option<OutputFormat>,

    #[arg(
        long,
        requires = "index",
        help = "List the files that would be indexed without touching the store"
    )]
    pub dry_run: bool,

    #[arg(long, env = CONFIG_ENV_VAR, help = "Path to a config.toml")]
    pub config: Option<PathBuf>,
}

/// What a single invocation does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Index,
    Query(String),
}

impl Cli {
    pub fn mode(&self) -> Mode {
        match &self.query {
            Some(query) if !self.index => Mode::Query(query.clone()),
            _ => Mode::Index,
        }
    }
}

fn parse_directory(value: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(value);
    if !path.is_dir() {
        return Err(format!("Not a directory: {}", value));
    }
    path.canonicalize()
        .map_err(|e| format!("cannot resolve {}: {}", value, e))
}

fn parse_query(value: &str) -> Result<String, String> {
    if value.trim().is_empty() {
        return Err("query cannot be empty".to_string());
    }
    Ok(value.to_string())
}
