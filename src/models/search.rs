//! Query-related models.

use serde::{Deserialize, Serialize};

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// Machine-parseable JSON format
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("unknown output format: {}", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// A single ranked match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Record ID
    pub id: String,

    /// Path relative to the indexed root
    pub path: String,

    /// Cosine similarity, `1 - distance`
    pub score: f32,

    /// Cosine distance reported by the store
    pub distance: f32,
}

impl QueryResult {
    pub fn from_distance(id: String, path: String, distance: f32) -> Self {
        Self {
            id,
            path,
            score: 1.0 - distance,
            distance,
        }
    }
}

/// Ranked matches for one query, in store order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResults {
    /// Query that was executed
    pub query: String,

    /// Matching results
    pub results: Vec<QueryResult>,

    /// Number of results returned
    pub total: u64,

    /// Query execution time in milliseconds
    pub duration_ms: u64,
}

impl QueryResults {
    pub fn new(query: String, results: Vec<QueryResult>, duration_ms: u64) -> Self {
        let total = results.len() as u64;
        Self {
            query,
            results,
            total,
            duration_ms,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
