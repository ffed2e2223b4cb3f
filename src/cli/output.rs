use std::fmt::Write as FmtWrite;

use crate::models::{OutputFormat, QueryResults};

pub trait Formatter {
    fn format_query_results(&self, results: &QueryResults) -> String;
    fn format_index_stats(&self, stats: &IndexStats) -> String;
    fn format_dry_run(&self, paths: &[String]) -> String;
    fn format_message(&self, message: &str) -> String;
}

#[derive(Debug, Clone, Default)]
pub struct IndexStats {
    pub collection: String,
    pub directory: String,
    pub files_indexed: u64,
    pub files_skipped: u64,
    pub batches: u64,
    pub total_documents: u64,
    pub duration_ms: u64,
}

pub struct TextFormatter;

impl Formatter for TextFormatter {
    fn format_query_results(&self, results: &QueryResults) -> String {
        let mut output = String::new();
        for result in &results.results {
            let _ = writeln!(output, "{:+.4}  {}", result.score, result.path);
        }
        output
    }

    fn format_index_stats(&self, stats: &IndexStats) -> String {
        format!(
            "Collection '{}' now contains {} documents.\n",
            stats.collection, stats.total_documents
        )
    }

    fn format_dry_run(&self, paths: &[String]) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "Dry run: would index {} files", paths.len());
        for path in paths {
            let _ = writeln!(output, "  {}", path);
        }
        output
    }

    fn format_message(&self, message: &str) -> String {
        message.to_string()
    }
}

pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    fn render(&self, value: &serde_json::Value) -> String {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        let mut output =
            rendered.unwrap_or_else(|e| serde_json::json!({"error": e.to_string()}).to_string());
        output.push('\n');
        output
    }
}

impl Formatter for JsonFormatter {
    fn format_query_results(&self, results: &QueryResults) -> String {
        match serde_json::to_value(results) {
            Ok(value) => self.render(&value),
            Err(e) => self.render(&serde_json::json!({"error": e.to_string()})),
        }
    }

    fn format_index_stats(&self, stats: &IndexStats) -> String {
        let json = serde_json::json!({
            "collection": stats.collection,
            "directory": stats.directory,
            "files_indexed": stats.files_indexed,
            "files_skipped": stats.files_skipped,
            "batches": stats.batches,
            "total_documents": stats.total_documents,
            "duration_ms": stats.duration_ms,
        });
        self.render(&json)
    }

    fn format_dry_run(&self, paths: &[String]) -> String {
        self.render(&serde_json::json!({"dry_run": true, "files": paths}))
    }

    fn format_message(&self, message: &str) -> String {
        serde_json::json!({"message": message}).to_string()
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter),
        OutputFormat::Json => Box::new(JsonFormatter::new(true)),
    }
}
