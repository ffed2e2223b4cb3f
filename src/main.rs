use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use dirsearch::cli::commands::{handle_index, handle_query};
use dirsearch::cli::{Cli, Mode};
use dirsearch::models::Config;

/// Detect ONNX Runtime library path and set ORT_DYLIB_PATH if not already set.
/// Must be called before any ort code runs.
fn detect_and_set_ort_path() {
    if std::env::var("ORT_DYLIB_PATH")
        .map(|p| Path::new(&p).exists())
        .unwrap_or(false)
    {
        return;
    }

    let home = std::env::var("HOME").unwrap_or_default();

    let candidates: Vec<String> = if cfg!(target_os = "macos") {
        vec![
            format!("{home}/.local/lib/dirsearch/libonnxruntime.dylib"),
            "/opt/homebrew/opt/onnxruntime/lib/libonnxruntime.dylib".into(),
            "/usr/local/opt/onnxruntime/lib/libonnxruntime.dylib".into(),
        ]
    } else if cfg!(target_os = "linux") {
        vec![
            format!("{home}/.local/lib/dirsearch/libonnxruntime.so"),
            "/usr/lib/libonnxruntime.so".into(),
            "/usr/local/lib/libonnxruntime.so".into(),
            "/usr/lib/x86_64-linux-gnu/libonnxruntime.so".into(),
            "/usr/lib/aarch64-linux-gnu/libonnxruntime.so".into(),
        ]
    } else {
        Vec::new()
    };

    if let Some(path) = candidates.into_iter().find(|p| Path::new(p).exists()) {
        // SAFETY: Called at program start before any threads are spawned.
        unsafe {
            std::env::set_var("ORT_DYLIB_PATH", path);
        }
    }
}

/// Diagnostics go to stderr and stay quiet unless RUST_LOG asks otherwise.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    detect_and_set_ort_path();
    init_tracing();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load_from(cli.config.as_deref()).context("failed to load config")?;
    let format = cli.format.unwrap_or(config.search.default_format);

    match cli.mode() {
        Mode::Index => handle_index(&cli.directory, &config, format, cli.verbose, cli.dry_run),
        Mode::Query(query) => handle_query(
            &cli.directory,
            &config,
            &query,
            cli.num_results,
            format,
            cli.verbose,
        ),
    }
}
