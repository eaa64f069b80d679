use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{info, warn};
use rayon::prelude::*;

use super::error::TraceError;
use super::metadata::run_metadata;
use super::model::Run;

// ---------------------------------------------------------------------------
// Directory listing
// ---------------------------------------------------------------------------

/// Trace files with the given extension, sorted by file name so run order is
/// reproducible regardless of filesystem enumeration order.
pub fn list_traces(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("reading trace directory '{}'", dir.display()))?
    {
        let path = entry?.path();
        if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some(extension) {
            paths.push(path);
        }
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(paths)
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// A trace file whose name did not yield a delay; it contributes nothing.
#[derive(Debug)]
pub struct SkippedRun {
    pub path: PathBuf,
    pub error: TraceError,
}

/// Runs that loaded, in sorted order, plus the ones excluded by their name.
#[derive(Debug, Default)]
pub struct LoadedRuns {
    pub runs: Vec<Run>,
    pub skipped: Vec<SkippedRun>,
}

fn read_lines(path: &Path) -> Result<Vec<String>, TraceError> {
    let bytes = std::fs::read(path).map_err(|source| TraceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(String::from_utf8_lossy(&bytes).lines().map(str::to_string).collect())
}

enum Loaded {
    Run(Run),
    Skipped(SkippedRun),
}

fn load_one(path: &Path, delay_token: usize) -> Result<Loaded, TraceError> {
    let metadata = match run_metadata(path, delay_token) {
        Ok(m) => m,
        Err(error) => {
            return Ok(Loaded::Skipped(SkippedRun {
                path: path.to_path_buf(),
                error,
            }))
        }
    };
    let lines = read_lines(path)?;
    Ok(Loaded::Run(Run::new(metadata, lines)))
}

/// Load the given trace files in order. Filename failures are logged and
/// skipped; I/O failures abort.
pub fn load_runs(paths: &[PathBuf], delay_token: usize) -> Result<LoadedRuns> {
    let loaded: Vec<Loaded> = paths
        .par_iter()
        .map(|p| load_one(p, delay_token))
        .collect::<Result<_, _>>()
        .context("loading trace files")?;

    let mut out = LoadedRuns::default();
    for item in loaded {
        match item {
            Loaded::Run(run) => out.runs.push(run),
            Loaded::Skipped(skipped) => {
                warn!("Skipping '{}': {}", skipped.path.display(), skipped.error);
                out.skipped.push(skipped);
            }
        }
    }
    info!(
        "Loaded {} runs ({} skipped by filename)",
        out.runs.len(),
        out.skipped.len()
    );
    Ok(out)
}

/// [`list_traces`] followed by [`load_runs`].
pub fn load_dir(dir: &Path, extension: &str, delay_token: usize) -> Result<LoadedRuns> {
    let paths = list_traces(dir, extension)?;
    if paths.is_empty() {
        warn!("No .{extension} files in '{}'", dir.display());
    }
    load_runs(&paths, delay_token)
}
