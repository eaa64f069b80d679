use std::path::PathBuf;

use thiserror::Error;

/// Run-level and dataset-level failures reported to the caller.
///
/// Per-line and per-window problems never show up here; they only turn a
/// window into [`WindowOutcome::Discarded`](super::model::WindowOutcome).
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("cannot parse one-way delay from filename '{filename}': {reason}")]
    FilenameFormat { filename: String, reason: String },

    #[error("run '{run}': two_owd = {two_owd} ms spans less than one 10 ms sample per sub-group")]
    DegenerateWindow { run: String, two_owd: f64 },

    #[error("no block could be extracted from {runs} run(s)")]
    EmptyDataset { runs: usize },

    #[error("I/O error on '{}'", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T, E = TraceError> = std::result::Result<T, E>;
