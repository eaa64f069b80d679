//! Block extraction: fixed line-count windows and delay-scaled averaging windows.
//!
//! Both strategies share the same admission rule: a window exists only if
//! every line it covers passes [`line::observe`]. A rejected line discards its
//! whole window and scanning moves on to the next window position.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::error::TraceError;
use super::line::{self, Observation};
use super::model::{
    scaled_delay, Block, DiscardReason, FeatureVector, Run, WindowOutcome, BLOCK_ROWS, FEATURES,
    SAMPLE_INTERVAL_MS,
};

/// RTT windowing was asked for with a delay too small to fill one sample.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("two_owd = {two_owd} ms yields a sub-group width below one line")]
pub struct DegenerateWindow {
    pub two_owd: f64,
}

impl DegenerateWindow {
    pub fn for_run(self, run: &str) -> TraceError {
        TraceError::DegenerateWindow {
            run: run.to_string(),
            two_owd: self.two_owd,
        }
    }
}

fn feature_row(scaled: f32, obs: &Observation) -> FeatureVector {
    let mut row = [scaled; FEATURES];
    for (slot, &value) in row[1..].iter_mut().zip(obs.iter()) {
        *slot = value as f32;
    }
    row
}

fn outcome(start_line: usize, built: Result<Block, DiscardReason>) -> WindowOutcome {
    match built {
        Ok(block) => WindowOutcome::Valid(block),
        Err(reason) => WindowOutcome::Discarded { start_line, reason },
    }
}

fn all_admitted<S: AsRef<str>>(lines: &[S]) -> bool {
    lines.iter().all(|l| line::observe(l.as_ref()).is_ok())
}

// ---------------------------------------------------------------------------
// Time-based: 10 consecutive lines → 10 rows
// ---------------------------------------------------------------------------

fn time_window<S: AsRef<str>>(
    window: &[S],
    start: usize,
    scaled: f32,
) -> Result<Block, DiscardReason> {
    let mut rows = [[0.0; FEATURES]; BLOCK_ROWS];
    for (i, (row, text)) in rows.iter_mut().zip(window).enumerate() {
        let obs = line::observe(text.as_ref()).map_err(|e| e.at_line(start + i))?;
        *row = feature_row(scaled, &obs);
    }
    Ok(Block::new(rows))
}

/// Visit every complete 10-line window in file order.
pub fn scan_time_windows<S: AsRef<str>>(lines: &[S], two_owd: f64) -> Vec<WindowOutcome> {
    let scaled = scaled_delay(two_owd);
    lines
        .chunks_exact(BLOCK_ROWS)
        .enumerate()
        .map(|(w, window)| {
            let start = w * BLOCK_ROWS;
            outcome(start, time_window(window, start, scaled))
        })
        .collect()
}

/// Non-overlapping 10-line windows; the trailing remainder is dropped.
pub fn extract_time_blocks<S: AsRef<str>>(lines: &[S], two_owd: f64) -> Vec<Block> {
    scan_time_windows(lines, two_owd)
        .into_iter()
        .filter_map(WindowOutcome::into_block)
        .collect()
}

/// Number of blocks [`extract_time_blocks`] would return, without building them.
pub fn count_time_blocks<S: AsRef<str>>(lines: &[S]) -> usize {
    lines
        .chunks_exact(BLOCK_ROWS)
        .filter(|window| all_admitted(window))
        .count()
}

// ---------------------------------------------------------------------------
// RTT-based: 10 sub-groups of `sub_width` lines → 10 averaged rows
// ---------------------------------------------------------------------------

/// Window geometry derived from a run's round-trip interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RttGeometry {
    /// Lines averaged into one row: `floor(two_owd / 10)`.
    pub sub_width: usize,
    /// Lines consumed per block: `10 × sub_width`.
    pub window_width: usize,
}

impl RttGeometry {
    pub fn new(two_owd: f64) -> Result<Self, DegenerateWindow> {
        let width = (two_owd / SAMPLE_INTERVAL_MS).floor();
        // Also rejects NaN.
        if !(width >= 1.0) {
            return Err(DegenerateWindow { two_owd });
        }
        let sub_width = width as usize;
        Ok(Self {
            sub_width,
            window_width: sub_width.saturating_mul(BLOCK_ROWS),
        })
    }
}

fn rtt_window<S: AsRef<str>>(
    window: &[S],
    start: usize,
    sub_width: usize,
    scaled: f32,
) -> Result<Block, DiscardReason> {
    let mut rows = [[0.0; FEATURES]; BLOCK_ROWS];
    for (g, (row, group)) in rows.iter_mut().zip(window.chunks_exact(sub_width)).enumerate() {
        let mut sums = [0.0f64; 5];
        for (i, text) in group.iter().enumerate() {
            let obs = line::observe(text.as_ref())
                .map_err(|e| e.at_line(start + g * sub_width + i))?;
            for (sum, value) in sums.iter_mut().zip(obs) {
                *sum += value;
            }
        }
        let means = sums.map(|s| s / sub_width as f64);
        *row = feature_row(scaled, &means);
    }
    Ok(Block::new(rows))
}

/// Visit RTT windows left to right until `limit` blocks are valid or no
/// complete window remains.
pub fn scan_rtt_windows<S: AsRef<str>>(
    lines: &[S],
    two_owd: f64,
    limit: usize,
) -> Result<Vec<WindowOutcome>, DegenerateWindow> {
    let geometry = RttGeometry::new(two_owd)?;
    let scaled = scaled_delay(two_owd);

    let mut outcomes = Vec::new();
    let mut emitted = 0;
    for (w, window) in lines.chunks_exact(geometry.window_width).enumerate() {
        if emitted >= limit {
            break;
        }
        let start = w * geometry.window_width;
        let visited = outcome(start, rtt_window(window, start, geometry.sub_width, scaled));
        if visited.is_valid() {
            emitted += 1;
        }
        outcomes.push(visited);
    }
    Ok(outcomes)
}

/// At most `limit` delay-scaled blocks, in file order.
pub fn extract_rtt_blocks<S: AsRef<str>>(
    lines: &[S],
    two_owd: f64,
    limit: usize,
) -> Result<Vec<Block>, DegenerateWindow> {
    Ok(scan_rtt_windows(lines, two_owd, limit)?
        .into_iter()
        .filter_map(WindowOutcome::into_block)
        .collect())
}

/// Number of blocks an unlimited [`extract_rtt_blocks`] would return. Applies
/// the same admission checks but builds no rows.
pub fn count_rtt_blocks<S: AsRef<str>>(
    lines: &[S],
    two_owd: f64,
) -> Result<usize, DegenerateWindow> {
    let geometry = RttGeometry::new(two_owd)?;
    Ok(lines
        .chunks_exact(geometry.window_width)
        .filter(|window| all_admitted(window))
        .count())
}

// ---------------------------------------------------------------------------
// Mode dispatch over a loaded run
// ---------------------------------------------------------------------------

/// Which windowing strategy turns lines into blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum WindowMode {
    /// Ten consecutive lines per block.
    Time,
    /// Ten averaged sub-groups of `floor(two_owd / 10)` lines per block.
    #[default]
    Rtt,
}

impl WindowMode {
    /// Valid blocks the run can produce with no cap.
    pub fn count(self, run: &Run) -> Result<usize, TraceError> {
        match self {
            WindowMode::Time => Ok(count_time_blocks(&run.lines)),
            WindowMode::Rtt => count_rtt_blocks(&run.lines, run.two_owd())
                .map_err(|e| e.for_run(run.identifier())),
        }
    }

    /// Window outcomes for the run, stopping once `limit` blocks are valid.
    pub fn scan(self, run: &Run, limit: usize) -> Result<Vec<WindowOutcome>, TraceError> {
        match self {
            WindowMode::Time => {
                let mut emitted = 0;
                Ok(scan_time_windows(&run.lines, run.two_owd())
                    .into_iter()
                    .take_while(|o| {
                        let open = emitted < limit;
                        if open && o.is_valid() {
                            emitted += 1;
                        }
                        open
                    })
                    .collect())
            }
            WindowMode::Rtt => scan_rtt_windows(&run.lines, run.two_owd(), limit)
                .map_err(|e| e.for_run(run.identifier())),
        }
    }
}
