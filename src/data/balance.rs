//! Cross-file normalisation and dataset assembly.
//!
//! Assembly runs in two phases over the ordered run list:
//!
//! ```text
//!   runs ──► count (par) ──► budget = min / fixed / ∞
//!                        barrier
//!        ──► extract ≤ budget (par) ──► concat
//! ```
//!
//! Rayon's indexed `collect` keeps results in run order, so the dataset
//! layout never depends on scheduling.

use std::fmt;
use std::str::FromStr;

use log::{debug, info};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::error::{Result, TraceError};
use super::extract::WindowMode;
use super::model::{Block, Dataset, Run, RunContribution, WindowOutcome};

// ---------------------------------------------------------------------------
// Budget
// ---------------------------------------------------------------------------

/// How many blocks each run may contribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Budget {
    /// Minimum achievable block count over all runs.
    Auto,
    /// Explicit cap per run.
    Fixed(usize),
    /// Every valid block of every run.
    Unbounded,
}

impl Budget {
    /// Default budget for a mode: balanced for RTT, everything for time.
    pub fn default_for(mode: WindowMode) -> Self {
        match mode {
            WindowMode::Rtt => Budget::Auto,
            WindowMode::Time => Budget::Unbounded,
        }
    }

    /// Resolve to a per-run limit given each run's achievable count.
    pub fn resolve(self, achievable: &[usize]) -> usize {
        match self {
            Budget::Auto => shared_block_count(achievable),
            Budget::Fixed(n) => n,
            Budget::Unbounded => usize::MAX,
        }
    }
}

impl fmt::Display for Budget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Budget::Auto => write!(f, "auto"),
            Budget::Fixed(n) => write!(f, "{n}"),
            Budget::Unbounded => write!(f, "unbounded"),
        }
    }
}

impl FromStr for Budget {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" | "min" => Ok(Budget::Auto),
            "none" | "unbounded" | "all" => Ok(Budget::Unbounded),
            other => other.parse::<usize>().map(Budget::Fixed).map_err(|_| {
                format!("budget must be 'auto', 'unbounded' or a block count, got '{s}'")
            }),
        }
    }
}

impl From<Budget> for String {
    fn from(budget: Budget) -> Self {
        budget.to_string()
    }
}

impl TryFrom<String> for Budget {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}

/// Minimum over runs; zero when there are no runs.
pub fn shared_block_count(achievable: &[usize]) -> usize {
    achievable.iter().copied().min().unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Phases
// ---------------------------------------------------------------------------

/// Counting phase: achievable blocks per run, in run order.
pub fn count_blocks(runs: &[Run], mode: WindowMode) -> Result<Vec<usize>> {
    runs.par_iter().map(|run| mode.count(run)).collect()
}

struct RunBlocks {
    blocks: Vec<Block>,
    discarded: usize,
}

fn extract_run(run: &Run, mode: WindowMode, limit: usize) -> Result<RunBlocks> {
    let outcomes = mode.scan(run, limit)?;
    let mut blocks = Vec::with_capacity(outcomes.len());
    let mut discarded = 0;
    for outcome in outcomes {
        match outcome {
            WindowOutcome::Valid(block) => blocks.push(block),
            WindowOutcome::Discarded { start_line, reason } => {
                debug!(
                    "{}: window at line {start_line} discarded, {reason}",
                    run.identifier()
                );
                discarded += 1;
            }
        }
    }
    Ok(RunBlocks { blocks, discarded })
}

/// Extract every run under `mode` and concatenate in run order.
///
/// Fails with [`TraceError::DegenerateWindow`] if any run cannot be windowed
/// and with [`TraceError::EmptyDataset`] if no block survives.
pub fn assemble(runs: &[Run], mode: WindowMode, budget: Budget) -> Result<Dataset> {
    let achievable = count_blocks(runs, mode)?;
    let limit = budget.resolve(&achievable);
    if budget != Budget::Unbounded {
        info!("{} runs, per-run block budget {limit} ({budget})", runs.len());
    }

    let extracted: Vec<RunBlocks> = runs
        .par_iter()
        .map(|run| extract_run(run, mode, limit))
        .collect::<Result<_>>()?;

    let mut dataset = Dataset {
        blocks: Vec::with_capacity(extracted.iter().map(|r| r.blocks.len()).sum()),
        runs: Vec::with_capacity(runs.len()),
    };
    for ((run, count), mut taken) in runs.iter().zip(achievable).zip(extracted) {
        debug!(
            "{}: owd={}ms two_owd={} lines={} achievable={count} emitted={} discarded={}",
            run.identifier(),
            run.metadata.one_way_delay_ms(),
            run.two_owd(),
            run.lines.len(),
            taken.blocks.len(),
            taken.discarded
        );
        dataset.runs.push(RunContribution {
            identifier: run.identifier().to_string(),
            achievable: count,
            emitted: taken.blocks.len(),
        });
        dataset.blocks.append(&mut taken.blocks);
    }

    if dataset.is_empty() {
        return Err(TraceError::EmptyDataset { runs: runs.len() });
    }
    Ok(dataset)
}

/// RTT-mode assembly with a caller-supplied shared block count.
pub fn build_balanced_dataset(runs: &[Run], shared_block_count: usize) -> Result<Dataset> {
    assemble(runs, WindowMode::Rtt, Budget::Fixed(shared_block_count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::line::tests::trace_line;
    use crate::data::model::RunMetadata;

    /// A run with `two_owd = 20` (window of 20 lines) and exactly `blocks` windows.
    fn rtt_run(name: &str, blocks: usize) -> Run {
        let lines = (0..blocks * 20).map(|i| trace_line(77, i as f64)).collect();
        Run::new(RunMetadata::new(name, 10.0), lines)
    }

    #[test]
    fn test_shared_count_is_minimum() {
        assert_eq!(shared_block_count(&[5, 3, 7]), 3);
        assert_eq!(shared_block_count(&[]), 0);
    }

    #[test]
    fn test_auto_budget_balances_runs() {
        let runs = vec![rtt_run("a", 5), rtt_run("b", 3), rtt_run("c", 7)];
        assert_eq!(count_blocks(&runs, WindowMode::Rtt).unwrap(), vec![5, 3, 7]);

        let ds = assemble(&runs, WindowMode::Rtt, Budget::Auto).unwrap();
        assert_eq!(ds.len(), 9);
        let emitted: Vec<usize> = ds.runs.iter().map(|r| r.emitted).collect();
        assert_eq!(emitted, vec![3, 3, 3]);
    }

    #[test]
    fn test_blocks_follow_run_order() {
        let runs = vec![rtt_run("a", 2), rtt_run("b", 2)];
        let ds = build_balanced_dataset(&runs, 2).unwrap();
        let ids: Vec<&str> = ds.iter_with_run().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["a", "a", "b", "b"]);
        // Second block of a run starts at line 20: mean of column 3 over lines 20, 21.
        assert_eq!(ds.blocks[1].rows()[0][1], 22.5);
    }

    #[test]
    fn test_fixed_budget_upper_bound() {
        let runs = vec![rtt_run("a", 1), rtt_run("b", 4)];
        let ds = build_balanced_dataset(&runs, 2).unwrap();
        assert!(ds.len() <= runs.len() * 2);
        assert_eq!(ds.len(), 3);
    }

    #[test]
    fn test_run_without_blocks_stays_in_traversal() {
        let runs = vec![rtt_run("a", 2), rtt_run("empty", 0), rtt_run("c", 2)];
        let ds = assemble(&runs, WindowMode::Rtt, Budget::Fixed(2)).unwrap();
        assert_eq!(ds.runs.len(), 3);
        assert_eq!(ds.runs[1].emitted, 0);
        assert_eq!(ds.len(), 4);
    }

    #[test]
    fn test_empty_dataset_is_an_error() {
        let runs = vec![rtt_run("a", 0), rtt_run("b", 0)];
        let err = assemble(&runs, WindowMode::Rtt, Budget::Auto).unwrap_err();
        assert!(matches!(err, TraceError::EmptyDataset { runs: 2 }));
    }

    #[test]
    fn test_auto_budget_zero_when_one_run_is_empty() {
        let runs = vec![rtt_run("a", 3), rtt_run("b", 0)];
        let err = assemble(&runs, WindowMode::Rtt, Budget::Auto).unwrap_err();
        assert!(matches!(err, TraceError::EmptyDataset { .. }));
    }

    #[test]
    fn test_degenerate_run_fails_assembly() {
        let mut runs = vec![rtt_run("a", 2)];
        runs.push(Run::new(RunMetadata::new("tiny", 3.0), runs[0].lines.clone()));
        let err = assemble(&runs, WindowMode::Rtt, Budget::Auto).unwrap_err();
        assert!(matches!(err, TraceError::DegenerateWindow { ref run, .. } if run == "tiny"));
    }

    #[test]
    fn test_time_mode_unbounded_takes_everything() {
        let runs = vec![rtt_run("a", 1), rtt_run("b", 3)];
        let ds = assemble(&runs, WindowMode::Time, Budget::default_for(WindowMode::Time)).unwrap();
        // 20 and 60 lines → 2 and 6 ten-line blocks.
        assert_eq!(ds.len(), 8);
    }

    #[test]
    fn test_budget_parsing() {
        assert_eq!("auto".parse::<Budget>().unwrap(), Budget::Auto);
        assert_eq!("18".parse::<Budget>().unwrap(), Budget::Fixed(18));
        assert_eq!("unbounded".parse::<Budget>().unwrap(), Budget::Unbounded);
        assert!("many".parse::<Budget>().is_err());
    }
}
