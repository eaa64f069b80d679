use std::fmt;

use serde::Serialize;

// ---------------------------------------------------------------------------
// Shape constants
// ---------------------------------------------------------------------------

/// Rows per block (and lines per time-based window).
pub const BLOCK_ROWS: usize = 10;

/// Features per row: scaled delay followed by the five projected columns.
pub const FEATURES: usize = 6;

/// Minimum number of whitespace-delimited fields a usable trace line carries.
pub const MIN_FIELDS: usize = 77;

/// 0-indexed positions of the projected columns (1-indexed 3, 4, 8, 68, 77).
pub const SELECTED_COLUMNS: [usize; 5] = [2, 3, 7, 67, 76];

/// Sampling interval of one trace line, in milliseconds.
pub const SAMPLE_INTERVAL_MS: f64 = 10.0;

/// Feature names in row order, used by the writers and the report.
pub const FEATURE_NAMES: [&str; FEATURES] = [
    "scaled_delay",
    "feature_a",
    "feature_b",
    "feature_c",
    "feature_d",
    "feature_e",
];

// ---------------------------------------------------------------------------
// RunMetadata
// ---------------------------------------------------------------------------

/// Per-run metadata recovered from the trace filename. Immutable once parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct RunMetadata {
    identifier: String,
    one_way_delay_ms: f64,
}

impl RunMetadata {
    pub fn new(identifier: impl Into<String>, one_way_delay_ms: f64) -> Self {
        Self {
            identifier: identifier.into(),
            one_way_delay_ms,
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn one_way_delay_ms(&self) -> f64 {
        self.one_way_delay_ms
    }

    /// Round-trip interval, `2 × OWD`.
    pub fn two_owd(&self) -> f64 {
        2.0 * self.one_way_delay_ms
    }
}

/// `two_owd / 100`, the first feature of every row of a run.
pub fn scaled_delay(two_owd: f64) -> f32 {
    (two_owd / 100.0) as f32
}

// ---------------------------------------------------------------------------
// Run – one trace file held in memory
// ---------------------------------------------------------------------------

/// A loaded trace file: its metadata plus every raw line.
#[derive(Debug, Clone)]
pub struct Run {
    pub metadata: RunMetadata,
    pub lines: Vec<String>,
}

impl Run {
    pub fn new(metadata: RunMetadata, lines: Vec<String>) -> Self {
        Self { metadata, lines }
    }

    pub fn identifier(&self) -> &str {
        self.metadata.identifier()
    }

    pub fn two_owd(&self) -> f64 {
        self.metadata.two_owd()
    }
}

// ---------------------------------------------------------------------------
// Block
// ---------------------------------------------------------------------------

/// `[scaled_delay, feature_a, feature_b, feature_c, feature_d, feature_e]`.
pub type FeatureVector = [f32; FEATURES];

/// Ten feature vectors; the atomic training example.
///
/// The only constructor takes a full array, so a partially filled block
/// cannot be represented.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Block {
    rows: [FeatureVector; BLOCK_ROWS],
}

impl Block {
    pub fn new(rows: [FeatureVector; BLOCK_ROWS]) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[FeatureVector; BLOCK_ROWS] {
        &self.rows
    }
}

// ---------------------------------------------------------------------------
// Window outcomes
// ---------------------------------------------------------------------------

/// Why a window produced no block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// Line (0-indexed within the run) has fewer than [`MIN_FIELDS`] fields.
    TooFewFields { line: usize, found: usize },
    /// A projected column of the line is not a float literal.
    NonNumericField { line: usize, column: usize },
}

impl fmt::Display for DiscardReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscardReason::TooFewFields { line, found } => {
                write!(f, "line {line} has {found} fields (need {MIN_FIELDS})")
            }
            DiscardReason::NonNumericField { line, column } => {
                write!(f, "line {line} column {} is not numeric", column + 1)
            }
        }
    }
}

/// Result of visiting one window position.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowOutcome {
    Valid(Block),
    Discarded {
        start_line: usize,
        reason: DiscardReason,
    },
}

impl WindowOutcome {
    pub fn into_block(self) -> Option<Block> {
        match self {
            WindowOutcome::Valid(block) => Some(block),
            WindowOutcome::Discarded { .. } => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, WindowOutcome::Valid(_))
    }
}

// ---------------------------------------------------------------------------
// Dataset
// ---------------------------------------------------------------------------

/// How many blocks a run contributed to a dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunContribution {
    pub identifier: String,
    /// Valid blocks the run can produce without a cap.
    pub achievable: usize,
    /// Blocks actually taken into the dataset.
    pub emitted: usize,
}

/// All runs' blocks in run-traversal order; a `(N, 10, 6)` f32 tensor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub blocks: Vec<Block>,
    /// One entry per run in traversal order; `emitted` values sum to `blocks.len()`.
    pub runs: Vec<RunContribution>,
}

impl Dataset {
    /// Number of blocks `N`.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn shape(&self) -> [usize; 3] {
        [self.blocks.len(), BLOCK_ROWS, FEATURES]
    }

    /// Row-major flattening of the tensor, `N × 10 × 6` values.
    pub fn to_flat(&self) -> Vec<f32> {
        self.blocks
            .iter()
            .flat_map(|b| b.rows().iter().flatten().copied())
            .collect()
    }

    /// Every value of one feature across all rows of all blocks.
    pub fn feature_column(&self, feature: usize) -> Vec<f32> {
        self.blocks
            .iter()
            .flat_map(|b| b.rows().iter().map(move |row| row[feature]))
            .collect()
    }

    /// Blocks paired with the identifier of the run they came from.
    pub fn iter_with_run(&self) -> impl Iterator<Item = (&str, &Block)> + '_ {
        self.runs
            .iter()
            .flat_map(|r| std::iter::repeat(r.identifier.as_str()).take(r.emitted))
            .zip(self.blocks.iter())
    }
}
