/// Data layer: trace files in, `(N, 10, 6)` tensor out.
///
/// Architecture:
/// ```text
///   *.txt traces (sorted by name)
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  read file, metadata::parse_delay → Run
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ extract   │  time / rtt windows, line::observe per line
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ balance   │  count → shared budget → capped extraction → Dataset
///   └──────────┘
///        │
///        ▼
///   writer (.parquet / .json)   report (percentiles)
/// ```

pub mod balance;
pub mod error;
pub mod extract;
pub mod line;
pub mod loader;
pub mod metadata;
pub mod model;
pub mod report;
pub mod writer;
