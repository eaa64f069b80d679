//! Turn congestion-control trace files into fixed-shape training tensors.

pub mod config;
pub mod data;

pub use data::balance::{assemble, build_balanced_dataset, Budget};
pub use data::error::TraceError;
pub use data::extract::{
    count_rtt_blocks, count_time_blocks, extract_rtt_blocks, extract_time_blocks, WindowMode,
};
pub use data::metadata::parse_delay;
pub use data::model::{Block, Dataset, Run, RunMetadata};
