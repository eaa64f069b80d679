use std::path::Path;

use super::error::{Result, TraceError};
use super::model::RunMetadata;

/// Token position of the one-way delay in `cc_link_OWD_bw_seed_kind.txt`.
pub const DEFAULT_DELAY_TOKEN: usize = 2;

/// Parse the one-way delay (ms) from a trace filename, e.g.
/// `hybla_wired96-4x-u-7s-plus-10_80_640_0_cwnd.txt` → `80.0`.
pub fn parse_delay(filename: &str) -> Result<f64> {
    parse_delay_at(filename, DEFAULT_DELAY_TOKEN)
}

/// Same as [`parse_delay`] with an explicit `_`-token index.
pub fn parse_delay_at(filename: &str, index: usize) -> Result<f64> {
    let token = filename.split('_').nth(index).ok_or_else(|| TraceError::FilenameFormat {
        filename: filename.to_string(),
        reason: format!("expected at least {} '_'-separated tokens", index + 1),
    })?;

    token.parse::<f64>().map_err(|_| TraceError::FilenameFormat {
        filename: filename.to_string(),
        reason: format!("token {index} ('{token}') is not a number"),
    })
}

/// Build [`RunMetadata`] for a trace file, identified by its file name.
pub fn run_metadata(path: &Path, delay_token: usize) -> Result<RunMetadata> {
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| TraceError::FilenameFormat {
            filename: path.display().to_string(),
            reason: "file name is not valid UTF-8".into(),
        })?;
    let owd = parse_delay_at(filename, delay_token)?;
    Ok(RunMetadata::new(filename, owd))
}
