use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::data::balance::Budget;
use crate::data::extract::WindowMode;
use crate::data::metadata::DEFAULT_DELAY_TOKEN;

/// Everything one dataset build needs.
///
/// Loaded from an optional JSON file; every key is optional:
///
/// ```json
/// {
///   "trace_dir": "/mydata/ccbench-traces",
///   "output": "6col-rtt-same.parquet",
///   "mode": "rtt",
///   "budget": "auto",
///   "delay_token_index": 2,
///   "threads": 8
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatasetConfig {
    pub trace_dir: Option<PathBuf>,
    pub output: PathBuf,
    pub mode: WindowMode,
    /// `None` picks [`Budget::default_for`] the mode.
    pub budget: Option<Budget>,
    /// `_`-token of the filename holding the one-way delay.
    pub delay_token_index: usize,
    /// Trace file extension, without the dot.
    pub extension: String,
    /// Worker threads; `None` keeps rayon's default.
    pub threads: Option<usize>,
    /// Print the percentile report.
    pub report: bool,
    pub report_csv: Option<PathBuf>,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            trace_dir: None,
            output: PathBuf::from("dataset.parquet"),
            mode: WindowMode::default(),
            budget: None,
            delay_token_index: DEFAULT_DELAY_TOKEN,
            extension: "txt".into(),
            threads: None,
            report: true,
            report_csv: None,
        }
    }
}

impl DatasetConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config '{}'", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config '{}'", path.display()))
    }

    pub fn budget(&self) -> Budget {
        self.budget.unwrap_or_else(|| Budget::default_for(self.mode))
    }

    /// The trace directory, which must be set by the file or the command line.
    pub fn trace_dir(&self) -> Result<&Path> {
        match &self.trace_dir {
            Some(dir) => Ok(dir),
            None => bail!("no trace directory given (pass TRACE_DIR or set \"trace_dir\")"),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.trace_dir()?;
        if self.threads == Some(0) {
            bail!("threads must be at least 1");
        }
        if self.extension.is_empty() {
            bail!("extension must not be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = DatasetConfig::default();
        assert_eq!(cfg.mode, WindowMode::Rtt);
        assert_eq!(cfg.budget(), Budget::Auto);
        assert_eq!(cfg.delay_token_index, 2);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_time_mode_defaults_to_unbounded() {
        let cfg = DatasetConfig {
            mode: WindowMode::Time,
            ..Default::default()
        };
        assert_eq!(cfg.budget(), Budget::Unbounded);
    }

    #[test]
    fn test_partial_json() {
        let cfg: DatasetConfig = serde_json::from_str(
            r#"{ "trace_dir": "/traces", "mode": "time", "budget": "18", "report": false }"#,
        )
        .unwrap();
        assert_eq!(cfg.trace_dir.as_deref(), Some(Path::new("/traces")));
        assert_eq!(cfg.mode, WindowMode::Time);
        assert_eq!(cfg.budget(), Budget::Fixed(18));
        assert!(!cfg.report);
        assert_eq!(cfg.extension, "txt");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        assert!(serde_json::from_str::<DatasetConfig>(r#"{ "min_chunks": 18 }"#).is_err());
    }

    #[test]
    fn test_zero_threads_is_invalid() {
        let cfg = DatasetConfig {
            trace_dir: Some("/traces".into()),
            threads: Some(0),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }
}
