use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use trace_tensor::config::DatasetConfig;
use trace_tensor::data::balance::{self, Budget};
use trace_tensor::data::extract::WindowMode;
use trace_tensor::data::loader;
use trace_tensor::data::report::PercentileReport;
use trace_tensor::data::writer;

/// Build a `(N, 10, 6)` float32 training tensor from a directory of trace files.
#[derive(Parser, Debug)]
#[command(name = "trace-tensor", version, about)]
pub struct Cli {
    /// Directory containing the trace files
    pub trace_dir: Option<PathBuf>,

    /// JSON config file; command-line flags override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output file (.parquet or .json)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Windowing strategy
    #[arg(short, long, value_enum)]
    pub mode: Option<WindowMode>,

    /// Blocks per run: `auto` (minimum over runs), `unbounded`, or a number
    #[arg(short, long)]
    pub budget: Option<Budget>,

    /// Index of the `_`-separated filename token holding the one-way delay
    #[arg(long)]
    pub delay_token_index: Option<usize>,

    /// Trace file extension
    #[arg(long)]
    pub extension: Option<String>,

    /// Worker threads
    #[arg(short = 'j', long)]
    pub threads: Option<usize>,

    /// Also write the percentile report as CSV
    #[arg(long)]
    pub report_csv: Option<PathBuf>,

    /// Do not print the percentile report
    #[arg(long)]
    pub no_report: bool,
}

impl Cli {
    /// Config file (or defaults) with the command-line flags applied on top.
    pub fn into_config(self) -> Result<DatasetConfig> {
        let mut cfg = match &self.config {
            Some(path) => DatasetConfig::from_file(path)?,
            None => DatasetConfig::default(),
        };
        if let Some(dir) = self.trace_dir {
            cfg.trace_dir = Some(dir);
        }
        if let Some(output) = self.output {
            cfg.output = output;
        }
        if let Some(mode) = self.mode {
            cfg.mode = mode;
        }
        if let Some(budget) = self.budget {
            cfg.budget = Some(budget);
        }
        if let Some(index) = self.delay_token_index {
            cfg.delay_token_index = index;
        }
        if let Some(ext) = self.extension {
            cfg.extension = ext;
        }
        if let Some(threads) = self.threads {
            cfg.threads = Some(threads);
        }
        if let Some(csv) = self.report_csv {
            cfg.report_csv = Some(csv);
        }
        if self.no_report {
            cfg.report = false;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn run(self) -> Result<()> {
        let cfg = self.into_config()?;
        run_pipeline(&cfg)
    }
}

pub fn run_pipeline(cfg: &DatasetConfig) -> Result<()> {
    if let Some(threads) = cfg.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("configuring worker pool")?;
    }

    let trace_dir = cfg.trace_dir()?;
    let loaded = loader::load_dir(trace_dir, &cfg.extension, cfg.delay_token_index)?;

    let dataset = balance::assemble(&loaded.runs, cfg.mode, cfg.budget())?;
    info!("Final dataset shape: {:?}", dataset.shape());

    if cfg.report || cfg.report_csv.is_some() {
        let report = PercentileReport::from_dataset(&dataset);
        if cfg.report {
            println!("{report}");
        }
        if let Some(path) = &cfg.report_csv {
            report.write_csv(path)?;
            info!("Percentile report saved to {}", path.display());
        }
    }

    writer::write_file(&dataset, &cfg.output)?;
    info!("Dataset saved to {}", cfg.output.display());
    Ok(())
}
