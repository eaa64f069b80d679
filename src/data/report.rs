use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use super::model::{Dataset, FEATURES, FEATURE_NAMES};

/// Percentiles reported for each feature.
pub const PERCENTILES: [u32; 11] = [0, 10, 20, 30, 40, 50, 60, 70, 80, 90, 100];

/// Linear-interpolation percentile of sorted values (numpy's default method).
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let rank = (p / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64))
}

/// One `(feature, percentile, value)` cell of the report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PercentileRow {
    pub feature: &'static str,
    pub percentile: u32,
    pub value: f64,
}

/// Per-feature percentiles over every row of every block.
#[derive(Debug, Clone, Default)]
pub struct PercentileReport {
    pub shape: [usize; 3],
    pub rows: Vec<PercentileRow>,
}

impl PercentileReport {
    pub fn from_dataset(dataset: &Dataset) -> Self {
        let mut rows = Vec::with_capacity(FEATURES * PERCENTILES.len());
        for (feature, name) in FEATURE_NAMES.iter().enumerate() {
            // NaN has no rank; it would otherwise sort to the top and
            // poison the upper percentiles.
            let mut column: Vec<f64> = dataset
                .feature_column(feature)
                .into_iter()
                .map(f64::from)
                .filter(|v| !v.is_nan())
                .collect();
            column.sort_by(f64::total_cmp);
            for &p in &PERCENTILES {
                if let Some(value) = percentile(&column, p as f64) {
                    rows.push(PercentileRow {
                        feature: *name,
                        percentile: p,
                        value,
                    });
                }
            }
        }
        Self {
            shape: dataset.shape(),
            rows,
        }
    }

    /// Write the report as `feature,percentile,value` CSV.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("creating report '{}'", path.display()))?;
        for row in &self.rows {
            writer.serialize(row).context("writing report row")?;
        }
        writer.flush().context("flushing report")?;
        Ok(())
    }
}

impl fmt::Display for PercentileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Final dataset shape: {:?}", self.shape)?;
        writeln!(f)?;
        writeln!(f, "Percentiles for each feature:")?;
        for (idx, name) in FEATURE_NAMES.iter().enumerate() {
            writeln!(f, "Feature {} ({name}):", idx + 1)?;
            for row in self.rows.iter().filter(|r| r.feature == *name) {
                writeln!(f, "  {}th percentile: {:.4}", row.percentile, row.value)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{Block, RunContribution, BLOCK_ROWS};

    #[test]
    fn test_percentile_interpolates() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&v, 0.0), Some(1.0));
        assert_eq!(percentile(&v, 100.0), Some(4.0));
        assert_eq!(percentile(&v, 50.0), Some(2.5));
        assert!((percentile(&v, 10.0).unwrap() - 1.3).abs() < 1e-12);
        assert_eq!(percentile(&[], 50.0), None);
    }

    #[test]
    fn test_report_covers_every_feature() {
        let mut rows = [[0.0f32; FEATURES]; BLOCK_ROWS];
        for (i, row) in rows.iter_mut().enumerate() {
            *row = [1.6, i as f32, 0.0, 0.0, 0.0, 0.0];
        }
        let ds = Dataset {
            blocks: vec![Block::new(rows)],
            runs: vec![RunContribution {
                identifier: "r".into(),
                achievable: 1,
                emitted: 1,
            }],
        };
        let report = PercentileReport::from_dataset(&ds);
        assert_eq!(report.rows.len(), FEATURES * PERCENTILES.len());

        let median_a = report
            .rows
            .iter()
            .find(|r| r.feature == "feature_a" && r.percentile == 50)
            .unwrap();
        assert_eq!(median_a.value, 4.5);
        assert!(report.to_string().contains("Feature 1 (scaled_delay):"));
    }

    #[test]
    fn test_nan_values_are_left_out() {
        let mut rows = [[0.0f32; FEATURES]; BLOCK_ROWS];
        for (i, row) in rows.iter_mut().enumerate() {
            let a = if i % 3 == 0 { f32::NAN } else { i as f32 };
            *row = [1.0, a, 0.0, 0.0, 0.0, 0.0];
        }
        let ds = Dataset {
            blocks: vec![Block::new(rows)],
            runs: Vec::new(),
        };
        let report = PercentileReport::from_dataset(&ds);
        let values: Vec<f64> = report
            .rows
            .iter()
            .filter(|r| r.feature == "feature_a")
            .map(|r| r.value)
            .collect();
        assert_eq!(values.len(), PERCENTILES.len());
        assert!(values.iter().all(|v| v.is_finite()));
        // Remaining values: 1, 2, 4, 5, 7, 8.
        assert_eq!(values[0], 1.0);
        assert_eq!(values[10], 8.0);
    }

    #[test]
    fn test_report_csv() {
        let ds = Dataset {
            blocks: vec![Block::new([[1.0; FEATURES]; BLOCK_ROWS])],
            runs: Vec::new(),
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        PercentileReport::from_dataset(&ds).write_csv(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("feature,percentile,value\n"));
        assert_eq!(text.lines().count(), 1 + FEATURES * PERCENTILES.len());
    }
}
