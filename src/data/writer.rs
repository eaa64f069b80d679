use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{ArrayRef, Float32Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use serde::Serialize;

use super::model::{Block, Dataset, RunContribution, BLOCK_ROWS, FEATURES, FEATURE_NAMES};

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Write the dataset to a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.parquet` – long table, one row per block row (recommended)
/// * `.json`    – `{ "shape": [N, 10, 6], "runs": [...], "data": [...] }`
pub fn write_file(dataset: &Dataset, path: &Path) -> Result<()> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "parquet" | "pq" => write_parquet(dataset, path),
        "json" => write_json(dataset, path),
        other => bail!("Unsupported output extension: .{other}"),
    }
}

// ---------------------------------------------------------------------------
// JSON writer
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct JsonDataset<'a> {
    shape: [usize; 3],
    runs: &'a [RunContribution],
    data: &'a [Block],
}

fn write_json(dataset: &Dataset, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating '{}'", path.display()))?;
    let doc = JsonDataset {
        shape: dataset.shape(),
        runs: &dataset.runs,
        data: &dataset.blocks,
    };
    let mut out = BufWriter::new(file);
    serde_json::to_writer(&mut out, &doc).context("writing JSON dataset")?;
    out.flush().context("flushing JSON dataset")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Parquet writer
// ---------------------------------------------------------------------------

/// Schema of the long table: `run`, `block`, `step`, then one Float32 column
/// per feature. `(block, step)` reshapes back to `(N, 10, 6)`.
pub fn parquet_schema() -> Arc<Schema> {
    let mut fields = vec![
        Field::new("run", DataType::Utf8, false),
        Field::new("block", DataType::Int64, false),
        Field::new("step", DataType::Int64, false),
    ];
    fields.extend(
        FEATURE_NAMES
            .iter()
            .map(|name| Field::new(*name, DataType::Float32, false)),
    );
    Arc::new(Schema::new(fields))
}

fn to_record_batch(dataset: &Dataset) -> Result<RecordBatch> {
    let n_rows = dataset.len() * BLOCK_ROWS;
    let mut runs: Vec<&str> = Vec::with_capacity(n_rows);
    let mut blocks: Vec<i64> = Vec::with_capacity(n_rows);
    let mut steps: Vec<i64> = Vec::with_capacity(n_rows);
    let mut features: Vec<Vec<f32>> = vec![Vec::with_capacity(n_rows); FEATURES];

    for (block_idx, (run, block)) in dataset.iter_with_run().enumerate() {
        for (step, row) in block.rows().iter().enumerate() {
            runs.push(run);
            blocks.push(block_idx as i64);
            steps.push(step as i64);
            for (column, &value) in features.iter_mut().zip(row.iter()) {
                column.push(value);
            }
        }
    }
    if runs.len() != n_rows {
        bail!(
            "run contributions cover {} rows but the dataset has {n_rows}",
            runs.len()
        );
    }

    let mut columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(runs)),
        Arc::new(Int64Array::from(blocks)),
        Arc::new(Int64Array::from(steps)),
    ];
    columns.extend(
        features
            .into_iter()
            .map(|values| Arc::new(Float32Array::from(values)) as ArrayRef),
    );

    RecordBatch::try_new(parquet_schema(), columns).context("building record batch")
}

fn write_parquet(dataset: &Dataset, path: &Path) -> Result<()> {
    let batch = to_record_batch(dataset)?;
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating '{}'", path.display()))?;
    let mut writer =
        ArrowWriter::try_new(file, batch.schema(), None).context("creating parquet writer")?;
    writer.write(&batch).context("writing parquet batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

    fn dataset() -> Dataset {
        let mut rows = [[0.0f32; FEATURES]; BLOCK_ROWS];
        for (i, row) in rows.iter_mut().enumerate() {
            *row = [3.2, i as f32, 1.0, 2.0, 3.0, 4.0];
        }
        Dataset {
            blocks: vec![Block::new(rows); 3],
            runs: vec![
                RunContribution {
                    identifier: "a".into(),
                    achievable: 1,
                    emitted: 1,
                },
                RunContribution {
                    identifier: "b".into(),
                    achievable: 4,
                    emitted: 2,
                },
            ],
        }
    }

    #[test]
    fn test_parquet_long_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.parquet");
        write_file(&dataset(), &path).unwrap();

        let file = std::fs::File::open(&path).unwrap();
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .unwrap()
            .build()
            .unwrap();
        let batches: Vec<RecordBatch> = reader.map(|b| b.unwrap()).collect();
        let total: usize = batches.iter().map(|b| b.num_rows()).sum();
        assert_eq!(total, 30);

        let batch = &batches[0];
        assert_eq!(batch.num_columns(), 3 + FEATURES);
        let run = batch.column(0).as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!(run.value(0), "a");
        assert_eq!(run.value(10), "b");
        let delay = batch.column(3).as_any().downcast_ref::<Float32Array>().unwrap();
        assert_eq!(delay.value(29), 3.2);
    }

    #[test]
    fn test_json_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        write_file(&dataset(), &path).unwrap();

        let doc: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(doc["shape"], serde_json::json!([3, 10, 6]));
        assert_eq!(doc["data"].as_array().unwrap().len(), 3);
        assert_eq!(doc["data"][0].as_array().unwrap().len(), BLOCK_ROWS);
        assert_eq!(doc["data"][0][7][1], serde_json::json!(7.0));
        assert_eq!(doc["runs"][1]["emitted"], serde_json::json!(2));
    }

    #[test]
    fn test_unknown_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(write_file(&dataset(), &dir.path().join("out.pkl")).is_err());
    }
}
