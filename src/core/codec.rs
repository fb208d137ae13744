/// Model persistence — CSV, JSON, and RON encodings of a transition table.
///
/// CSV is a dense labeled grid. JSON stores only set cells, keyed by row
/// label then column offset, with the label orderings under reserved keys.
/// RON is a serde snapshot of the whole table.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use thiserror::Error;
use tracing::info;

use crate::core::markov::MarkovChain;
use crate::core::matrix::{SparseTransitionTable, DEFAULT_WEIGHT};

/// JSON key holding row labels in row-offset order.
pub const ROWS_KEY: &str = "__attain_rows__";
/// JSON key holding column labels in column-offset order.
pub const COLUMNS_KEY: &str = "__attain_columns__";

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("RON serialization error: {0}")]
    RonSerialize(#[from] ron::Error),
    #[error("malformed model file: {0}")]
    Format(String),
    #[error("unsupported model format: {0}")]
    UnsupportedFormat(String),
}

fn format_error(message: impl Into<String>) -> CodecError {
    CodecError::Format(message.into())
}

/// On-disk encodings of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFormat {
    Csv,
    Json,
    Ron,
}

impl ModelFormat {
    /// Pick the format from a file extension (`csv`, `json`, `ron`).
    pub fn from_path(path: &Path) -> Result<ModelFormat, CodecError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match extension.as_str() {
            "csv" => Ok(ModelFormat::Csv),
            "json" => Ok(ModelFormat::Json),
            "ron" => Ok(ModelFormat::Ron),
            _ => Err(CodecError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

/// Write a dense grid: a header of column labels after one blank cell, then
/// one line per row label with its dense row.
pub fn write_csv<W: Write>(table: &SparseTransitionTable, writer: W) -> Result<(), CodecError> {
    let mut wtr = csv::Writer::from_writer(writer);

    let mut header = Vec::with_capacity(table.column_count() + 1);
    header.push(String::new());
    header.extend(table.column_labels().iter().cloned());
    wtr.write_record(&header)?;

    for label in table.row_labels() {
        let mut record = Vec::with_capacity(table.column_count() + 1);
        record.push(label.clone());
        record.extend(table.dense_row(label).iter().map(f64::to_string));
        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
}

/// Read a dense grid written by [`write_csv`]. Only cells that differ from
/// `default` are stored.
pub fn read_csv<R: Read>(reader: R, default: f64) -> Result<SparseTransitionTable, CodecError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);
    let mut records = rdr.records();

    let header = records
        .next()
        .ok_or_else(|| format_error("missing header row"))??;
    let columns: Vec<String> = header.iter().skip(1).map(str::to_string).collect();

    let mut table = SparseTransitionTable::with_default(default);
    for label in &columns {
        if table.contains_column(label) {
            return Err(format_error(format!("duplicate column label '{}'", label)));
        }
        table.insert_column_label(label);
    }

    for (index, record) in records.enumerate() {
        let record = record?;
        let line = index + 2;
        if record.len() != header.len() {
            return Err(format_error(format!(
                "line {} has {} fields, header has {}",
                line,
                record.len(),
                header.len()
            )));
        }

        let row = &record[0];
        if table.contains_row(row) {
            return Err(format_error(format!("duplicate row label '{}'", row)));
        }
        table.insert_row_label(row);

        for (column, field) in columns.iter().zip(record.iter().skip(1)) {
            let value: f64 = field.trim().parse().map_err(|_| {
                format_error(format!("line {}: '{}' is not a number", line, field))
            })?;
            if value != default {
                table.set(row, column, value);
            }
        }
    }

    Ok(table)
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

/// Build the sparse JSON document for a table.
///
/// Rows without set cells are only listed under [`ROWS_KEY`].
pub fn to_json_value(table: &SparseTransitionTable) -> Result<Value, CodecError> {
    let mut root = Map::new();
    root.insert(ROWS_KEY.to_string(), Value::from(table.row_labels().to_vec()));
    root.insert(
        COLUMNS_KEY.to_string(),
        Value::from(table.column_labels().to_vec()),
    );

    for (row_offset, label) in table.row_labels().iter().enumerate() {
        let entries = table.sparse_row_offsets(row_offset);
        if entries.is_empty() {
            continue;
        }
        if label == ROWS_KEY || label == COLUMNS_KEY {
            return Err(format_error(format!(
                "row label '{}' collides with a reserved key",
                label
            )));
        }

        let mut row = Map::new();
        for (column, weight) in entries {
            row.insert(column.to_string(), Value::from(weight));
        }
        root.insert(label.clone(), Value::Object(row));
    }

    Ok(Value::Object(root))
}

/// Rebuild a table from a document produced by [`to_json_value`].
pub fn from_json_value(value: Value, default: f64) -> Result<SparseTransitionTable, CodecError> {
    let Value::Object(mut root) = value else {
        return Err(format_error("expected a JSON object at the top level"));
    };

    let rows = take_labels(&mut root, ROWS_KEY)?;
    let columns = take_labels(&mut root, COLUMNS_KEY)?;

    let mut table = SparseTransitionTable::with_default(default);
    for label in &columns {
        if table.contains_column(label) {
            return Err(format_error(format!("duplicate column label '{}'", label)));
        }
        table.insert_column_label(label);
    }
    for label in &rows {
        if table.contains_row(label) {
            return Err(format_error(format!("duplicate row label '{}'", label)));
        }
        table.insert_row_label(label);
    }

    for (row, cells) in root {
        if !table.contains_row(&row) {
            return Err(format_error(format!("row '{}' is not in {}", row, ROWS_KEY)));
        }
        let Value::Object(cells) = cells else {
            return Err(format_error(format!("row '{}' is not an object", row)));
        };

        for (key, weight) in cells {
            let column = key
                .parse::<usize>()
                .ok()
                .and_then(|offset| columns.get(offset))
                .ok_or_else(|| {
                    format_error(format!("row '{}': unknown column offset '{}'", row, key))
                })?;
            let weight = weight.as_f64().ok_or_else(|| {
                format_error(format!("row '{}': weight at '{}' is not a number", row, key))
            })?;
            table.set(&row, column, weight);
        }
    }

    Ok(table)
}

fn take_labels(root: &mut Map<String, Value>, key: &str) -> Result<Vec<String>, CodecError> {
    let Some(Value::Array(items)) = root.remove(key) else {
        return Err(format_error(format!("missing label list '{}'", key)));
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::String(label) => Ok(label),
            other => Err(format_error(format!("non-string label {} in '{}'", other, key))),
        })
        .collect()
}

pub fn write_json<W: Write>(table: &SparseTransitionTable, writer: W) -> Result<(), CodecError> {
    serde_json::to_writer(writer, &to_json_value(table)?)?;
    Ok(())
}

pub fn read_json<R: Read>(reader: R, default: f64) -> Result<SparseTransitionTable, CodecError> {
    let value: Value = serde_json::from_reader(reader)?;
    from_json_value(value, default)
}

// ---------------------------------------------------------------------------
// RON
// ---------------------------------------------------------------------------

/// Serde shape of a table: label orderings plus (row, column, value) cells.
#[derive(Debug, Serialize, Deserialize)]
struct TableSnapshot {
    default: f64,
    rows: Vec<String>,
    columns: Vec<String>,
    cells: Vec<(usize, usize, f64)>,
}

impl From<&SparseTransitionTable> for TableSnapshot {
    fn from(table: &SparseTransitionTable) -> Self {
        Self {
            default: table.default_value(),
            rows: table.row_labels().to_vec(),
            columns: table.column_labels().to_vec(),
            cells: table.cells(),
        }
    }
}

impl TryFrom<TableSnapshot> for SparseTransitionTable {
    type Error = CodecError;

    fn try_from(snapshot: TableSnapshot) -> Result<Self, Self::Error> {
        let mut table = SparseTransitionTable::with_default(snapshot.default);
        for label in &snapshot.rows {
            if table.contains_row(label) {
                return Err(format_error(format!("duplicate row label '{}'", label)));
            }
            table.insert_row_label(label);
        }
        for label in &snapshot.columns {
            if table.contains_column(label) {
                return Err(format_error(format!("duplicate column label '{}'", label)));
            }
            table.insert_column_label(label);
        }

        for (row, column, value) in snapshot.cells {
            let (Some(row_label), Some(column_label)) =
                (snapshot.rows.get(row), snapshot.columns.get(column))
            else {
                return Err(format_error(format!("cell ({}, {}) is out of range", row, column)));
            };
            table.set(row_label, column_label, value);
        }
        Ok(table)
    }
}

pub fn to_ron(table: &SparseTransitionTable) -> Result<String, CodecError> {
    let snapshot = TableSnapshot::from(table);
    Ok(ron::ser::to_string_pretty(
        &snapshot,
        ron::ser::PrettyConfig::default(),
    )?)
}

pub fn from_ron(input: &str) -> Result<SparseTransitionTable, CodecError> {
    let snapshot: TableSnapshot = ron::from_str(input)?;
    SparseTransitionTable::try_from(snapshot)
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

/// Write `table` to `path` in `format`.
pub fn save_table(
    table: &SparseTransitionTable,
    path: &Path,
    format: ModelFormat,
) -> Result<(), CodecError> {
    match format {
        ModelFormat::Csv => write_csv(table, BufWriter::new(File::create(path)?))?,
        ModelFormat::Json => {
            let mut writer = BufWriter::new(File::create(path)?);
            write_json(table, &mut writer)?;
            writer.flush()?;
        }
        ModelFormat::Ron => std::fs::write(path, to_ron(table)?)?,
    }
    info!(path = %path.display(), ?format, table = %table, "saved transition table");
    Ok(())
}

/// Read a table from `path` in `format`. CSV and JSON carry no default, so
/// `default` fills their unset cells; RON restores its own.
pub fn load_table(
    path: &Path,
    format: ModelFormat,
    default: f64,
) -> Result<SparseTransitionTable, CodecError> {
    let table = match format {
        ModelFormat::Csv => read_csv(BufReader::new(File::open(path)?), default)?,
        ModelFormat::Json => read_json(BufReader::new(File::open(path)?), default)?,
        ModelFormat::Ron => from_ron(&std::fs::read_to_string(path)?)?,
    };
    info!(path = %path.display(), ?format, table = %table, "loaded transition table");
    Ok(table)
}

/// Save a chain, choosing the format from the file extension.
pub fn save_model(chain: &MarkovChain, path: &Path) -> Result<(), CodecError> {
    save_table(chain.table(), path, ModelFormat::from_path(path)?)
}

/// Load a chain, choosing the format from the file extension.
pub fn load_model(path: &Path) -> Result<MarkovChain, CodecError> {
    let format = ModelFormat::from_path(path)?;
    load_table(path, format, DEFAULT_WEIGHT).map(MarkovChain::from_table)
}
