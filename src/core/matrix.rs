/// Sparse transition table — two independent label axes over a sparse cell store.
///
/// Only explicitly set cells occupy memory. Every other (row, column) pair,
/// including pairs of labels the table has never seen, resolves to the
/// table's default value.

use rustc_hash::FxHashMap;
use std::fmt;

/// Value returned for unset cells unless a table is built with another default.
pub const DEFAULT_WEIGHT: f64 = 0.0;

/// One label axis: labels in first-seen order plus a label → offset index.
///
/// Offsets are dense, start at 0, and are never reassigned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Axis {
    labels: Vec<String>,
    offsets: FxHashMap<String, usize>,
}

impl Axis {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `label` if unseen and return its offset.
    pub fn insert(&mut self, label: &str) -> usize {
        if let Some(&offset) = self.offsets.get(label) {
            return offset;
        }
        let offset = self.labels.len();
        self.labels.push(label.to_string());
        self.offsets.insert(label.to_string(), offset);
        offset
    }

    pub fn offset(&self, label: &str) -> Option<usize> {
        self.offsets.get(label).copied()
    }

    pub fn label(&self, offset: usize) -> Option<&str> {
        self.labels.get(offset).map(String::as_str)
    }

    /// Labels in offset order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn contains(&self, label: &str) -> bool {
        self.offsets.contains_key(label)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// A sparse 2D table of `f64` weights addressed by (row label, column label).
///
/// The row and column axes keep separate label spaces, so the table can be
/// rectangular. Storage maps row offset → {column offset → value}.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseTransitionTable {
    rows: Axis,
    columns: Axis,
    default: f64,
    cells: FxHashMap<usize, FxHashMap<usize, f64>>,
}

impl Default for SparseTransitionTable {
    fn default() -> Self {
        Self::with_default(DEFAULT_WEIGHT)
    }
}

impl SparseTransitionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty table whose unset cells read as `default`.
    pub fn with_default(default: f64) -> Self {
        Self {
            rows: Axis::new(),
            columns: Axis::new(),
            default,
            cells: FxHashMap::default(),
        }
    }

    pub fn default_value(&self) -> f64 {
        self.default
    }

    /// Store `value` at (`row`, `column`), registering either label if unseen.
    ///
    /// Overwrites any previous value for the cell.
    pub fn set(&mut self, row: &str, column: &str, value: f64) {
        let row_offset = self.rows.insert(row);
        let column_offset = self.columns.insert(column);
        self.cells
            .entry(row_offset)
            .or_default()
            .insert(column_offset, value);
    }

    /// Fetch the value at (`row`, `column`), or the default when unknown or unset.
    pub fn get(&self, row: &str, column: &str) -> f64 {
        let (Some(row_offset), Some(column_offset)) =
            (self.rows.offset(row), self.columns.offset(column))
        else {
            return self.default;
        };
        self.get_at(row_offset, column_offset)
    }

    /// Offset-addressed read. Out-of-range offsets read as the default.
    pub fn get_at(&self, row_offset: usize, column_offset: usize) -> f64 {
        self.cells
            .get(&row_offset)
            .and_then(|row| row.get(&column_offset))
            .copied()
            .unwrap_or(self.default)
    }

    /// Register a row label without setting any cell.
    pub fn insert_row_label(&mut self, label: &str) -> usize {
        self.rows.insert(label)
    }

    /// Register a column label without setting any cell.
    pub fn insert_column_label(&mut self, label: &str) -> usize {
        self.columns.insert(label)
    }

    pub fn row_offset(&self, label: &str) -> Option<usize> {
        self.rows.offset(label)
    }

    pub fn column_offset(&self, label: &str) -> Option<usize> {
        self.columns.offset(label)
    }

    pub fn column_label(&self, offset: usize) -> Option<&str> {
        self.columns.label(offset)
    }

    pub fn row_labels(&self) -> &[String] {
        self.rows.labels()
    }

    pub fn column_labels(&self) -> &[String] {
        self.columns.labels()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn contains_row(&self, label: &str) -> bool {
        self.rows.contains(label)
    }

    pub fn contains_column(&self, label: &str) -> bool {
        self.columns.contains(label)
    }

    /// True when `label` is known on either axis.
    pub fn contains(&self, label: &str) -> bool {
        self.contains_row(label) || self.contains_column(label)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() && self.columns.is_empty()
    }

    /// Number of explicitly set cells.
    pub fn cell_count(&self) -> usize {
        self.cells.values().map(|row| row.len()).sum()
    }

    /// The full row for `row`: one value per column label, in column-offset
    /// order, with unset cells filled by the default.
    ///
    /// An unknown row yields a row made entirely of defaults.
    pub fn dense_row(&self, row: &str) -> Vec<f64> {
        let stored = self.rows.offset(row).and_then(|offset| self.cells.get(&offset));
        (0..self.columns.len())
            .map(|column| {
                stored
                    .and_then(|cells| cells.get(&column))
                    .copied()
                    .unwrap_or(self.default)
            })
            .collect()
    }

    /// The full column for `column`: one value per row label, in row-offset order.
    pub fn dense_column(&self, column: &str) -> Vec<f64> {
        let column_offset = self.columns.offset(column);
        (0..self.rows.len())
            .map(|row| match column_offset {
                Some(column) => self.get_at(row, column),
                None => self.default,
            })
            .collect()
    }

    /// Explicitly set cells of a row as (column offset, value), sorted by offset.
    pub fn sparse_row_offsets(&self, row_offset: usize) -> Vec<(usize, f64)> {
        let mut entries: Vec<(usize, f64)> = self
            .cells
            .get(&row_offset)
            .map(|row| row.iter().map(|(&column, &value)| (column, value)).collect())
            .unwrap_or_default();
        entries.sort_unstable_by_key(|&(column, _)| column);
        entries
    }

    /// Explicitly set cells of `row`, keyed by column label in column-offset order.
    pub fn sparse_row(&self, row: &str) -> Vec<(&str, f64)> {
        let Some(row_offset) = self.rows.offset(row) else {
            return Vec::new();
        };
        self.sparse_row_offsets(row_offset)
            .into_iter()
            .filter_map(|(column, value)| self.columns.label(column).map(|label| (label, value)))
            .collect()
    }

    /// Explicitly set cells of `column`, keyed by row label in row-offset order.
    pub fn sparse_column(&self, column: &str) -> Vec<(&str, f64)> {
        let Some(column_offset) = self.columns.offset(column) else {
            return Vec::new();
        };
        let mut entries: Vec<(usize, f64)> = self
            .cells
            .iter()
            .filter_map(|(&row, cells)| cells.get(&column_offset).map(|&value| (row, value)))
            .collect();
        entries.sort_unstable_by_key(|&(row, _)| row);
        entries
            .into_iter()
            .filter_map(|(row, value)| self.rows.label(row).map(|label| (label, value)))
            .collect()
    }

    /// Every set cell as (row offset, column offset, value), sorted by position.
    pub fn cells(&self) -> Vec<(usize, usize, f64)> {
        let mut cells: Vec<(usize, usize, f64)> = self
            .cells
            .iter()
            .flat_map(|(&row, columns)| {
                columns
                    .iter()
                    .map(move |(&column, &value)| (row, column, value))
            })
            .collect();
        cells.sort_unstable_by_key(|&(row, column, _)| (row, column));
        cells
    }
}

impl fmt::Display for SparseTransitionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.rows.len(), self.columns.len())
    }
}
