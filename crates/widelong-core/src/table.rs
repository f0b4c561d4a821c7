use crate::error::{WidelongError, WidelongResult};
use crate::value::Value;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::collections::{HashMap, HashSet};

/// An in-memory table: an ordered sequence of rows over a fixed list of uniquely named columns.
///
/// Wide, long and joined tables are all represented by this type; the pipeline stages document
/// which shape they expect and produce. Every stage returns a new `Table` rather than mutating
/// its input.
#[derive(Clone, Debug, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    column_index: HashMap<String, usize>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> WidelongResult<Self> {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        let mut column_index = HashMap::with_capacity(columns.len());
        for (idx, column) in columns.iter().enumerate() {
            if column_index.insert(column.clone(), idx).is_some() {
                return Err(WidelongError::DuplicateColumn {
                    column: column.clone(),
                });
            }
        }

        Ok(Self {
            columns,
            column_index,
            rows: Vec::new(),
        })
    }

    /// Build a table from a column list and row-major values.
    pub fn from_rows<S: Into<String>>(
        columns: impl IntoIterator<Item = S>,
        rows: impl IntoIterator<Item = Vec<Value>>,
    ) -> WidelongResult<Self> {
        let mut table = Self::new(columns)?;
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.column_index.contains_key(column)
    }

    pub fn push_row(&mut self, row: Vec<Value>) -> WidelongResult<()> {
        if row.len() != self.columns.len() {
            return Err(WidelongError::SchemaMismatch {
                expected: self.columns.len(),
                actual: row.len(),
            });
        }

        self.rows.push(row);
        Ok(())
    }

    pub fn column_idx(&self, column: &str) -> Option<usize> {
        self.column_index.get(column).copied()
    }

    /// Like [`Table::column_idx`], but reports a missing column as [`WidelongError::InvalidColumn`].
    pub fn require_column(&self, column: &str) -> WidelongResult<usize> {
        self.column_idx(column)
            .ok_or_else(|| WidelongError::InvalidColumn {
                column: column.to_string(),
                available: self.columns.clone(),
            })
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_idx(column)?;
        self.value_by_idx(row, idx)
    }

    pub fn value_by_idx(&self, row: usize, idx: usize) -> Option<&Value> {
        self.rows.get(row)?.get(idx)
    }

    pub fn row(&self, row: usize) -> Option<&[Value]> {
        self.rows.get(row).map(Vec::as_slice)
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Value]> + '_ {
        self.rows.iter().map(Vec::as_slice)
    }

    /// A single row as `(column, value)` pairs in column order.
    pub fn record(&self, row: usize) -> Option<impl Iterator<Item = (&str, &Value)> + '_> {
        let values = self.rows.get(row)?;
        Some(self.columns.iter().map(String::as_str).zip(values.iter()))
    }

    pub fn column_values(
        &self,
        column: &str,
    ) -> WidelongResult<impl Iterator<Item = &Value> + '_> {
        let idx = self.require_column(column)?;
        Ok(self.rows.iter().map(move |row| &row[idx]))
    }

    /// Distinct values of `column` in first-appearance order.
    pub fn distinct_values(&self, column: &str) -> WidelongResult<Vec<Value>> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for value in self.column_values(column)? {
            if seen.insert(value) {
                out.push(value.clone());
            }
        }
        Ok(out)
    }

    /// Rewrite every cell of column `idx` in place.
    pub(crate) fn map_column(&mut self, idx: usize, mut f: impl FnMut(&Value) -> Value) {
        for row in &mut self.rows {
            row[idx] = f(&row[idx]);
        }
    }

    pub(crate) fn reorder_rows(&self, order: &[usize]) -> Self {
        Self {
            columns: self.columns.clone(),
            column_index: self.column_index.clone(),
            rows: order.iter().map(|&row| self.rows[row].clone()).collect(),
        }
    }
}

/// Serializes as a JSON-friendly array of `{column: value}` objects, keeping column order.
impl Serialize for Table {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.rows.len()))?;
        for row in &self.rows {
            seq.serialize_element(&SerializeRecord {
                columns: &self.columns,
                values: row,
            })?;
        }
        seq.end()
    }
}

struct SerializeRecord<'a> {
    columns: &'a [String],
    values: &'a [Value],
}

impl Serialize for SerializeRecord<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (column, value) in self.columns.iter().zip(self.values) {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}
