//! Wide-to-long reshaping.
//!
//! Given a wide table such as
//!
//! ```text
//!  id | a  | b  | c
//!  ---+----+----+---
//!  1  | 10 | 11 | 12
//!  2  | 20 | 21 | 22
//! ```
//!
//! and identifier columns `["id"]`, [`unpivot`] produces one row per (input row, measure column):
//!
//! ```text
//!  id | key | value
//!  ---+-----+------
//!  1  | a   | 10
//!  1  | b   | 11
//!  1  | c   | 12
//!  2  | a   | 20
//!  ...
//! ```
//!
//! Rows are grouped by input row first and by original measure-column order second.

use crate::error::WidelongResult;
use crate::table::Table;
use crate::value::Value;
use std::collections::HashSet;

pub const DEFAULT_KEY_FIELD: &str = "key";
pub const DEFAULT_VALUE_FIELD: &str = "value";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnpivotOptions {
    /// Columns carried through unchanged. Every other column is pivoted.
    pub id_columns: Vec<String>,
    /// Output column holding the originating measure-column name.
    pub key_field: String,
    /// Output column holding the originating cell value.
    pub value_field: String,
}

impl Default for UnpivotOptions {
    fn default() -> Self {
        Self {
            id_columns: Vec::new(),
            key_field: DEFAULT_KEY_FIELD.to_string(),
            value_field: DEFAULT_VALUE_FIELD.to_string(),
        }
    }
}

impl UnpivotOptions {
    pub fn new<S: Into<String>>(id_columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            id_columns: id_columns.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_key_field(mut self, key_field: impl Into<String>) -> Self {
        self.key_field = key_field.into();
        self
    }

    pub fn with_value_field(mut self, value_field: impl Into<String>) -> Self {
        self.value_field = value_field.into();
        self
    }
}

/// The columns of `wide` that [`unpivot`] would pivot, in table order.
///
/// Fails with [`WidelongError::InvalidColumn`](crate::WidelongError::InvalidColumn) when an
/// identifier column is not part of `wide`.
pub fn measure_columns<'a>(wide: &'a Table, id_columns: &[String]) -> WidelongResult<Vec<&'a str>> {
    for column in id_columns {
        wide.require_column(column)?;
    }
    let ids: HashSet<&str> = id_columns.iter().map(String::as_str).collect();
    Ok(wide
        .columns()
        .iter()
        .map(String::as_str)
        .filter(|c| !ids.contains(c))
        .collect())
}

/// Reshape a wide table into long format.
///
/// The output columns are the identifier columns (in the order given by
/// [`UnpivotOptions::id_columns`]) followed by `key_field` and `value_field`.
pub fn unpivot(wide: &Table, options: &UnpivotOptions) -> WidelongResult<Table> {
    let measures = measure_columns(wide, &options.id_columns)?;

    let id_idxs: Vec<usize> = options
        .id_columns
        .iter()
        .map(|c| wide.require_column(c))
        .collect::<WidelongResult<_>>()?;
    let measure_idxs: Vec<usize> = measures
        .iter()
        .map(|c| wide.require_column(c))
        .collect::<WidelongResult<_>>()?;

    let mut out_columns = options.id_columns.clone();
    out_columns.push(options.key_field.clone());
    out_columns.push(options.value_field.clone());
    // `Table::new` reports key/value fields that collide with an identifier column.
    let mut long = Table::new(out_columns)?;

    let key_values: Vec<Value> = measures.iter().map(|&m| Value::from(m)).collect();
    for row in wide.rows() {
        for (measure_idx, key) in measure_idxs.iter().zip(&key_values) {
            let mut out = Vec::with_capacity(id_idxs.len() + 2);
            out.extend(id_idxs.iter().map(|&idx| row[idx].clone()));
            out.push(key.clone());
            out.push(row[*measure_idx].clone());
            long.push_row(out)?;
        }
    }

    log::debug!(
        "unpivot: {} row(s) x {} measure column(s) -> {} long row(s)",
        wide.row_count(),
        measures.len(),
        long.row_count()
    );
    Ok(long)
}
