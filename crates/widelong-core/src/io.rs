//! CSV import/export for [`Table`].
//!
//! Loading data is outside the reshape itself; these helpers exist so tables can come from and
//! go back to delimited text. Cells are inferred one at a time: empty → [`Value::Blank`],
//! `true`/`false` → [`Value::Boolean`], anything that parses as a finite number →
//! [`Value::Number`], everything else → [`Value::Text`].

use crate::error::WidelongError;
use crate::table::Table;
use crate::value::Value;
use std::io::{Read, Write};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct CsvOptions {
    pub delimiter: u8,
    pub has_header: bool,
    /// When false every non-empty cell is read as text.
    pub infer_types: bool,
    /// Columns always read as text, whatever `infer_types` says (e.g. a metadata key column
    /// whose values name wide-table headers such as `2020` or `01`).
    pub text_columns: Vec<String>,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            has_header: true,
            infer_types: true,
            text_columns: Vec::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CsvError {
    #[error("csv input was empty")]
    EmptyInput,
    #[error("csv parse error at row {row}: {reason}")]
    Parse { row: u64, reason: String },
    #[error(transparent)]
    Table(#[from] WidelongError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Infer a scalar from a single CSV field.
pub fn infer_value(field: &str) -> Value {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return Value::Blank;
    }
    if trimmed.eq_ignore_ascii_case("true") {
        return Value::Boolean(true);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return Value::Boolean(false);
    }
    // `f64::from_str` also accepts `inf`/`NaN`; those are far more likely to be labels.
    if trimmed.bytes().any(|b| b.is_ascii_digit()) {
        if let Ok(n) = trimmed.parse::<f64>() {
            if n.is_finite() {
                return Value::from(n);
            }
        }
    }
    Value::from(trimmed)
}

fn field_value(field: &str, infer: bool) -> Value {
    if infer {
        infer_value(field)
    } else if field.is_empty() {
        Value::Blank
    } else {
        Value::from(field)
    }
}

pub fn read_csv<R: Read>(reader: R, options: &CsvOptions) -> Result<Table, CsvError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        // Headers are handled here so the first record is reported consistently.
        .has_headers(false)
        .from_reader(reader);

    let mut records = csv_reader.records();
    let first = match records.next() {
        Some(record) => record.map_err(|e| map_csv_error(e, 1))?,
        None => return Err(CsvError::EmptyInput),
    };

    let mut pending = None;
    let columns: Vec<String> = if options.has_header {
        first.iter().map(|s| s.trim().to_string()).collect()
    } else {
        let columns = (0..first.len()).map(|i| format!("Column{}", i + 1)).collect();
        pending = Some(first);
        columns
    };

    let infer: Vec<bool> = columns
        .iter()
        .map(|c| options.infer_types && !options.text_columns.contains(c))
        .collect();
    let to_row = |record: &csv::StringRecord| -> Vec<Value> {
        record
            .iter()
            .enumerate()
            .map(|(idx, f)| field_value(f, infer.get(idx).copied().unwrap_or(false)))
            .collect()
    };

    let mut table = Table::new(columns)?;
    if let Some(record) = pending {
        table.push_row(to_row(&record))?;
    }

    for (idx, record) in records.enumerate() {
        let record = record.map_err(|e| map_csv_error(e, idx as u64 + 2))?;
        table.push_row(to_row(&record))?;
    }

    log::debug!(
        "read csv: {} column(s), {} row(s)",
        table.column_count(),
        table.row_count()
    );
    Ok(table)
}

pub fn write_csv<W: Write>(table: &Table, writer: W, delimiter: u8) -> Result<(), CsvError> {
    let mut csv_writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(writer);

    csv_writer
        .write_record(table.columns())
        .map_err(|e| map_csv_error(e, 1))?;
    for (idx, row) in table.rows().enumerate() {
        csv_writer
            .write_record(row.iter().map(ToString::to_string))
            .map_err(|e| map_csv_error(e, idx as u64 + 2))?;
    }
    csv_writer.flush()?;
    Ok(())
}

fn map_csv_error(err: csv::Error, fallback_row: u64) -> CsvError {
    let reason = err.to_string();
    let pos = err.position().cloned();

    match err.into_kind() {
        csv::ErrorKind::Io(e) => CsvError::Io(e),
        _ => {
            let row = pos
                .map(|p| p.record() + 1)
                .filter(|r| *r > 1)
                .unwrap_or(fallback_row);
            CsvError::Parse { row, reason }
        }
    }
}
