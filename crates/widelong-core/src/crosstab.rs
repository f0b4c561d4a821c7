//! Frequency tables of two fields.
//!
//! Cross-tabulating the key field against a metadata attribute after a join is the quickest way
//! to see that every measure column picked up its metadata exactly once per source row.

use crate::error::WidelongResult;
use crate::ordering::OrderedTable;
use crate::table::Table;
use crate::value::Value;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CrossTab {
    pub row_field: String,
    pub column_field: String,
    pub row_levels: Vec<Value>,
    pub column_levels: Vec<Value>,
    /// `counts[r][c]` is the number of rows with `row_levels[r]` and `column_levels[c]`.
    pub counts: Vec<Vec<usize>>,
}

impl CrossTab {
    pub fn count(&self, row: &Value, column: &Value) -> usize {
        let r = self.row_levels.iter().position(|v| v == row);
        let c = self.column_levels.iter().position(|v| v == column);
        match (r, c) {
            (Some(r), Some(c)) => self.counts[r][c],
            _ => 0,
        }
    }

    pub fn row_total(&self, row: &Value) -> usize {
        self.row_levels
            .iter()
            .position(|v| v == row)
            .map(|r| self.counts[r].iter().sum())
            .unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }
}

impl fmt::Display for CrossTab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header = format!("{} \\ {}", self.row_field, self.column_field);
        let row_labels: Vec<String> = self.row_levels.iter().map(ToString::to_string).collect();
        let col_labels: Vec<String> = self.column_levels.iter().map(ToString::to_string).collect();

        let first_width = row_labels
            .iter()
            .map(String::len)
            .chain(std::iter::once(header.len()))
            .max()
            .unwrap_or(0);
        let widths: Vec<usize> = col_labels
            .iter()
            .enumerate()
            .map(|(c, label)| {
                self.counts
                    .iter()
                    .map(|row| row[c].to_string().len())
                    .chain(std::iter::once(label.len()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        write!(f, "{header:<first_width$}")?;
        for (label, &width) in col_labels.iter().zip(&widths) {
            write!(f, "  {label:>width$}")?;
        }
        writeln!(f)?;

        for (label, counts) in row_labels.iter().zip(&self.counts) {
            write!(f, "{label:<first_width$}")?;
            for (count, &width) in counts.iter().zip(&widths) {
                write!(f, "  {count:>width$}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Count rows per (`row_field`, `column_field`) pair. Levels appear in first-appearance order.
pub fn crosstab(table: &Table, row_field: &str, column_field: &str) -> WidelongResult<CrossTab> {
    let row_levels = table.distinct_values(row_field)?;
    let column_levels = table.distinct_values(column_field)?;
    tabulate(table, row_field, column_field, row_levels, column_levels)
}

impl OrderedTable {
    /// Like [`crosstab`], but categorical fields list every declared level in category order
    /// (including levels with no rows), followed by any unclassified values.
    pub fn crosstab(&self, row_field: &str, column_field: &str) -> WidelongResult<CrossTab> {
        let row_levels = self.levels_for(row_field)?;
        let column_levels = self.levels_for(column_field)?;
        tabulate(self.table(), row_field, column_field, row_levels, column_levels)
    }

    fn levels_for(&self, field: &str) -> WidelongResult<Vec<Value>> {
        match self.order(field) {
            Some(order) => {
                let mut levels = order.levels().to_vec();
                levels.extend(self.unclassified(field));
                Ok(levels)
            }
            None => self.table().distinct_values(field),
        }
    }
}

fn tabulate(
    table: &Table,
    row_field: &str,
    column_field: &str,
    row_levels: Vec<Value>,
    column_levels: Vec<Value>,
) -> WidelongResult<CrossTab> {
    let row_idx = table.require_column(row_field)?;
    let col_idx = table.require_column(column_field)?;

    let row_pos: HashMap<&Value, usize> =
        row_levels.iter().enumerate().map(|(i, v)| (v, i)).collect();
    let col_pos: HashMap<&Value, usize> = column_levels
        .iter()
        .enumerate()
        .map(|(i, v)| (v, i))
        .collect();

    let mut counts = vec![vec![0usize; column_levels.len()]; row_levels.len()];
    for row in table.rows() {
        if let (Some(&r), Some(&c)) = (row_pos.get(&row[row_idx]), col_pos.get(&row[col_idx])) {
            counts[r][c] += 1;
        }
    }

    Ok(CrossTab {
        row_field: row_field.to_string(),
        column_field: column_field.to_string(),
        row_levels,
        column_levels,
        counts,
    })
}
