//! Column metadata side tables.
//!
//! A [`MetadataTable`] describes the measure columns of a wide table: one row per column name
//! (stored in the key column) plus any number of descriptive attribute columns. Keys are expected
//! to be unique, but this is not enforced here; duplicates fan out in
//! [`join_metadata`](crate::join_metadata) and are reported by
//! [`check_coverage`](crate::check_coverage).

use crate::error::{WidelongError, WidelongResult};
use crate::table::Table;
use crate::value::Value;
use std::collections::HashMap;

#[derive(Clone, Debug, PartialEq)]
pub struct MetadataTable {
    table: Table,
    key_field: String,
    key_idx: usize,
}

impl MetadataTable {
    /// Wrap an existing table whose `key_field` column holds measure-column names.
    ///
    /// Key cells are normalized to trimmed text (`2020` read as a number becomes `"2020"`), the
    /// form unpivoted keys take.
    pub fn from_table(mut table: Table, key_field: impl Into<String>) -> WidelongResult<Self> {
        let key_field = key_field.into();
        let key_idx = table
            .column_idx(&key_field)
            .ok_or_else(|| WidelongError::UnknownKeyColumn {
                column: key_field.clone(),
            })?;
        table.map_column(key_idx, key_text);
        Ok(Self {
            table,
            key_field,
            key_idx,
        })
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn into_table(self) -> Table {
        self.table
    }

    pub fn key_field(&self) -> &str {
        &self.key_field
    }

    pub(crate) fn key_idx(&self) -> usize {
        self.key_idx
    }

    pub fn row_count(&self) -> usize {
        self.table.row_count()
    }

    /// Non-key columns, in table order.
    pub fn attribute_fields(&self) -> impl Iterator<Item = &str> + '_ {
        self.table
            .columns()
            .iter()
            .enumerate()
            .filter(move |(idx, _)| *idx != self.key_idx)
            .map(|(_, c)| c.as_str())
    }

    /// Key values in row order (duplicates included).
    pub fn keys(&self) -> impl Iterator<Item = &Value> + '_ {
        self.table.rows().map(move |row| &row[self.key_idx])
    }

    /// Keys that appear on more than one row, with their row counts, in first-appearance order.
    pub fn duplicate_keys(&self) -> Vec<(Value, usize)> {
        let mut counts: HashMap<&Value, usize> = HashMap::new();
        let mut order = Vec::new();
        for key in self.keys() {
            let count = counts.entry(key).or_insert(0);
            if *count == 0 {
                order.push(key);
            }
            *count += 1;
        }
        order
            .into_iter()
            .filter_map(|key| {
                let count = counts[key];
                (count > 1).then(|| (key.clone(), count))
            })
            .collect()
    }

    /// Row indices per key value.
    pub(crate) fn key_index(&self) -> HashMap<&Value, Vec<usize>> {
        let mut index: HashMap<&Value, Vec<usize>> = HashMap::new();
        for (row, key) in self.keys().enumerate() {
            index.entry(key).or_default().push(row);
        }
        index
    }
}

/// The text form of a metadata key: trimmed text, or the display form of a non-text scalar
/// (`2020` for a key read as the number 2020). Blank keys stay blank.
fn key_text(key: &Value) -> Value {
    if key.is_blank() {
        return Value::Blank;
    }
    match key.as_text() {
        Some(text) if text.trim().len() == text.len() => key.clone(),
        Some(text) => Value::from(text.trim()),
        None => Value::from(key.to_string()),
    }
}

/// Builds a [`MetadataTable`] row by row.
///
/// ```
/// use widelong_core::MetadataBuilder;
///
/// let meta = MetadataBuilder::new("key", ["group"])
///     .entry("a", ["group1"])
///     .entry("b", ["group1"])
///     .entry("c", ["group2"])
///     .build()
///     .unwrap();
/// assert_eq!(meta.row_count(), 3);
/// ```
#[derive(Clone, Debug)]
pub struct MetadataBuilder {
    key_field: String,
    attribute_fields: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl MetadataBuilder {
    pub fn new<S: Into<String>>(
        key_field: impl Into<String>,
        attribute_fields: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            key_field: key_field.into(),
            attribute_fields: attribute_fields.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Derive one metadata row per measure column by applying `describe` to its name. Keys are
    /// the column names verbatim.
    pub fn derive<'a, S, F, A>(
        key_field: impl Into<String>,
        attribute_fields: impl IntoIterator<Item = S>,
        columns: impl IntoIterator<Item = &'a str>,
        mut describe: F,
    ) -> Self
    where
        S: Into<String>,
        F: FnMut(&str) -> A,
        A: IntoIterator,
        A::Item: Into<Value>,
    {
        let mut builder = Self::new(key_field, attribute_fields);
        for column in columns {
            let attrs = describe(column);
            builder = builder.entry(column, attrs);
        }
        builder
    }

    pub fn entry<A>(mut self, key: impl Into<Value>, attributes: A) -> Self
    where
        A: IntoIterator,
        A::Item: Into<Value>,
    {
        let mut row = Vec::with_capacity(self.attribute_fields.len() + 1);
        row.push(key.into());
        row.extend(attributes.into_iter().map(Into::into));
        self.rows.push(row);
        self
    }

    /// Fails with [`WidelongError::SchemaMismatch`] when an entry carries the wrong number of
    /// attributes, or [`WidelongError::DuplicateColumn`] when field names repeat.
    pub fn build(self) -> WidelongResult<MetadataTable> {
        let mut columns = Vec::with_capacity(self.attribute_fields.len() + 1);
        columns.push(self.key_field.clone());
        columns.extend(self.attribute_fields);
        let table = Table::from_rows(columns, self.rows)?;
        MetadataTable::from_table(table, self.key_field)
    }
}
