//! Ordered categorical fields.
//!
//! A [`CategoryOrder`] is an explicit sequence of permissible values with O(1) rank lookup.
//! Annotating a field of a table with an order turns that field into an ordered categorical:
//! comparisons and sorts follow the declared sequence instead of lexical order. This only
//! affects presentation (grouping, sorting, cross-tab layout); it never changes row contents.

use crate::error::{WidelongError, WidelongResult};
use crate::metadata::MetadataTable;
use crate::policy::MatchPolicy;
use crate::table::Table;
use crate::value::Value;
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CategoryOrder {
    levels: Vec<Value>,
    rank: HashMap<Value, usize>,
}

impl CategoryOrder {
    /// Fails with [`WidelongError::DuplicateLevel`] when a level is listed twice.
    pub fn new<V: Into<Value>>(levels: impl IntoIterator<Item = V>) -> WidelongResult<Self> {
        let levels: Vec<Value> = levels.into_iter().map(Into::into).collect();
        let mut rank = HashMap::with_capacity(levels.len());
        for (idx, level) in levels.iter().enumerate() {
            if rank.insert(level.clone(), idx).is_some() {
                return Err(WidelongError::DuplicateLevel {
                    value: level.clone(),
                });
            }
        }
        Ok(Self { levels, rank })
    }

    /// Levels taken from `field` of the metadata table, in row order (first occurrence wins).
    ///
    /// With `field == meta.key_field()` this orders measure names the way the metadata author
    /// listed them.
    pub fn from_metadata(meta: &MetadataTable, field: &str) -> WidelongResult<Self> {
        Self::new(meta.table().distinct_values(field)?)
    }

    pub fn levels(&self) -> &[Value] {
        &self.levels
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn rank(&self, value: &Value) -> Option<usize> {
        self.rank.get(value).copied()
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.rank.contains_key(value)
    }

    /// Compare two values by rank. Values outside the order sort after every level and compare
    /// equal to each other, so stable sorts keep their relative order.
    pub fn compare(&self, a: &Value, b: &Value) -> Ordering {
        compare_ranks(self.rank(a), self.rank(b))
    }
}

fn compare_ranks(a: Option<usize>, b: Option<usize>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[derive(Clone, Debug, PartialEq)]
struct CategoricalField {
    name: String,
    column_idx: usize,
    order: CategoryOrder,
    /// Per-row rank; `None` marks an unclassified value.
    ranks: Vec<Option<usize>>,
}

/// A cell as seen by presentation code.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Cell<'a> {
    Scalar(&'a Value),
    Categorical {
        value: &'a Value,
        rank: Option<usize>,
    },
}

impl<'a> Cell<'a> {
    pub fn value(&self) -> &'a Value {
        match *self {
            Cell::Scalar(value) => value,
            Cell::Categorical { value, .. } => value,
        }
    }
}

/// A table in which some fields are ordered categoricals.
#[derive(Clone, Debug, PartialEq)]
pub struct OrderedTable {
    table: Table,
    categories: Vec<CategoricalField>,
}

impl From<Table> for OrderedTable {
    fn from(table: Table) -> Self {
        Self {
            table,
            categories: Vec::new(),
        }
    }
}

/// Reinterpret `field` of `table` as an ordered categorical following `order`.
pub fn annotate(
    table: &Table,
    field: &str,
    order: &CategoryOrder,
    policy: MatchPolicy,
) -> WidelongResult<OrderedTable> {
    OrderedTable::from(table.clone()).annotate(field, order, policy)
}

impl OrderedTable {
    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn into_table(self) -> Table {
        self.table
    }

    pub fn row_count(&self) -> usize {
        self.table.row_count()
    }

    /// Return a copy of this table with `field` ordered by `order`.
    ///
    /// Annotating a field that is already categorical replaces its previous order, so applying
    /// the same order twice is the same as applying it once. Under [`MatchPolicy::Lenient`]
    /// values outside the order stay unclassified (rank `None`) and are logged; under
    /// [`MatchPolicy::Strict`] the first such value fails with
    /// [`WidelongError::UnclassifiedValue`].
    pub fn annotate(
        &self,
        field: &str,
        order: &CategoryOrder,
        policy: MatchPolicy,
    ) -> WidelongResult<OrderedTable> {
        let column_idx = self.table.require_column(field)?;

        let mut ranks = Vec::with_capacity(self.table.row_count());
        let mut unclassified = Vec::new();
        let mut seen = HashSet::new();
        for row in self.table.rows() {
            let value = &row[column_idx];
            let rank = order.rank(value);
            if rank.is_none() {
                if policy == MatchPolicy::Strict {
                    return Err(WidelongError::UnclassifiedValue {
                        field: field.to_string(),
                        value: value.clone(),
                    });
                }
                if seen.insert(value) {
                    unclassified.push(value);
                }
            }
            ranks.push(rank);
        }

        for value in &unclassified {
            log::warn!("ordering {field}: value '{value}' is not a declared level; left unclassified");
        }

        let mut out = self.clone();
        out.categories.retain(|c| c.name != field);
        out.categories.push(CategoricalField {
            name: field.to_string(),
            column_idx,
            order: order.clone(),
            ranks,
        });
        Ok(out)
    }

    pub fn is_categorical(&self, field: &str) -> bool {
        self.category(field).is_some()
    }

    pub fn categorical_fields(&self) -> impl Iterator<Item = &str> + '_ {
        self.categories.iter().map(|c| c.name.as_str())
    }

    pub fn order(&self, field: &str) -> Option<&CategoryOrder> {
        self.category(field).map(|c| &c.order)
    }

    /// Rank of `field` in `row`; `None` if the field is not categorical or the value is
    /// unclassified.
    pub fn rank(&self, row: usize, field: &str) -> Option<usize> {
        self.category(field)?.ranks.get(row).copied().flatten()
    }

    /// Distinct unclassified values of a categorical field, in first-appearance order.
    pub fn unclassified(&self, field: &str) -> Vec<Value> {
        let Some(category) = self.category(field) else {
            return Vec::new();
        };
        let mut seen = HashSet::new();
        self.table
            .rows()
            .zip(&category.ranks)
            .filter(|(_, rank)| rank.is_none())
            .map(|(row, _)| &row[category.column_idx])
            .filter(|value| seen.insert(*value))
            .cloned()
            .collect()
    }

    pub fn cell(&self, row: usize, field: &str) -> Option<Cell<'_>> {
        let value = self.table.value(row, field)?;
        Some(match self.category(field) {
            Some(category) => Cell::Categorical {
                value,
                rank: category.ranks.get(row).copied().flatten(),
            },
            None => Cell::Scalar(value),
        })
    }

    /// Compare two rows field by field. Categorical fields compare by rank (unclassified last);
    /// other fields compare by value.
    pub fn compare_rows(&self, a: usize, b: usize, fields: &[&str]) -> WidelongResult<Ordering> {
        let keys = self.sort_keys(fields)?;
        Ok(self.compare_with_keys(&keys, a, b))
    }

    /// Return a copy with rows stably sorted by `fields`.
    pub fn sort_by(&self, fields: &[&str]) -> WidelongResult<OrderedTable> {
        let keys = self.sort_keys(fields)?;
        let mut order: Vec<usize> = (0..self.table.row_count()).collect();
        order.sort_by(|&a, &b| self.compare_with_keys(&keys, a, b));

        let categories = self
            .categories
            .iter()
            .map(|c| CategoricalField {
                ranks: order.iter().map(|&row| c.ranks[row]).collect(),
                ..c.clone()
            })
            .collect();
        Ok(OrderedTable {
            table: self.table.reorder_rows(&order),
            categories,
        })
    }

    fn category(&self, field: &str) -> Option<&CategoricalField> {
        self.categories.iter().find(|c| c.name == field)
    }

    fn sort_keys(&self, fields: &[&str]) -> WidelongResult<Vec<SortKey<'_>>> {
        fields
            .iter()
            .map(|&field| -> WidelongResult<SortKey<'_>> {
                let idx = self.table.require_column(field)?;
                Ok(match self.category(field) {
                    Some(category) => SortKey::Rank(&category.ranks),
                    None => SortKey::Value(idx),
                })
            })
            .collect()
    }

    fn compare_with_keys(&self, keys: &[SortKey<'_>], a: usize, b: usize) -> Ordering {
        for key in keys {
            let ord = match key {
                SortKey::Rank(ranks) => compare_ranks(ranks[a], ranks[b]),
                SortKey::Value(idx) => self
                    .table
                    .value_by_idx(a, *idx)
                    .cmp(&self.table.value_by_idx(b, *idx)),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

enum SortKey<'a> {
    Rank(&'a [Option<usize>]),
    Value(usize),
}

impl Serialize for OrderedTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.table.serialize(serializer)
    }
}
