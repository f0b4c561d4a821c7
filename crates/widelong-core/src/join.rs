//! Attaching column metadata to long-format rows.
//!
//! [`join_metadata`] is a relational inner equi-join of the long table's key field against the
//! metadata key column:
//! - long rows whose key has no metadata row are dropped (see [`MatchPolicy`]);
//! - a key defined on `n` metadata rows yields `n` output rows, one per match, in metadata order.

use crate::error::{WidelongError, WidelongResult};
use crate::metadata::MetadataTable;
use crate::policy::MatchPolicy;
use crate::reshape::DEFAULT_KEY_FIELD;
use crate::table::Table;
use crate::value::Value;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JoinOptions {
    /// Column of the long table holding measure-column names.
    pub key_field: String,
    pub policy: MatchPolicy,
}

impl Default for JoinOptions {
    fn default() -> Self {
        Self {
            key_field: DEFAULT_KEY_FIELD.to_string(),
            policy: MatchPolicy::Lenient,
        }
    }
}

/// Diagnostic emitted for each distinct key that matched no metadata row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UnmatchedKeyWarning {
    pub key: Value,
    pub dropped_rows: usize,
}

impl fmt::Display for UnmatchedKeyWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "key '{}' has no metadata row; dropped {} row(s)",
            self.key, self.dropped_rows
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct JoinOutcome {
    pub table: Table,
    pub warnings: Vec<UnmatchedKeyWarning>,
}

/// Pairs of matching `(long_row, metadata_row)` indices, in long-row order.
fn match_rows(
    long: &Table,
    key_idx: usize,
    meta: &MetadataTable,
) -> (Vec<(usize, usize)>, Vec<UnmatchedKeyWarning>) {
    let index = meta.key_index();

    let mut pairs = Vec::with_capacity(long.row_count());
    let mut unmatched: Vec<UnmatchedKeyWarning> = Vec::new();
    let mut unmatched_pos: HashMap<&Value, usize> = HashMap::new();

    for (row, values) in long.rows().enumerate() {
        let key = &values[key_idx];
        match index.get(key) {
            Some(meta_rows) => pairs.extend(meta_rows.iter().map(|&m| (row, m))),
            None => {
                let pos = *unmatched_pos.entry(key).or_insert_with(|| {
                    unmatched.push(UnmatchedKeyWarning {
                        key: key.clone(),
                        dropped_rows: 0,
                    });
                    unmatched.len() - 1
                });
                unmatched[pos].dropped_rows += 1;
            }
        }
    }

    (pairs, unmatched)
}

/// Join `meta`'s attribute columns onto every matching row of `long`.
///
/// Output columns are the long table's columns followed by the metadata attribute columns (the
/// metadata key column is not repeated). An attribute whose name collides with a long column
/// fails with [`WidelongError::DuplicateColumn`].
pub fn join_metadata(
    long: &Table,
    meta: &MetadataTable,
    options: &JoinOptions,
) -> WidelongResult<JoinOutcome> {
    let key_idx = long.require_column(&options.key_field)?;

    let attr_idxs: Vec<usize> = (0..meta.table().column_count())
        .filter(|&idx| idx != meta.key_idx())
        .collect();
    let mut columns = long.columns().to_vec();
    columns.extend(meta.attribute_fields().map(str::to_string));
    let mut joined = Table::new(columns)?;

    let (pairs, warnings) = match_rows(long, key_idx, meta);

    if !warnings.is_empty() {
        if options.policy == MatchPolicy::Strict {
            return Err(WidelongError::UnmatchedKeys {
                dropped_rows: warnings.iter().map(|w| w.dropped_rows).sum(),
                keys: warnings.into_iter().map(|w| w.key).collect(),
            });
        }
        for warning in &warnings {
            log::warn!("metadata join: {warning}");
        }
    }

    let long_rows: Vec<&[Value]> = long.rows().collect();
    let meta_rows: Vec<&[Value]> = meta.table().rows().collect();
    for (long_row, meta_row) in pairs {
        let (left, right) = (long_rows[long_row], meta_rows[meta_row]);
        let mut out = Vec::with_capacity(left.len() + attr_idxs.len());
        out.extend_from_slice(left);
        out.extend(attr_idxs.iter().map(|&idx| right[idx].clone()));
        joined.push_row(out)?;
    }

    log::debug!(
        "metadata join: {} long row(s) -> {} joined row(s), {} unmatched key(s)",
        long.row_count(),
        joined.row_count(),
        warnings.len()
    );

    Ok(JoinOutcome {
        table: joined,
        warnings,
    })
}
