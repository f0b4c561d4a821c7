//! Pre-flight validation for the metadata join.
//!
//! [`join_metadata`](crate::join_metadata) drops long rows whose key has no metadata match
//! without failing. Running [`check_coverage`] (or one of the table helpers) first turns that
//! silent shrink into an explicit report.

use crate::error::WidelongResult;
use crate::metadata::MetadataTable;
use crate::reshape::measure_columns;
use crate::table::Table;
use crate::value::Value;
use serde::Serialize;
use std::collections::HashSet;

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CoverageReport {
    /// Keys present in the data with no metadata row. Their rows vanish from the join.
    pub missing: Vec<Value>,
    /// Metadata keys that never occur in the data.
    pub unused: Vec<Value>,
    /// Keys that occur in the data and are defined on more than one metadata row, with their
    /// row counts. Matching rows fan out.
    pub duplicates: Vec<(Value, usize)>,
}

impl CoverageReport {
    /// True when every data key has exactly one metadata row.
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty() && self.duplicates.is_empty()
    }
}

/// Compare a set of data keys against the keys of `meta`.
///
/// All lists are reported in first-appearance order (data order for `missing`, metadata order
/// for `unused` and `duplicates`).
pub fn check_coverage<'a>(
    keys: impl IntoIterator<Item = &'a Value>,
    meta: &MetadataTable,
) -> CoverageReport {
    let meta_keys: HashSet<&Value> = meta.keys().collect();

    let mut seen = HashSet::new();
    let mut missing = Vec::new();
    for key in keys {
        if seen.insert(key) && !meta_keys.contains(key) {
            missing.push(key.clone());
        }
    }

    let mut unused = Vec::new();
    let mut reported = HashSet::new();
    for key in meta.keys() {
        if !seen.contains(key) && reported.insert(key) {
            unused.push(key.clone());
        }
    }

    let duplicates: Vec<(Value, usize)> = meta
        .duplicate_keys()
        .into_iter()
        .filter(|(key, _)| seen.contains(key))
        .collect();

    CoverageReport {
        missing,
        unused,
        duplicates,
    }
}

/// Check the measure columns of a wide table before reshaping it.
pub fn check_wide_coverage(
    wide: &Table,
    id_columns: &[String],
    meta: &MetadataTable,
) -> WidelongResult<CoverageReport> {
    let keys: Vec<Value> = measure_columns(wide, id_columns)?
        .into_iter()
        .map(Value::from)
        .collect();
    Ok(check_coverage(&keys, meta))
}

/// Check the key field of an already reshaped long table.
pub fn check_long_coverage(
    long: &Table,
    key_field: &str,
    meta: &MetadataTable,
) -> WidelongResult<CoverageReport> {
    Ok(check_coverage(long.column_values(key_field)?, meta))
}
