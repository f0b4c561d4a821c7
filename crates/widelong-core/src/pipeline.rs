//! The full reshape → join → order pipeline, driven by a serializable configuration.

use crate::coverage::{check_long_coverage, CoverageReport};
use crate::error::WidelongResult;
use crate::io::infer_value;
use crate::join::{join_metadata, JoinOptions, UnmatchedKeyWarning};
use crate::metadata::MetadataTable;
use crate::ordering::{CategoryOrder, OrderedTable};
use crate::policy::MatchPolicy;
use crate::reshape::{unpivot, UnpivotOptions, DEFAULT_KEY_FIELD, DEFAULT_VALUE_FIELD};
use crate::table::Table;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub id_columns: Vec<String>,
    pub key_field: String,
    pub value_field: String,
    pub join_policy: MatchPolicy,
    pub ordering_policy: MatchPolicy,
    pub ordering: Vec<OrderingSpec>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            id_columns: Vec::new(),
            key_field: DEFAULT_KEY_FIELD.to_string(),
            value_field: DEFAULT_VALUE_FIELD.to_string(),
            join_policy: MatchPolicy::Lenient,
            ordering_policy: MatchPolicy::Lenient,
            ordering: Vec::new(),
        }
    }
}

/// Categorical ordering for one joined field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderingSpec {
    pub field: String,
    /// Explicit levels. Parsed with the same scalar inference as CSV cells, so `"2"` matches a
    /// numeric 2; levels of the key field stay text. When absent the field's values in metadata
    /// row order are used (for the key field, the metadata key column).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub levels: Option<Vec<String>>,
}

impl OrderingSpec {
    pub fn from_metadata(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            levels: None,
        }
    }

    pub fn explicit<S: Into<String>>(
        field: impl Into<String>,
        levels: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            field: field.into(),
            levels: Some(levels.into_iter().map(Into::into).collect()),
        }
    }

    fn category_order(
        &self,
        meta: &MetadataTable,
        key_field: &str,
    ) -> WidelongResult<CategoryOrder> {
        match &self.levels {
            // Key values are header text, so key levels are never inferred.
            Some(levels) if self.field == key_field => {
                CategoryOrder::new(levels.iter().map(|l| l.trim()))
            }
            Some(levels) => CategoryOrder::new(levels.iter().map(|l| infer_value(l))),
            // The long key field is named independently of the metadata key column.
            None if self.field == key_field => {
                CategoryOrder::from_metadata(meta, meta.key_field())
            }
            None => CategoryOrder::from_metadata(meta, &self.field),
        }
    }
}

impl PipelineConfig {
    pub fn unpivot_options(&self) -> UnpivotOptions {
        UnpivotOptions {
            id_columns: self.id_columns.clone(),
            key_field: self.key_field.clone(),
            value_field: self.value_field.clone(),
        }
    }

    pub fn join_options(&self) -> JoinOptions {
        JoinOptions {
            key_field: self.key_field.clone(),
            policy: self.join_policy,
        }
    }

    /// Switch both the join and ordering policies to strict.
    pub fn strict(mut self) -> Self {
        self.join_policy = MatchPolicy::Strict;
        self.ordering_policy = MatchPolicy::Strict;
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PipelineOutput {
    pub table: OrderedTable,
    /// Coverage of the long table's keys, computed before the join.
    pub coverage: CoverageReport,
    pub warnings: Vec<UnmatchedKeyWarning>,
}

/// Reshape `wide`, attach `meta` and apply the configured orderings.
pub fn run_pipeline(
    wide: &Table,
    meta: &MetadataTable,
    config: &PipelineConfig,
) -> WidelongResult<PipelineOutput> {
    let long = unpivot(wide, &config.unpivot_options())?;
    let coverage = check_long_coverage(&long, &config.key_field, meta)?;
    if !coverage.is_complete() {
        log::info!(
            "metadata coverage incomplete: {} missing key(s), {} duplicated key(s)",
            coverage.missing.len(),
            coverage.duplicates.len()
        );
    }

    let joined = join_metadata(&long, meta, &config.join_options())?;

    let mut table = OrderedTable::from(joined.table);
    for spec in &config.ordering {
        let order = spec.category_order(meta, &config.key_field)?;
        table = table.annotate(&spec.field, &order, config.ordering_policy)?;
    }

    log::debug!(
        "pipeline: {} wide row(s) -> {} output row(s)",
        wide.row_count(),
        table.row_count()
    );
    Ok(PipelineOutput {
        table,
        coverage,
        warnings: joined.warnings,
    })
}
