//! `widelong-core` reshapes wide tables into long format while carrying column metadata
//! through the pivot.
//!
//! The technique is a fixed sequence of pure stages, each producing a new [`Table`]:
//! 1. [`unpivot`] turns every (row, measure column) pair into a long row with `key`/`value`
//!    fields;
//! 2. [`join_metadata`] inner-joins a [`MetadataTable`] (one row per measure column) on the key
//!    field, so each long row picks up the attributes of the column it came from;
//! 3. [`annotate`] optionally turns joined fields into ordered categoricals for presentation.
//!
//! The join drops rows whose key has no metadata row. [`check_coverage`] and [`crosstab`] make
//! that loss visible; [`MatchPolicy::Strict`] turns it into an error.

#![forbid(unsafe_code)]

mod coverage;
mod crosstab;
mod error;
pub mod io;
mod join;
mod metadata;
mod ordering;
mod pipeline;
mod policy;
mod reshape;
mod table;
mod value;

pub use crate::coverage::{
    check_coverage, check_long_coverage, check_wide_coverage, CoverageReport,
};
pub use crate::crosstab::{crosstab, CrossTab};
pub use crate::error::{WidelongError, WidelongResult};
pub use crate::join::{join_metadata, JoinOptions, JoinOutcome, UnmatchedKeyWarning};
pub use crate::metadata::{MetadataBuilder, MetadataTable};
pub use crate::ordering::{annotate, CategoryOrder, Cell, OrderedTable};
pub use crate::pipeline::{run_pipeline, OrderingSpec, PipelineConfig, PipelineOutput};
pub use crate::policy::MatchPolicy;
pub use crate::reshape::{
    measure_columns, unpivot, UnpivotOptions, DEFAULT_KEY_FIELD, DEFAULT_VALUE_FIELD,
};
pub use crate::table::Table;
pub use crate::value::Value;
