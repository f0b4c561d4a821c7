use crate::value::Value;

pub type WidelongResult<T> = Result<T, WidelongError>;

#[derive(Debug, thiserror::Error)]
pub enum WidelongError {
    #[error("unknown column {column} (available: {})", .available.join(", "))]
    InvalidColumn {
        column: String,
        available: Vec<String>,
    },

    #[error("duplicate column: {column}")]
    DuplicateColumn { column: String },

    #[error("schema mismatch: expected {expected} values, got {actual}")]
    SchemaMismatch { expected: usize, actual: usize },

    #[error("metadata key column {column} is not present in the metadata table")]
    UnknownKeyColumn { column: String },

    #[error(
        "{} key value(s) have no metadata match ({dropped_rows} row(s) would be dropped): {}",
        .keys.len(),
        format_values(.keys)
    )]
    UnmatchedKeys { keys: Vec<Value>, dropped_rows: usize },

    #[error("value '{value}' in {field} is not one of the declared category levels")]
    UnclassifiedValue { field: String, value: Value },

    #[error("duplicate category level '{value}'")]
    DuplicateLevel { value: Value },
}

fn format_values(values: &[Value]) -> String {
    values
        .iter()
        .map(|v| format!("'{v}'"))
        .collect::<Vec<_>>()
        .join(", ")
}
