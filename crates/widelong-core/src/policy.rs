use serde::{Deserialize, Serialize};

/// What to do with values that have no counterpart: a join key with no metadata row, or a field
/// value that is not a declared category level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPolicy {
    /// Drop unmatched join rows and leave unknown category values unclassified, reporting both
    /// as warnings.
    #[default]
    Lenient,
    /// Fail on the first unmatched key or unclassified value.
    Strict,
}
