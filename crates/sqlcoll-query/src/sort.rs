use serde::{Deserialize, Serialize};

use crate::error::QueryError;
use crate::expression::ColumnRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    /// Document-style direction: `1` ascending, `-1` descending.
    pub fn from_i64(direction: i64) -> Result<Self, QueryError> {
        match direction {
            1 => Ok(SortDirection::Asc),
            -1 => Ok(SortDirection::Desc),
            other => Err(QueryError::SortDirection(other)),
        }
    }
}

impl TryFrom<i32> for SortDirection {
    type Error = QueryError;

    fn try_from(direction: i32) -> Result<Self, Self::Error> {
        Self::from_i64(i64::from(direction))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub column: ColumnRef,
    pub direction: SortDirection,
}
