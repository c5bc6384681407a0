use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    #[error("invalid projection: {0}")]
    Projection(String),
    #[error("invalid sort direction: {0} (expected 1 or -1)")]
    SortDirection(i64),
}
