use bson::Bson;
use sqlcoll_catalog::{CatalogError, ColumnType};
use sqlcoll_query::QueryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    /// Unknown table, column, lookup or field path.
    #[error("schema error: {0}")]
    Schema(String),
    #[error("filter error: {0}")]
    Filter(String),
    #[error("usage error: {0}")]
    Usage(String),
    #[error("cannot convert {field} to {expected}: {value}")]
    Conversion {
        field: String,
        expected: ColumnType,
        value: Bson,
    },
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl From<QueryError> for DbError {
    fn from(e: QueryError) -> Self {
        DbError::Usage(e.to_string())
    }
}
