use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CatalogError {
    #[error("table not found: {0}")]
    TableNotFound(String),
    #[error("schema not found: {0}")]
    SchemaNotFound(String),
    #[error("unknown column {column} on {source_name}")]
    UnknownColumn { source_name: String, column: String },
    #[error("constraint violation: {0}")]
    Constraint(String),
    #[error("unsupported statement: {0}")]
    Unsupported(String),
    #[error("invalid pattern: {0}")]
    InvalidPattern(String),
    #[error("storage error: {0}")]
    Storage(String),
}
