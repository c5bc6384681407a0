mod catalog;
mod error;
mod schema;

pub use catalog::{Catalog, Connector, Outcome, Row, RowSet};
pub use error::CatalogError;
pub use schema::{ColumnDescriptor, ColumnType, ForeignKey, TableDescriptor};

#[cfg(feature = "memory")]
mod memory;

#[cfg(feature = "memory")]
pub use memory::{MemoryCatalog, MemoryConnector};
