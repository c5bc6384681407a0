use std::sync::Arc;

use bson::Bson;
use sqlcoll_query::Statement;

use crate::error::CatalogError;
use crate::schema::TableDescriptor;

/// One result row, aligned with the select's fields.
pub type Row = Vec<Bson>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    pub rows: Vec<Row>,
}

impl RowSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// What executing a statement produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Rows(RowSet),
    Count(u64),
    /// Primary key of the inserted row, `Null` for tables without one.
    Inserted { id: Bson },
    Updated { matched: u64, modified: u64 },
    Deleted(u64),
}

/// Table metadata and statement execution for one schema.
///
/// Implementations own whatever connection they need. Table descriptors are
/// expected to be stable for the lifetime of the catalog.
pub trait Catalog {
    fn list_tables(&self) -> Result<Vec<TableDescriptor>, CatalogError>;

    /// Fails with [`CatalogError::TableNotFound`] when absent.
    fn get_table(&self, name: &str) -> Result<TableDescriptor, CatalogError>;

    fn execute(&self, stmt: &Statement) -> Result<Outcome, CatalogError>;
}

impl<C: Catalog + ?Sized> Catalog for &C {
    fn list_tables(&self) -> Result<Vec<TableDescriptor>, CatalogError> {
        (**self).list_tables()
    }

    fn get_table(&self, name: &str) -> Result<TableDescriptor, CatalogError> {
        (**self).get_table(name)
    }

    fn execute(&self, stmt: &Statement) -> Result<Outcome, CatalogError> {
        (**self).execute(stmt)
    }
}

impl<C: Catalog + ?Sized> Catalog for Arc<C> {
    fn list_tables(&self) -> Result<Vec<TableDescriptor>, CatalogError> {
        (**self).list_tables()
    }

    fn get_table(&self, name: &str) -> Result<TableDescriptor, CatalogError> {
        (**self).get_table(name)
    }

    fn execute(&self, stmt: &Statement) -> Result<Outcome, CatalogError> {
        (**self).execute(stmt)
    }
}

/// Server-level entry point: enumerates schemas and opens a catalog per schema.
pub trait Connector {
    type Catalog: Catalog;

    fn schema_names(&self) -> Result<Vec<String>, CatalogError>;

    /// Fails with [`CatalogError::SchemaNotFound`] when absent.
    fn connect(&self, schema: &str) -> Result<Self::Catalog, CatalogError>;
}
