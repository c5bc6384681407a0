use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use bson::{Bson, Document};
use sqlcoll_query::{Insert, Statement};

use crate::catalog::{Catalog, Connector, Outcome, Row};
use crate::error::CatalogError;
use crate::schema::TableDescriptor;

use super::exec;

#[derive(Debug)]
pub(crate) struct MemoryTable {
    pub(crate) descriptor: TableDescriptor,
    pub(crate) rows: Vec<Row>,
}

#[derive(Debug, Default)]
pub(crate) struct Tables {
    /// Creation order.
    pub(crate) tables: Vec<MemoryTable>,
}

impl Tables {
    pub(crate) fn get(&self, name: &str) -> Result<&MemoryTable, CatalogError> {
        self.tables
            .iter()
            .find(|t| t.descriptor.name == name)
            .ok_or_else(|| CatalogError::TableNotFound(name.to_string()))
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Result<&mut MemoryTable, CatalogError> {
        self.tables
            .iter_mut()
            .find(|t| t.descriptor.name == name)
            .ok_or_else(|| CatalogError::TableNotFound(name.to_string()))
    }
}

/// In-memory schema catalog.
///
/// Rows are dynamically typed: values are stored as given, only nullability
/// and primary-key uniqueness are enforced. Joins are inner nested-loop joins.
/// Clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    inner: Arc<RwLock<Tables>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, CatalogError> {
        self.inner
            .read()
            .map_err(|e| CatalogError::Storage(format!("lock poisoned: {e}")))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, CatalogError> {
        self.inner
            .write()
            .map_err(|e| CatalogError::Storage(format!("lock poisoned: {e}")))
    }

    pub fn create_table(&self, descriptor: TableDescriptor) -> Result<(), CatalogError> {
        let mut tables = self.write()?;
        if tables.get(&descriptor.name).is_ok() {
            return Err(CatalogError::Constraint(format!(
                "table already exists: {}",
                descriptor.name
            )));
        }
        for fk in &descriptor.foreign_keys {
            if descriptor.find_column(&fk.column).is_none() {
                return Err(CatalogError::UnknownColumn {
                    source_name: descriptor.name.clone(),
                    column: fk.column.clone(),
                });
            }
        }
        tables.tables.push(MemoryTable {
            descriptor,
            rows: Vec::new(),
        });
        Ok(())
    }

    /// Insert one row given as a flat document of column values.
    /// Returns the row's primary key.
    pub fn insert(&self, table: &str, row: Document) -> Result<Bson, CatalogError> {
        let stmt = Statement::Insert(Insert {
            table: table.to_string(),
            values: row.into_iter().collect(),
        });
        match self.execute(&stmt)? {
            Outcome::Inserted { id } => Ok(id),
            other => Err(CatalogError::Storage(format!(
                "unexpected insert outcome: {other:?}"
            ))),
        }
    }

    /// Snapshot of a table's rows, in column order.
    pub fn rows(&self, table: &str) -> Result<Vec<Row>, CatalogError> {
        Ok(self.read()?.get(table)?.rows.clone())
    }
}

impl Catalog for MemoryCatalog {
    fn list_tables(&self) -> Result<Vec<TableDescriptor>, CatalogError> {
        Ok(self
            .read()?
            .tables
            .iter()
            .map(|t| t.descriptor.clone())
            .collect())
    }

    fn get_table(&self, name: &str) -> Result<TableDescriptor, CatalogError> {
        Ok(self.read()?.get(name)?.descriptor.clone())
    }

    fn execute(&self, stmt: &Statement) -> Result<Outcome, CatalogError> {
        match stmt {
            Statement::Select(select) => exec::select(&*self.read()?, select).map(Outcome::Rows),
            Statement::Count(select) => exec::count(&*self.read()?, select).map(Outcome::Count),
            Statement::Insert(insert) => exec::insert(&mut *self.write()?, insert),
            Statement::Update(update) => exec::update(&mut *self.write()?, update),
            Statement::Delete(delete) => exec::delete(&mut *self.write()?, delete),
        }
    }
}

/// A set of named in-memory schemas.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    schemas: Arc<RwLock<Vec<(String, MemoryCatalog)>>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a schema.
    pub fn add_schema(&self, name: &str, catalog: MemoryCatalog) -> Result<(), CatalogError> {
        let mut schemas = self
            .schemas
            .write()
            .map_err(|e| CatalogError::Storage(format!("lock poisoned: {e}")))?;
        match schemas.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = catalog,
            None => schemas.push((name.to_string(), catalog)),
        }
        Ok(())
    }
}

impl Connector for MemoryConnector {
    type Catalog = MemoryCatalog;

    fn schema_names(&self) -> Result<Vec<String>, CatalogError> {
        let schemas = self
            .schemas
            .read()
            .map_err(|e| CatalogError::Storage(format!("lock poisoned: {e}")))?;
        Ok(schemas.iter().map(|(name, _)| name.clone()).collect())
    }

    fn connect(&self, schema: &str) -> Result<MemoryCatalog, CatalogError> {
        let schemas = self
            .schemas
            .read()
            .map_err(|e| CatalogError::Storage(format!("lock poisoned: {e}")))?;
        schemas
            .iter()
            .find(|(name, _)| name == schema)
            .map(|(_, catalog)| catalog.clone())
            .ok_or_else(|| CatalogError::SchemaNotFound(schema.to_string()))
    }
}
