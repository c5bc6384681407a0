use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use sqlcoll_catalog::{Catalog, CatalogError, Outcome, TableDescriptor};
use sqlcoll_query::{LookupDescriptor, Statement, sql};
use tracing::{Level, debug};

use crate::collection::Collection;
use crate::config::DatabaseConfig;
use crate::error::DbError;
use crate::lookup::{Lookup, auto_lookup};
use crate::planner::Planner;

/// One schema: a catalog plus the table descriptors loaded from it so far.
///
/// Descriptors are fetched on first use and kept for the lifetime of the
/// database. Schema changes made elsewhere are not observed.
pub struct Database<C: Catalog> {
    catalog: C,
    config: DatabaseConfig,
    tables: RwLock<HashMap<String, Arc<TableDescriptor>>>,
}

impl<C: Catalog> Database<C> {
    pub fn new(catalog: C) -> Self {
        Self::with_config(catalog, DatabaseConfig::default())
    }

    pub fn with_config(catalog: C, config: DatabaseConfig) -> Self {
        Self {
            catalog,
            config,
            tables: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    /// Load every table the catalog lists and return their names.
    pub fn discover(&self) -> Result<Vec<String>, DbError> {
        let listed = self.catalog.list_tables()?;
        let names = listed.iter().map(|t| t.name.clone()).collect();
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        for descriptor in listed {
            tables
                .entry(descriptor.name.clone())
                .or_insert_with(|| Arc::new(descriptor));
        }
        Ok(names)
    }

    /// The descriptor of `name`, loading it on first use.
    pub fn table(&self, name: &str) -> Result<Arc<TableDescriptor>, DbError> {
        if let Some(table) = self
            .tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            return Ok(Arc::clone(table));
        }

        let descriptor = self.catalog.get_table(name).map_err(|e| match e {
            CatalogError::TableNotFound(name) => DbError::Schema(format!("unknown table: {name}")),
            other => DbError::Catalog(other),
        })?;
        debug!(table = name, columns = descriptor.columns.len(), "loaded table");

        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let table = tables
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(descriptor));
        Ok(Arc::clone(table))
    }

    pub fn collection(&self, name: &str) -> Result<Collection<'_, C>, DbError> {
        Ok(Collection::new(self, self.table(name)?))
    }

    /// Turn a lookup selection into concrete descriptors for `root`.
    pub fn resolve_lookup(
        &self,
        root: &TableDescriptor,
        lookup: &Lookup,
    ) -> Result<Vec<LookupDescriptor>, DbError> {
        match lookup {
            Lookup::None => Ok(Vec::new()),
            Lookup::Explicit(lookups) => Ok(lookups.clone()),
            Lookup::Auto(depth) => {
                if *depth > self.config.max_lookup_depth {
                    return Err(DbError::Usage(format!(
                        "lookup depth {depth} exceeds the maximum of {}",
                        self.config.max_lookup_depth
                    )));
                }
                auto_lookup(root, *depth, None, self.config.cycle_policy, |name| {
                    self.table(name)
                })
            }
        }
    }

    pub(crate) fn planner(
        &self,
        root: Arc<TableDescriptor>,
        lookup: &Lookup,
    ) -> Result<Planner, DbError> {
        let lookups = self.resolve_lookup(&root, lookup)?;
        Planner::new(root, &lookups, self.config.filter_mode, |name| {
            self.table(name)
        })
    }

    /// Send one statement to the catalog.
    pub(crate) fn execute(&self, stmt: &Statement) -> Result<Outcome, DbError> {
        if tracing::enabled!(Level::DEBUG) {
            let rendered = sql::render(stmt);
            debug!(
                kind = stmt.kind(),
                table = stmt.table(),
                sql = %rendered.sql,
                params = rendered.params.len(),
                "execute"
            );
        }
        Ok(self.catalog.execute(stmt)?)
    }
}

pub(crate) fn unexpected(stmt: &Statement, outcome: Outcome) -> DbError {
    DbError::Catalog(CatalogError::Storage(format!(
        "unexpected {} outcome: {outcome:?}",
        stmt.kind()
    )))
}
