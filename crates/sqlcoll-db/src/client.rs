use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use sqlcoll_catalog::{CatalogError, Connector};
use tracing::debug;

use crate::config::DatabaseConfig;
use crate::database::Database;
use crate::error::DbError;

/// Entry point over a server holding several schemas. Each schema opens as
/// its own [`Database`] on first use and is reused afterwards.
pub struct Client<K: Connector> {
    connector: K,
    config: DatabaseConfig,
    databases: Mutex<HashMap<String, Arc<Database<K::Catalog>>>>,
}

impl<K: Connector> Client<K> {
    pub fn new(connector: K, config: DatabaseConfig) -> Self {
        Self {
            connector,
            config,
            databases: Mutex::new(HashMap::new()),
        }
    }

    pub fn schema_names(&self) -> Result<Vec<String>, DbError> {
        Ok(self.connector.schema_names()?)
    }

    pub fn database(&self, name: &str) -> Result<Arc<Database<K::Catalog>>, DbError> {
        let mut databases = self.databases.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(db) = databases.get(name) {
            return Ok(Arc::clone(db));
        }

        let catalog = self.connector.connect(name).map_err(|e| match e {
            CatalogError::SchemaNotFound(name) => {
                DbError::Schema(format!("unknown schema: {name}"))
            }
            other => DbError::Catalog(other),
        })?;
        debug!(schema = name, "opened database");
        let db = Arc::new(Database::with_config(catalog, self.config.clone()));
        databases.insert(name.to_string(), Arc::clone(&db));
        Ok(db)
    }
}
