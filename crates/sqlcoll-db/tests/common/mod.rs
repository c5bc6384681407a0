#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use bson::{Bson, DateTime, Document, doc};
use sqlcoll_catalog::{
    Catalog, CatalogError, ColumnType, MemoryCatalog, Outcome, TableDescriptor,
};
use sqlcoll_db::{Database, DatabaseConfig, DbError, Documents};
use sqlcoll_query::Statement;

/// Counts statements sent to the wrapped catalog. Can be told to fail the
/// next one.
pub struct CountingCatalog {
    inner: MemoryCatalog,
    executions: AtomicUsize,
    fail_next: AtomicBool,
}

impl CountingCatalog {
    pub fn new(inner: MemoryCatalog) -> Self {
        Self {
            inner,
            executions: AtomicUsize::new(0),
            fail_next: AtomicBool::new(false),
        }
    }

    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn memory(&self) -> &MemoryCatalog {
        &self.inner
    }
}

impl Catalog for CountingCatalog {
    fn list_tables(&self) -> Result<Vec<TableDescriptor>, CatalogError> {
        self.inner.list_tables()
    }

    fn get_table(&self, name: &str) -> Result<TableDescriptor, CatalogError> {
        self.inner.get_table(name)
    }

    fn execute(&self, stmt: &Statement) -> Result<Outcome, CatalogError> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(CatalogError::Storage("connection reset".into()));
        }
        self.inner.execute(stmt)
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
        .try_init();
}

pub fn started() -> DateTime {
    DateTime::parse_rfc3339_str("2017-12-18T14:00:00Z").unwrap()
}

/// `hour -> project -> client` and `hour -> user`.
///
/// | hour | minutes | issue | project             | user  |
/// |------|---------|-------|---------------------|-------|
/// | 1    | 60      | WEB-1 | website (Acme)      | ada   |
/// | 2    | 30      | WEB-2 | website (Acme)      | grace |
/// | 3    | 90      | API-1 | backend (Globex)    | ada   |
/// | 4    | 15      | null  | internal (no client)| grace |
/// | 5    | 45      | API-2 | backend (Globex)    | null  |
pub fn hours_catalog() -> MemoryCatalog {
    let catalog = MemoryCatalog::new();
    catalog
        .create_table(
            TableDescriptor::new("client")
                .primary_key("id", ColumnType::Integer)
                .required_column("name", ColumnType::String),
        )
        .unwrap();
    catalog
        .create_table(
            TableDescriptor::new("project")
                .primary_key("id", ColumnType::Integer)
                .required_column("name", ColumnType::String)
                .column("client", ColumnType::Integer)
                .foreign_key("client", "client", "id"),
        )
        .unwrap();
    catalog
        .create_table(
            TableDescriptor::new("user")
                .primary_key("id", ColumnType::Integer)
                .required_column("name", ColumnType::String)
                .column("email", ColumnType::String),
        )
        .unwrap();
    catalog
        .create_table(
            TableDescriptor::new("hour")
                .primary_key("id", ColumnType::Integer)
                .required_column("minutes", ColumnType::Integer)
                .column("started", ColumnType::Datetime)
                .column("issue", ColumnType::String)
                .column("project", ColumnType::Integer)
                .column("user", ColumnType::Integer)
                .foreign_key("project", "project", "id")
                .foreign_key("user", "user", "id"),
        )
        .unwrap();

    for row in [doc! { "name": "Acme" }, doc! { "name": "Globex" }] {
        catalog.insert("client", row).unwrap();
    }
    for row in [
        doc! { "name": "website", "client": 1 },
        doc! { "name": "backend", "client": 2 },
        doc! { "name": "internal", "client": Bson::Null },
    ] {
        catalog.insert("project", row).unwrap();
    }
    for row in [
        doc! { "name": "ada", "email": "ada@example.com" },
        doc! { "name": "grace", "email": Bson::Null },
    ] {
        catalog.insert("user", row).unwrap();
    }
    for row in [
        doc! { "minutes": 60, "started": started(), "issue": "WEB-1", "project": 1, "user": 1 },
        doc! { "minutes": 30, "issue": "WEB-2", "project": 1, "user": 2 },
        doc! { "minutes": 90, "issue": "API-1", "project": 2, "user": 1 },
        doc! { "minutes": 15, "project": 3, "user": 2 },
        doc! { "minutes": 45, "issue": "API-2", "project": 2 },
    ] {
        catalog.insert("hour", row).unwrap();
    }
    catalog
}

pub fn hours_db() -> Database<MemoryCatalog> {
    init_tracing();
    Database::new(hours_catalog())
}

pub fn counting_db() -> Database<CountingCatalog> {
    init_tracing();
    Database::new(CountingCatalog::new(hours_catalog()))
}

pub fn hours_db_with(config: DatabaseConfig) -> Database<MemoryCatalog> {
    init_tracing();
    Database::with_config(hours_catalog(), config)
}

pub fn collect(docs: Documents) -> Vec<Document> {
    docs.collect::<Result<Vec<_>, DbError>>().unwrap()
}

/// Values of `key` (a top-level field) across `docs`.
pub fn values(docs: &[Document], key: &str) -> Vec<Bson> {
    docs.iter()
        .map(|d| d.get(key).cloned().unwrap_or(Bson::Null))
        .collect()
}

pub fn ids(docs: &[Document]) -> Vec<i64> {
    docs.iter()
        .map(|d| match d.get("id") {
            Some(Bson::Int64(n)) => *n,
            Some(Bson::Int32(n)) => i64::from(*n),
            other => panic!("missing id: {other:?}"),
        })
        .collect()
}
