use std::sync::Arc;

use bson::{Bson, Document, doc};
use sqlcoll_catalog::{Catalog, Outcome, TableDescriptor};
use sqlcoll_query::{LookupDescriptor, Projection, Statement};

use crate::cursor::Cursor;
use crate::database::{Database, unexpected};
use crate::error::DbError;
use crate::lookup::Lookup;
use crate::result::{DeleteResult, InsertResult, UpdateResult};

#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    /// `{path: 1}` to include, `{path: -1}` to exclude.
    pub projection: Option<Document>,
    pub lookup: Lookup,
}

impl FindOptions {
    pub fn projection(mut self, projection: Document) -> Self {
        self.projection = Some(projection);
        self
    }

    pub fn lookup(mut self, lookup: Lookup) -> Self {
        self.lookup = lookup;
        self
    }
}

/// Document operations on one table of a [`Database`].
pub struct Collection<'db, C: Catalog> {
    db: &'db Database<C>,
    table: Arc<TableDescriptor>,
}

impl<'db, C: Catalog> Collection<'db, C> {
    pub(crate) fn new(db: &'db Database<C>, table: Arc<TableDescriptor>) -> Self {
        Self { db, table }
    }

    pub fn name(&self) -> &str {
        &self.table.name
    }

    /// Lookups following this table's foreign keys `depth` levels deep.
    pub fn auto_lookup(&self, depth: usize) -> Result<Vec<LookupDescriptor>, DbError> {
        self.db.resolve_lookup(&self.table, &Lookup::Auto(depth))
    }

    pub fn find(
        &self,
        filter: &Document,
        options: FindOptions,
    ) -> Result<Cursor<'db, C>, DbError> {
        let projection = match &options.projection {
            Some(spec) => Projection::parse(spec)?,
            None => None,
        };
        let planner = self.db.planner(Arc::clone(&self.table), &options.lookup)?;
        let plan = planner.find(filter, projection.as_ref())?;
        Ok(Cursor::new(
            self.db,
            planner.into_mapping(),
            plan.fields,
            plan.select,
        ))
    }

    /// Insert the fields of `document` that belong to this table. With a
    /// lookup, a joined key such as `client.id` writes the local foreign key.
    pub fn insert_one(
        &self,
        document: &Document,
        lookup: Lookup,
    ) -> Result<InsertResult, DbError> {
        let planner = self.db.planner(Arc::clone(&self.table), &lookup)?;
        let stmt = Statement::Insert(planner.insert(document)?);
        match self.db.execute(&stmt)? {
            Outcome::Inserted { id } => Ok(InsertResult { inserted_id: id }),
            other => Err(unexpected(&stmt, other)),
        }
    }

    /// Apply `update`'s `$set` to every row matching `filter`. An empty filter
    /// is rejected.
    pub fn update_many(
        &self,
        filter: &Document,
        update: &Document,
        lookup: Lookup,
    ) -> Result<UpdateResult, DbError> {
        let planner = self.db.planner(Arc::clone(&self.table), &lookup)?;
        let stmt = Statement::Update(planner.update(filter, update)?);
        match self.db.execute(&stmt)? {
            Outcome::Updated { matched, modified } => Ok(UpdateResult {
                matched_count: matched,
                modified_count: modified,
            }),
            other => Err(unexpected(&stmt, other)),
        }
    }

    /// Delete every row matching `filter`. An empty filter is rejected.
    pub fn delete_many(
        &self,
        filter: &Document,
        lookup: Lookup,
    ) -> Result<DeleteResult, DbError> {
        let planner = self.db.planner(Arc::clone(&self.table), &lookup)?;
        let stmt = Statement::Delete(planner.delete(filter)?);
        match self.db.execute(&stmt)? {
            Outcome::Deleted(n) => Ok(DeleteResult { deleted_count: n }),
            other => Err(unexpected(&stmt, other)),
        }
    }

    pub fn count(&self, filter: &Document, lookup: Lookup) -> Result<u64, DbError> {
        self.find(filter, FindOptions::default().lookup(lookup))?
            .count(false)
    }

    /// Describe this table's columns. A column some lookup joins on carries a
    /// `nested_description` of the joined table, recursively.
    pub fn get_description(&self, lookup: Lookup) -> Result<Document, DbError> {
        let lookups = self.db.resolve_lookup(&self.table, &lookup)?;
        let depth = match lookup {
            Lookup::Auto(depth) => depth,
            _ => lookups.len(),
        };
        self.describe(&self.table, None, &lookups, depth)
    }

    fn describe(
        &self,
        table: &TableDescriptor,
        path: Option<&str>,
        lookups: &[LookupDescriptor],
        depth: usize,
    ) -> Result<Document, DbError> {
        let mut fields = Vec::with_capacity(table.columns.len());
        for column in &table.columns {
            let mut field = doc! {
                "name": column.name.as_str(),
                "primary_key": column.primary_key,
                "required": !column.nullable,
                "type": column.ty.name()
            };
            let joined = lookups.iter().find(|l| {
                l.to == table.name && l.local_field == column.name && l.parent_path() == path
            });
            if let Some(lookup) = joined.filter(|_| depth > 0) {
                let from = self.db.table(&lookup.from)?;
                let nested = self.describe(&from, Some(&lookup.as_), lookups, depth - 1)?;
                field.insert("nested_description", nested);
            }
            fields.push(Bson::Document(field));
        }
        Ok(doc! { "table": table.name.as_str(), "fields": fields })
    }
}
