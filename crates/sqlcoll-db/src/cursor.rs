use std::iter::FusedIterator;
use std::mem;

use bson::Document;
use sqlcoll_catalog::{Catalog, Outcome, Row};
use sqlcoll_query::{Select, SortDirection, SortKey, Statement};

use crate::database::{Database, unexpected};
use crate::error::DbError;
use crate::mapping::FieldMapping;
use crate::materialize::{self, OutputField};

/// A pending find.
///
/// Refine it with [`sort`](Cursor::sort), [`limit`](Cursor::limit) and
/// [`skip`](Cursor::skip), then run it with [`execute`](Cursor::execute) or
/// by iterating. Running consumes the cursor, so a query cannot be refined
/// after it was sent. [`count`](Cursor::count) can be called any number of
/// times before that.
pub struct Cursor<'db, C: Catalog> {
    db: &'db Database<C>,
    mapping: FieldMapping,
    fields: Vec<OutputField>,
    select: Select,
}

impl<'db, C: Catalog> Cursor<'db, C> {
    pub(crate) fn new(
        db: &'db Database<C>,
        mapping: FieldMapping,
        fields: Vec<OutputField>,
        select: Select,
    ) -> Self {
        Self {
            db,
            mapping,
            fields,
            select,
        }
    }

    /// Append a sort key. `direction` is `1` (ascending) or `-1` (descending).
    pub fn sort(mut self, key: &str, direction: i32) -> Result<Self, DbError> {
        let direction = SortDirection::try_from(direction)?;
        let column = self.mapping.resolve(key)?.column.clone();
        self.select.sort.push(SortKey { column, direction });
        Ok(self)
    }

    /// Append several sort keys, pairing `keys` and `directions` by position.
    pub fn sort_by(mut self, keys: &[&str], directions: &[i32]) -> Result<Self, DbError> {
        if keys.len() != directions.len() {
            return Err(DbError::Usage(format!(
                "{} sort keys but {} directions",
                keys.len(),
                directions.len()
            )));
        }
        for (key, direction) in keys.iter().zip(directions) {
            self = self.sort(key, *direction)?;
        }
        Ok(self)
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.select.limit = Some(n);
        self
    }

    pub fn skip(mut self, n: u64) -> Self {
        self.select.offset = Some(n);
        self
    }

    /// Count matching rows. Limit and skip only apply when
    /// `with_limit_and_skip` is set.
    pub fn count(&self, with_limit_and_skip: bool) -> Result<u64, DbError> {
        let stmt = Statement::Count(self.select.to_count(with_limit_and_skip));
        match self.db.execute(&stmt)? {
            Outcome::Count(n) => Ok(n),
            other => Err(unexpected(&stmt, other)),
        }
    }

    /// The statement that will be sent.
    pub fn statement(&self) -> &Select {
        &self.select
    }

    /// Send the query and return its documents.
    pub fn execute(self) -> Result<Documents, DbError> {
        let stmt = Statement::Select(self.select);
        match self.db.execute(&stmt)? {
            Outcome::Rows(set) => Ok(Documents::new(self.fields, set.rows)),
            other => Err(unexpected(&stmt, other)),
        }
    }
}

impl<C: Catalog> IntoIterator for Cursor<'_, C> {
    type Item = Result<Document, DbError>;
    type IntoIter = Documents;

    /// Execution failures surface as the only item.
    fn into_iter(self) -> Documents {
        match self.execute() {
            Ok(docs) => docs,
            Err(e) => Documents::failed(e),
        }
    }
}

enum State {
    Draining(std::vec::IntoIter<Row>),
    Failed(DbError),
    Exhausted,
}

/// Documents of an executed query, materialized one row at a time.
///
/// Single pass: once exhausted (or after an error) it yields nothing more.
pub struct Documents {
    fields: Vec<OutputField>,
    state: State,
}

impl Documents {
    fn new(fields: Vec<OutputField>, rows: Vec<Row>) -> Self {
        Self {
            fields,
            state: State::Draining(rows.into_iter()),
        }
    }

    fn failed(error: DbError) -> Self {
        Self {
            fields: Vec::new(),
            state: State::Failed(error),
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self.state, State::Exhausted)
    }
}

impl Iterator for Documents {
    type Item = Result<Document, DbError>;

    fn next(&mut self) -> Option<Self::Item> {
        match mem::replace(&mut self.state, State::Exhausted) {
            State::Draining(mut rows) => {
                let row = rows.next()?;
                let doc = materialize::materialize(&self.fields, row);
                if doc.is_ok() {
                    self.state = State::Draining(rows);
                }
                Some(doc)
            }
            State::Failed(e) => Some(Err(e)),
            State::Exhausted => None,
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match &self.state {
            State::Draining(rows) => (0, Some(rows.len())),
            State::Failed(_) => (1, Some(1)),
            State::Exhausted => (0, Some(0)),
        }
    }
}

impl FusedIterator for Documents {}
