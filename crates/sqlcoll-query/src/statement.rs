use bson::Bson;
use serde::{Deserialize, Serialize};

use crate::expression::{ColumnRef, Expression};
use crate::sort::SortKey;

/// One output column of a select, labelled with its dotted document path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectField {
    pub label: String,
    pub column: ColumnRef,
}

/// Inner join of `table AS alias ON local = foreign`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Join {
    pub table: String,
    pub alias: String,
    /// Foreign-key column on the already-joined side.
    pub local: ColumnRef,
    /// Referenced column on `alias`.
    pub foreign: ColumnRef,
}

impl Join {
    pub fn condition(&self) -> Expression {
        Expression::columns_eq(self.local.clone(), self.foreign.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Select {
    /// Root table; root columns use it as their source.
    pub table: String,
    pub fields: Vec<SelectField>,
    pub joins: Vec<Join>,
    pub predicate: Option<Expression>,
    pub sort: Vec<SortKey>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl Select {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            fields: Vec::new(),
            joins: Vec::new(),
            predicate: None,
            sort: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Count-only copy of this select. Sort keys never affect a count;
    /// limit and offset are kept only when asked for.
    pub fn to_count(&self, with_limit_and_skip: bool) -> Select {
        Select {
            table: self.table.clone(),
            fields: Vec::new(),
            joins: self.joins.clone(),
            predicate: self.predicate.clone(),
            sort: Vec::new(),
            limit: if with_limit_and_skip { self.limit } else { None },
            offset: if with_limit_and_skip { self.offset } else { None },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insert {
    pub table: String,
    /// Root-table column name → value, in document order.
    pub values: Vec<(String, Bson)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub column: ColumnRef,
    pub value: Bson,
}

/// Update of the root table's rows. `predicate` already carries the join
/// equalities; `joins` name the extra tables it refers to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    pub table: String,
    pub joins: Vec<Join>,
    pub predicate: Expression,
    pub assignments: Vec<Assignment>,
}

/// Delete of the root table's rows, shaped like [`Update`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delete {
    pub table: String,
    pub joins: Vec<Join>,
    pub predicate: Expression,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Statement {
    Select(Select),
    Count(Select),
    Insert(Insert),
    Update(Update),
    Delete(Delete),
}

impl Statement {
    pub fn table(&self) -> &str {
        match self {
            Statement::Select(s) | Statement::Count(s) => &s.table,
            Statement::Insert(i) => &i.table,
            Statement::Update(u) => &u.table,
            Statement::Delete(d) => &d.table,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Statement::Select(_) => "select",
            Statement::Count(_) => "count",
            Statement::Insert(_) => "insert",
            Statement::Update(_) => "update",
            Statement::Delete(_) => "delete",
        }
    }
}
