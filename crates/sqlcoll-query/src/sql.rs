//! Render statements as parameterized SQL text.
//!
//! Identifiers are double-quoted, literals become `?` placeholders collected
//! in order. Joined updates and deletes use the `UPDATE .. FROM` and
//! `DELETE .. USING` forms; regular-expression matches render as `REGEXP`.

use bson::Bson;

use crate::expression::{ColumnRef, Expression, Operand};
use crate::operator::Operator;
use crate::sort::SortDirection;
use crate::statement::{Join, Select, Statement};

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedSql {
    pub sql: String,
    pub params: Vec<Bson>,
}

pub fn render(stmt: &Statement) -> RenderedSql {
    let mut w = Writer::default();
    match stmt {
        Statement::Select(select) => w.select(select),
        Statement::Count(select) => w.count(select),
        Statement::Insert(insert) => {
            w.push("INSERT INTO ");
            w.ident(&insert.table);
            w.push(" (");
            for (i, (column, _)) in insert.values.iter().enumerate() {
                if i > 0 {
                    w.push(", ");
                }
                w.ident(column);
            }
            w.push(") VALUES (");
            for (i, (_, value)) in insert.values.iter().enumerate() {
                if i > 0 {
                    w.push(", ");
                }
                w.param(value.clone());
            }
            w.push(")");
        }
        Statement::Update(update) => {
            w.push("UPDATE ");
            w.ident(&update.table);
            w.push(" SET ");
            for (i, assignment) in update.assignments.iter().enumerate() {
                if i > 0 {
                    w.push(", ");
                }
                if assignment.column.source == update.table {
                    w.ident(&assignment.column.column);
                } else {
                    w.column(&assignment.column);
                }
                w.push(" = ");
                w.param(assignment.value.clone());
            }
            w.sources(" FROM ", &update.joins);
            w.filter(Some(&update.predicate));
        }
        Statement::Delete(delete) => {
            w.push("DELETE FROM ");
            w.ident(&delete.table);
            w.sources(" USING ", &delete.joins);
            w.filter(Some(&delete.predicate));
        }
    }
    RenderedSql {
        sql: w.sql,
        params: w.params,
    }
}

#[derive(Default)]
struct Writer {
    sql: String,
    params: Vec<Bson>,
}

impl Writer {
    fn push(&mut self, s: &str) {
        self.sql.push_str(s);
    }

    fn ident(&mut self, name: &str) {
        self.sql.push('"');
        self.sql.push_str(&name.replace('"', "\"\""));
        self.sql.push('"');
    }

    fn column(&mut self, column: &ColumnRef) {
        self.ident(&column.source);
        self.push(".");
        self.ident(&column.column);
    }

    fn param(&mut self, value: Bson) {
        self.params.push(value);
        self.push("?");
    }

    fn select(&mut self, select: &Select) {
        self.push("SELECT ");
        if select.fields.is_empty() {
            self.push("*");
        }
        for (i, field) in select.fields.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.column(&field.column);
            self.push(" AS ");
            self.ident(&field.label);
        }
        self.from(select);
        self.filter(select.predicate.as_ref());
        if !select.sort.is_empty() {
            self.push(" ORDER BY ");
            for (i, key) in select.sort.iter().enumerate() {
                if i > 0 {
                    self.push(", ");
                }
                self.column(&key.column);
                self.push(match key.direction {
                    SortDirection::Asc => " ASC",
                    SortDirection::Desc => " DESC",
                });
            }
        }
        self.paging(select);
    }

    fn count(&mut self, select: &Select) {
        if select.limit.is_none() && select.offset.is_none() {
            self.push("SELECT COUNT(*)");
            self.from(select);
            self.filter(select.predicate.as_ref());
            return;
        }
        self.push("SELECT COUNT(*) FROM (SELECT 1");
        self.from(select);
        self.filter(select.predicate.as_ref());
        self.paging(select);
        self.push(") AS ");
        self.ident("counted");
    }

    fn from(&mut self, select: &Select) {
        self.push(" FROM ");
        self.ident(&select.table);
        for join in &select.joins {
            self.push(" JOIN ");
            self.aliased(join);
            self.push(" ON ");
            self.column(&join.local);
            self.push(" = ");
            self.column(&join.foreign);
        }
    }

    fn aliased(&mut self, join: &Join) {
        self.ident(&join.table);
        self.push(" AS ");
        self.ident(&join.alias);
    }

    fn sources(&mut self, keyword: &str, joins: &[Join]) {
        for (i, join) in joins.iter().enumerate() {
            self.push(if i == 0 { keyword } else { ", " });
            self.aliased(join);
        }
    }

    fn filter(&mut self, predicate: Option<&Expression>) {
        if let Some(expr) = predicate.filter(|e| !e.is_empty()) {
            self.push(" WHERE ");
            self.expression(expr);
        }
    }

    fn paging(&mut self, select: &Select) {
        if let Some(limit) = select.limit {
            self.push(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = select.offset {
            self.push(&format!(" OFFSET {offset}"));
        }
    }

    fn expression(&mut self, expr: &Expression) {
        match expr {
            Expression::Compare {
                column,
                op,
                operand,
            } => {
                self.column(column);
                match (op, operand) {
                    (Operator::Eq, Operand::Value(Bson::Null)) => self.push(" IS NULL"),
                    (Operator::Ne, Operand::Value(Bson::Null)) => self.push(" IS NOT NULL"),
                    (op, Operand::Value(value)) => {
                        self.push(" ");
                        self.push(op.symbol());
                        self.push(" ");
                        self.param(value.clone());
                    }
                    (op, Operand::Column(other)) => {
                        self.push(" ");
                        self.push(op.symbol());
                        self.push(" ");
                        self.column(other);
                    }
                }
            }
            Expression::Group { logical, children } => {
                if children.is_empty() {
                    self.push("1 = 1");
                    return;
                }
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        self.push(" ");
                        self.push(logical.symbol());
                        self.push(" ");
                    }
                    if matches!(child, Expression::Group { .. }) {
                        self.push("(");
                        self.expression(child);
                        self.push(")");
                    } else {
                        self.expression(child);
                    }
                }
            }
        }
    }
}
