use std::cmp::Ordering;
use std::collections::BTreeSet;

use bson::Bson;
use regex::Regex;
use sqlcoll_query::{
    ColumnRef, Delete, Expression, Insert, Join, LogicalOp, Operand, Operator, Select,
    SortDirection, Update,
};

use crate::catalog::{Outcome, Row, RowSet};
use crate::error::CatalogError;

use super::store::{MemoryTable, Tables};
use super::value;

/// Position of a column inside a joined tuple: (source index, column index).
type Slot = (usize, usize);

/// One combination of joined rows, one row index per source.
type Tuple = Vec<usize>;

/// The root table plus its joined sources, in join order.
struct Scope<'a> {
    sources: Vec<(&'a str, &'a MemoryTable)>,
}

impl<'a> Scope<'a> {
    fn new(tables: &'a Tables, root: &'a str, joins: &'a [Join]) -> Result<Self, CatalogError> {
        let mut sources = vec![(root, tables.get(root)?)];
        for join in joins {
            if sources.iter().any(|(alias, _)| *alias == join.alias) {
                return Err(CatalogError::Unsupported(format!(
                    "duplicate source alias: {}",
                    join.alias
                )));
            }
            sources.push((join.alias.as_str(), tables.get(&join.table)?));
        }
        Ok(Self { sources })
    }

    fn resolve(&self, column: &ColumnRef, bound: usize) -> Result<Slot, CatalogError> {
        let unknown = || CatalogError::UnknownColumn {
            source_name: column.source.clone(),
            column: column.column.clone(),
        };
        let source = self.sources[..bound]
            .iter()
            .position(|(alias, _)| *alias == column.source)
            .ok_or_else(unknown)?;
        let index = self.sources[source]
            .1
            .descriptor
            .column_index(&column.column)
            .ok_or_else(unknown)?;
        Ok((source, index))
    }

    fn value(&self, tuple: &[usize], (source, column): Slot) -> &'a Bson {
        &self.sources[source].1.rows[tuple[source]][column]
    }

    /// Every tuple of the inner join, in root-row order.
    fn join(&self, joins: &[Join]) -> Result<Vec<Tuple>, CatalogError> {
        let mut tuples: Vec<Tuple> = (0..self.sources[0].1.rows.len()).map(|i| vec![i]).collect();

        for (i, join) in joins.iter().enumerate() {
            let source = i + 1;
            let local = self.resolve(&join.local, source)?;
            let (_, foreign_column) = self.resolve(&join.foreign, source + 1)?;
            let rows = &self.sources[source].1.rows;

            let mut next = Vec::with_capacity(tuples.len());
            for tuple in tuples {
                let key = self.value(&tuple, local);
                for (r, row) in rows.iter().enumerate() {
                    if value::equals(key, &row[foreign_column]) {
                        let mut extended = tuple.clone();
                        extended.push(r);
                        next.push(extended);
                    }
                }
            }
            tuples = next;
        }
        Ok(tuples)
    }

    fn compile(&self, expr: &Expression) -> Result<Predicate, CatalogError> {
        let bound = self.sources.len();
        match expr {
            Expression::Compare {
                column,
                op,
                operand,
            } => {
                let lhs = self.resolve(column, bound)?;
                let rhs = match operand {
                    Operand::Value(v) => Rhs::Value(v.clone()),
                    Operand::Column(c) => Rhs::Column(self.resolve(c, bound)?),
                };
                let pattern = match (op, operand) {
                    (Operator::Like, Operand::Value(Bson::String(p))) => {
                        Some(compile_regex(&value::like_to_regex(p))?)
                    }
                    (Operator::Regex, Operand::Value(Bson::String(p))) => Some(compile_regex(p)?),
                    (Operator::Like | Operator::Regex, _) => {
                        return Err(CatalogError::InvalidPattern(format!(
                            "{} expects a string pattern",
                            op.key()
                        )));
                    }
                    _ => None,
                };
                Ok(Predicate::Compare {
                    lhs,
                    op: *op,
                    rhs,
                    pattern,
                })
            }
            Expression::Group { logical, children } => Ok(Predicate::Group {
                logical: *logical,
                children: children
                    .iter()
                    .map(|child| self.compile(child))
                    .collect::<Result<_, _>>()?,
            }),
        }
    }

    /// Joined tuples that satisfy `predicate`.
    fn matching(
        &self,
        joins: &[Join],
        predicate: Option<&Expression>,
    ) -> Result<Vec<Tuple>, CatalogError> {
        let tuples = self.join(joins)?;
        match predicate {
            None => Ok(tuples),
            Some(expr) => {
                let predicate = self.compile(expr)?;
                Ok(tuples
                    .into_iter()
                    .filter(|t| predicate.eval(self, t))
                    .collect())
            }
        }
    }
}

fn compile_regex(pattern: &str) -> Result<Regex, CatalogError> {
    Regex::new(pattern).map_err(|e| CatalogError::InvalidPattern(e.to_string()))
}

enum Rhs {
    Value(Bson),
    Column(Slot),
}

enum Predicate {
    Compare {
        lhs: Slot,
        op: Operator,
        rhs: Rhs,
        pattern: Option<Regex>,
    },
    Group {
        logical: LogicalOp,
        children: Vec<Predicate>,
    },
}

impl Predicate {
    fn eval(&self, scope: &Scope<'_>, tuple: &[usize]) -> bool {
        match self {
            Predicate::Group { logical, children } => match logical {
                LogicalOp::And => children.iter().all(|c| c.eval(scope, tuple)),
                LogicalOp::Or => children.iter().any(|c| c.eval(scope, tuple)),
            },
            Predicate::Compare {
                lhs,
                op,
                rhs,
                pattern,
            } => {
                let left = scope.value(tuple, *lhs);
                let right = match rhs {
                    Rhs::Value(v) => v,
                    Rhs::Column(slot) => scope.value(tuple, *slot),
                };
                compare_op(left, *op, right, pattern.as_ref())
            }
        }
    }
}

fn compare_op(left: &Bson, op: Operator, right: &Bson, pattern: Option<&Regex>) -> bool {
    let is_null = matches!(left, Bson::Null);
    match op {
        Operator::Eq if matches!(right, Bson::Null) => is_null,
        Operator::Ne if matches!(right, Bson::Null) => !is_null,
        Operator::Eq => value::equals(left, right),
        Operator::Ne => !is_null && !value::equals(left, right),
        Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte => {
            if is_null {
                return false;
            }
            match value::compare(left, right) {
                Some(ord) => match op {
                    Operator::Gt => ord == Ordering::Greater,
                    Operator::Gte => ord != Ordering::Less,
                    Operator::Lt => ord == Ordering::Less,
                    _ => ord != Ordering::Greater,
                },
                None => false,
            }
        }
        Operator::Like | Operator::Regex => match (left, pattern) {
            (Bson::String(s), Some(re)) => re.is_match(s),
            _ => false,
        },
    }
}

// ── Reads ───────────────────────────────────────────────────────

pub(crate) fn select(tables: &Tables, select: &Select) -> Result<RowSet, CatalogError> {
    let scope = Scope::new(tables, &select.table, &select.joins)?;
    let mut tuples = scope.matching(&select.joins, select.predicate.as_ref())?;

    if !select.sort.is_empty() {
        let keys = select
            .sort
            .iter()
            .map(|key| Ok((scope.resolve(&key.column, scope.sources.len())?, key.direction)))
            .collect::<Result<Vec<_>, CatalogError>>()?;
        tuples.sort_by(|a, b| {
            for (slot, direction) in &keys {
                let ord = value::sort_cmp(scope.value(a, *slot), scope.value(b, *slot));
                let ord = match direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
    }

    let slots = select
        .fields
        .iter()
        .map(|field| scope.resolve(&field.column, scope.sources.len()))
        .collect::<Result<Vec<_>, _>>()?;

    let rows = page(tuples.into_iter(), select)
        .map(|tuple| {
            slots
                .iter()
                .map(|slot| scope.value(&tuple, *slot).clone())
                .collect::<Row>()
        })
        .collect();
    Ok(RowSet { rows })
}

pub(crate) fn count(tables: &Tables, select: &Select) -> Result<u64, CatalogError> {
    let scope = Scope::new(tables, &select.table, &select.joins)?;
    let tuples = scope.matching(&select.joins, select.predicate.as_ref())?;
    Ok(page(tuples.into_iter(), select).count() as u64)
}

fn page<I: Iterator<Item = Tuple>>(iter: I, select: &Select) -> impl Iterator<Item = Tuple> {
    let skip = select.offset.unwrap_or(0) as usize;
    let take = select.limit.map_or(usize::MAX, |n| n as usize);
    iter.skip(skip).take(take)
}

/// Root-row indices matched by a mutation's joins and predicate.
fn matched_rows(
    tables: &Tables,
    table: &str,
    joins: &[Join],
    predicate: &Expression,
) -> Result<BTreeSet<usize>, CatalogError> {
    let scope = Scope::new(tables, table, joins)?;
    let predicate = predicate.clone().into_predicate();
    Ok(scope
        .matching(joins, predicate.as_ref())?
        .into_iter()
        .map(|tuple| tuple[0])
        .collect())
}

// ── Writes ──────────────────────────────────────────────────────

pub(crate) fn insert(tables: &mut Tables, insert: &Insert) -> Result<Outcome, CatalogError> {
    let table = tables.get_mut(&insert.table)?;
    let descriptor = &table.descriptor;
    let mut row: Row = vec![Bson::Null; descriptor.columns.len()];

    for (column, value) in &insert.values {
        let index = descriptor
            .column_index(column)
            .ok_or_else(|| CatalogError::UnknownColumn {
                source_name: insert.table.clone(),
                column: column.clone(),
            })?;
        row[index] = value.clone();
    }

    let pk = descriptor
        .columns
        .iter()
        .position(|c| c.primary_key);
    if let Some(pk) = pk {
        let generated = matches!(row[pk], Bson::Null)
            && descriptor.columns[pk].ty == crate::schema::ColumnType::Integer;
        if generated {
            let next = table
                .rows
                .iter()
                .filter_map(|r| match r[pk] {
                    Bson::Int32(n) => Some(i64::from(n)),
                    Bson::Int64(n) => Some(n),
                    _ => None,
                })
                .max()
                .unwrap_or(0)
                + 1;
            row[pk] = Bson::Int64(next);
        } else if table.rows.iter().any(|r| value::equals(&r[pk], &row[pk])) {
            return Err(CatalogError::Constraint(format!(
                "duplicate primary key {} on {}",
                row[pk], insert.table
            )));
        }
    }

    check_not_null(table, &row)?;
    let id = pk.map_or(Bson::Null, |pk| row[pk].clone());
    table.rows.push(row);
    Ok(Outcome::Inserted { id })
}

fn check_not_null(table: &MemoryTable, row: &[Bson]) -> Result<(), CatalogError> {
    for (column, value) in table.descriptor.columns.iter().zip(row) {
        if !column.nullable && matches!(value, Bson::Null) {
            return Err(CatalogError::Constraint(format!(
                "{}.{} cannot be null",
                table.descriptor.name, column.name
            )));
        }
    }
    Ok(())
}

pub(crate) fn update(tables: &mut Tables, update: &Update) -> Result<Outcome, CatalogError> {
    let matched = matched_rows(tables, &update.table, &update.joins, &update.predicate)?;

    let table = tables.get_mut(&update.table)?;
    let mut assignments = Vec::with_capacity(update.assignments.len());
    for assignment in &update.assignments {
        if assignment.column.source != update.table {
            return Err(CatalogError::Unsupported(format!(
                "cannot assign joined column {}",
                assignment.column
            )));
        }
        let index = table
            .descriptor
            .column_index(&assignment.column.column)
            .ok_or_else(|| CatalogError::UnknownColumn {
                source_name: update.table.clone(),
                column: assignment.column.column.clone(),
            })?;
        assignments.push((index, &assignment.value));
    }

    let mut updated = Vec::with_capacity(matched.len());
    for &i in &matched {
        let mut row = table.rows[i].clone();
        for (index, value) in &assignments {
            row[*index] = (*value).clone();
        }
        check_not_null(table, &row)?;
        updated.push((i, row));
    }

    if let Some(pk) = table.descriptor.columns.iter().position(|c| c.primary_key) {
        for (i, row) in &updated {
            let clash = updated
                .iter()
                .any(|(j, other)| j != i && value::equals(&other[pk], &row[pk]))
                || table
                    .rows
                    .iter()
                    .enumerate()
                    .any(|(j, other)| !matched.contains(&j) && value::equals(&other[pk], &row[pk]));
            if clash {
                return Err(CatalogError::Constraint(format!(
                    "duplicate primary key {} on {}",
                    row[pk], update.table
                )));
            }
        }
    }

    let mut modified = 0;
    for (i, row) in updated {
        if table.rows[i] != row {
            table.rows[i] = row;
            modified += 1;
        }
    }
    Ok(Outcome::Updated {
        matched: matched.len() as u64,
        modified,
    })
}

pub(crate) fn delete(tables: &mut Tables, delete: &Delete) -> Result<Outcome, CatalogError> {
    let matched = matched_rows(tables, &delete.table, &delete.joins, &delete.predicate)?;
    let table = tables.get_mut(&delete.table)?;

    let mut index = 0;
    table.rows.retain(|_| {
        let keep = !matched.contains(&index);
        index += 1;
        keep
    });
    Ok(Outcome::Deleted(matched.len() as u64))
}
