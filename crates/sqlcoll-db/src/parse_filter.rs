use bson::{Bson, Document};
use regex::Regex;
use sqlcoll_query::{Expression, LogicalOp, Operator};
use tracing::debug;

use crate::config::FilterMode;
use crate::error::DbError;
use crate::mapping::FieldMapping;

/// Compiles document filters into predicate expressions over a field mapping.
///
/// A filter is a document or a list of documents. Every key of every document
/// contributes one child to the ambient conjunction (`AND` at the top level):
///
/// - a mapped field with a document value opens a nested scope on that field,
///   any other value compares for equality (`null` becomes `IS NULL`);
/// - a key that is a prefix of mapped fields continues the path, so
///   `{"project": {"client.id": 1}}` addresses `project.client.id`;
/// - `$eq $ne $gt $gte $lt $lte $like $regex` compare the enclosing field,
///   `$options` supplies `$regex` flags;
/// - `$and` / `$or` take a list and produce a nested group.
pub struct FilterCompiler<'m> {
    mapping: &'m FieldMapping,
    mode: FilterMode,
}

impl<'m> FilterCompiler<'m> {
    pub fn new(mapping: &'m FieldMapping, mode: FilterMode) -> Self {
        Self { mapping, mode }
    }

    pub fn compile(&self, filter: &Bson) -> Result<Expression, DbError> {
        self.compile_node(filter, None, LogicalOp::And)
    }

    pub fn compile_document(&self, filter: &Document) -> Result<Expression, DbError> {
        self.compile_filters(&[filter], None, LogicalOp::And)
    }

    fn compile_node(
        &self,
        node: &Bson,
        parent: Option<&str>,
        logical: LogicalOp,
    ) -> Result<Expression, DbError> {
        match node {
            Bson::Document(doc) => self.compile_filters(&[doc], parent, logical),
            Bson::Array(items) => {
                let docs = items
                    .iter()
                    .map(|item| match item {
                        Bson::Document(doc) => Ok(doc),
                        other => Err(DbError::Filter(format!(
                            "expected a filter document, got {other}"
                        ))),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                self.compile_filters(&docs, parent, logical)
            }
            other => Err(DbError::Filter(format!(
                "expected a filter document or list, got {other}"
            ))),
        }
    }

    fn compile_filters(
        &self,
        docs: &[&Document],
        parent: Option<&str>,
        logical: LogicalOp,
    ) -> Result<Expression, DbError> {
        let mut children = Vec::new();
        for doc in docs {
            for (key, value) in doc.iter() {
                if let Some(expr) = self.compile_entry(doc, key, value, parent)? {
                    children.push(expr);
                }
            }
        }
        Ok(Expression::group(logical, children))
    }

    fn compile_entry(
        &self,
        doc: &Document,
        key: &str,
        value: &Bson,
        parent: Option<&str>,
    ) -> Result<Option<Expression>, DbError> {
        match key {
            "$and" | "$or" => {
                let logical = if key == "$and" {
                    LogicalOp::And
                } else {
                    LogicalOp::Or
                };
                match value {
                    Bson::Array(_) => self.compile_node(value, parent, logical).map(Some),
                    _ => self.unrecognized(key, "expects a list"),
                }
            }
            "$options" => {
                if doc.contains_key("$regex") {
                    Ok(None)
                } else {
                    Err(DbError::Filter("$options without $regex".into()))
                }
            }
            k if k.starts_with('$') => match Operator::from_key(k) {
                Some(op) => self.compile_operator(doc, op, value, parent).map(Some),
                None => self.unrecognized(key, "is not a known operator"),
            },
            _ => {
                let path = match parent {
                    Some(parent) => format!("{parent}.{key}"),
                    None => key.to_string(),
                };
                if let Some(binding) = self.mapping.get(&path) {
                    return match value {
                        Bson::Document(_) => self
                            .compile_node(value, Some(&path), LogicalOp::And)
                            .map(Some),
                        Bson::Array(_) => Err(DbError::Filter(format!(
                            "{path}: cannot compare with a list"
                        ))),
                        _ => Ok(Some(Expression::compare(
                            binding.column.clone(),
                            Operator::Eq,
                            value.clone(),
                        ))),
                    };
                }
                if self.mapping.is_prefix(&path) && matches!(value, Bson::Document(_)) {
                    return self
                        .compile_node(value, Some(&path), LogicalOp::And)
                        .map(Some);
                }
                self.unrecognized(&path, "is not a known field")
            }
        }
    }

    fn compile_operator(
        &self,
        doc: &Document,
        op: Operator,
        value: &Bson,
        parent: Option<&str>,
    ) -> Result<Expression, DbError> {
        let Some(path) = parent else {
            return Err(DbError::Filter(format!(
                "{} must be nested under a field",
                op.key()
            )));
        };
        let binding = self.mapping.get(path).ok_or_else(|| {
            DbError::Filter(format!("{} applies to {path}, which is not a field", op.key()))
        })?;

        let operand = match op {
            Operator::Like => Bson::String(pattern(op, value)?.to_string()),
            Operator::Regex => Bson::String(regex_pattern(doc, value)?),
            _ => match value {
                Bson::Document(_) | Bson::Array(_) => {
                    return Err(DbError::Filter(format!(
                        "{path}: {} expects a scalar, got {value}",
                        op.key()
                    )));
                }
                other => other.clone(),
            },
        };
        Ok(Expression::compare(binding.column.clone(), op, operand))
    }

    fn unrecognized(&self, key: &str, reason: &str) -> Result<Option<Expression>, DbError> {
        match self.mode {
            FilterMode::Strict => Err(DbError::Filter(format!("{key} {reason}"))),
            FilterMode::Lenient => {
                debug!(key, reason, "ignoring filter key");
                Ok(None)
            }
        }
    }
}

fn pattern(op: Operator, value: &Bson) -> Result<&str, DbError> {
    match value {
        Bson::String(s) => Ok(s),
        other => Err(DbError::Filter(format!(
            "{} expects a string pattern, got {other}",
            op.key()
        ))),
    }
}

/// `$regex` pattern with its `$options` sibling folded in as inline flags.
fn regex_pattern(doc: &Document, value: &Bson) -> Result<String, DbError> {
    let pat = pattern(Operator::Regex, value)?;
    let full = match doc.get("$options") {
        None => pat.to_string(),
        Some(Bson::String(opts)) if opts.is_empty() => pat.to_string(),
        Some(Bson::String(opts)) => {
            let mut full = String::with_capacity(3 + opts.len() + pat.len());
            full.push_str("(?");
            for ch in opts.chars() {
                match ch {
                    'i' | 'm' | 's' | 'x' => full.push(ch),
                    c => return Err(DbError::Filter(format!("unknown regex option: {c}"))),
                }
            }
            full.push(')');
            full.push_str(pat);
            full
        }
        Some(other) => {
            return Err(DbError::Filter(format!(
                "$options must be a string, got {other}"
            )));
        }
    };
    Regex::new(&full).map_err(|e| DbError::Filter(format!("invalid regex pattern: {e}")))?;
    Ok(full)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use bson::doc;
    use sqlcoll_catalog::{ColumnType, TableDescriptor};
    use sqlcoll_query::{ColumnRef, LookupDescriptor};

    fn mapping() -> FieldMapping {
        let tables = [
            Arc::new(
                TableDescriptor::new("hour")
                    .primary_key("id", ColumnType::Integer)
                    .column("issue", ColumnType::String)
                    .column("project", ColumnType::Integer)
                    .foreign_key("project", "project", "id"),
            ),
            Arc::new(
                TableDescriptor::new("project")
                    .primary_key("id", ColumnType::Integer)
                    .column("name", ColumnType::String)
                    .column("client", ColumnType::Integer)
                    .foreign_key("client", "client", "id"),
            ),
            Arc::new(
                TableDescriptor::new("client")
                    .primary_key("id", ColumnType::Integer)
                    .column("name", ColumnType::String),
            ),
        ];
        let resolve = |name: &str| {
            tables
                .iter()
                .find(|t| t.name == name)
                .cloned()
                .ok_or_else(|| DbError::Schema(name.to_string()))
        };
        let lookups = [
            LookupDescriptor::new("hour", "project", "project", "id", "project"),
            LookupDescriptor::new("project", "client", "client", "id", "project.client"),
        ];
        FieldMapping::build(&resolve("hour").unwrap(), &lookups, resolve)
            .unwrap()
            .0
    }

    fn compile(filter: Document) -> Result<Expression, DbError> {
        let mapping = mapping();
        FilterCompiler::new(&mapping, FilterMode::Strict).compile_document(&filter)
    }

    fn rendered(filter: Document) -> String {
        compile(filter).unwrap().to_string()
    }

    #[test]
    fn or_of_equalities_keeps_order() {
        let expr = compile(doc! { "$or": [{ "id": 5 }, { "id": 3 }] }).unwrap();
        assert_eq!(
            expr,
            Expression::or(vec![
                Expression::compare(ColumnRef::new("hour", "id"), Operator::Eq, 5),
                Expression::compare(ColumnRef::new("hour", "id"), Operator::Eq, 3),
            ])
        );
        assert_eq!(expr.to_string(), "hour.id = 5 OR hour.id = 3");
    }

    #[test]
    fn operators_under_field_are_anded_in_order() {
        assert_eq!(
            rendered(doc! { "id": { "$gt": 5, "$lt": 10 } }),
            "hour.id > 5 AND hour.id < 10"
        );
    }

    #[test]
    fn every_operator() {
        let expr = compile(doc! { "issue": {
            "$eq": "a", "$ne": "b", "$gte": "c", "$lte": "d", "$like": "e%", "$regex": "^f"
        } })
        .unwrap();
        let ops: Vec<Operator> = match expr {
            Expression::Group { children, .. } => children
                .into_iter()
                .map(|c| match c {
                    Expression::Compare { op, .. } => op,
                    other => panic!("unexpected {other:?}"),
                })
                .collect(),
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(
            ops,
            vec![
                Operator::Eq,
                Operator::Ne,
                Operator::Gte,
                Operator::Lte,
                Operator::Like,
                Operator::Regex
            ]
        );
    }

    #[test]
    fn joined_fields_and_path_continuation() {
        assert_eq!(
            rendered(doc! { "project.client.name": "Acme" }),
            "project.client.name = 'Acme'"
        );
        assert_eq!(
            rendered(doc! { "project": { "client.id": 1 } }),
            "project.client.id = 1"
        );
        assert_eq!(
            rendered(doc! { "project": { "client": { "id": { "$gte": 2 } } } }),
            "project.client.id >= 2"
        );
    }

    #[test]
    fn absorbed_join_key_filters_joined_column() {
        assert_eq!(rendered(doc! { "project.id": 7 }), "project.id = 7");
        assert!(compile(doc! { "project": 7 }).is_err());
    }

    #[test]
    fn null_equality() {
        assert_eq!(rendered(doc! { "issue": null }), "hour.issue IS NULL");
        assert_eq!(
            rendered(doc! { "issue": { "$ne": null } }),
            "hour.issue IS NOT NULL"
        );
    }

    #[test]
    fn nested_groups() {
        assert_eq!(
            rendered(doc! {
                "issue": "x",
                "$or": [{ "id": 1 }, { "id": { "$gt": 10 }, "project.name": "p" }]
            }),
            "hour.issue = 'x' AND (hour.id = 1 OR hour.id > 10 OR project.name = 'p')"
        );
    }

    #[test]
    fn list_input_is_a_conjunction() {
        let mapping = mapping();
        let filter = Bson::Array(vec![
            Bson::Document(doc! { "id": 1 }),
            Bson::Document(doc! { "issue": "x" }),
        ]);
        let expr = FilterCompiler::new(&mapping, FilterMode::Strict)
            .compile(&filter)
            .unwrap();
        assert_eq!(expr.to_string(), "hour.id = 1 AND hour.issue = 'x'");
    }

    #[test]
    fn empty_filter_is_empty_conjunction() {
        let expr = compile(doc! {}).unwrap();
        assert!(expr.is_empty());
        assert!(compile(doc! { "$and": [] }).unwrap().is_empty());
    }

    #[test]
    fn regex_options_become_inline_flags() {
        let expr = compile(doc! { "issue": { "$regex": "^abc", "$options": "i" } }).unwrap();
        assert_eq!(
            expr,
            Expression::compare(ColumnRef::new("hour", "issue"), Operator::Regex, "(?i)^abc")
        );
    }

    #[test]
    fn bad_regex_rejected() {
        assert!(matches!(
            compile(doc! { "issue": { "$regex": "(" } }),
            Err(DbError::Filter(_))
        ));
        assert!(compile(doc! { "issue": { "$regex": "a", "$options": "q" } }).is_err());
        assert!(compile(doc! { "issue": { "$options": "i" } }).is_err());
        assert!(compile(doc! { "issue": { "$like": 5 } }).is_err());
    }

    #[test]
    fn strict_mode_rejects_unknown_keys() {
        let err = compile(doc! { "nope": 1 }).unwrap_err();
        assert!(err.to_string().contains("nope"), "{err}");
        assert!(compile(doc! { "id": { "$in": [1, 2] } }).is_err());
        assert!(compile(doc! { "$gt": 1 }).is_err());
        assert!(compile(doc! { "$or": { "id": 1 } }).is_err());
    }

    #[test]
    fn lenient_mode_skips_unknown_keys() {
        let mapping = mapping();
        let compiler = FilterCompiler::new(&mapping, FilterMode::Lenient);
        let expr = compiler
            .compile_document(&doc! { "nope": 1, "id": 2, "id2": { "$gt": 1 } })
            .unwrap();
        assert_eq!(expr.to_string(), "hour.id = 2");
        assert!(compiler.compile_document(&doc! { "nope": 1 }).unwrap().is_empty());
    }
}
