use std::sync::Arc;

use bson::{Bson, Document};
use sqlcoll_catalog::TableDescriptor;
use sqlcoll_query::path;
use sqlcoll_query::{
    Assignment, Delete, Expression, Insert, Join, LookupDescriptor, Projection, Select,
    SelectField, Update,
};
use tracing::{debug, warn};

use crate::config::FilterMode;
use crate::error::DbError;
use crate::mapping::FieldMapping;
use crate::materialize::OutputField;
use crate::parse_filter::FilterCompiler;

/// A compiled find: the select statement and how to read its rows back.
#[derive(Debug, Clone)]
pub struct FindPlan {
    pub select: Select,
    pub fields: Vec<OutputField>,
}

/// Compiles document operations against one root table and its lookups.
pub struct Planner {
    root: Arc<TableDescriptor>,
    mapping: FieldMapping,
    joins: Vec<Join>,
    mode: FilterMode,
}

impl Planner {
    /// Resolve `lookups` through `resolve` and build the field mapping.
    pub fn new<F>(
        root: Arc<TableDescriptor>,
        lookups: &[LookupDescriptor],
        mode: FilterMode,
        resolve: F,
    ) -> Result<Self, DbError>
    where
        F: Fn(&str) -> Result<Arc<TableDescriptor>, DbError>,
    {
        let (mapping, joins) = FieldMapping::build(&root, lookups, resolve)?;
        Ok(Self {
            root,
            mapping,
            joins,
            mode,
        })
    }

    pub fn into_mapping(self) -> FieldMapping {
        self.mapping
    }

    pub fn predicate(&self, filter: &Document) -> Result<Expression, DbError> {
        FilterCompiler::new(&self.mapping, self.mode).compile_document(filter)
    }

    // ── Reads ───────────────────────────────────────────────────

    /// Select every mapped field the projection keeps, labelled by its path.
    pub fn find(
        &self,
        filter: &Document,
        projection: Option<&Projection>,
    ) -> Result<FindPlan, DbError> {
        let predicate = self.predicate(filter)?;

        let mut candidates: Vec<_> = self.mapping.iter().collect();
        if let Some(projection) = projection {
            candidates = projection.apply(candidates, |(path, _)| *path);
        }

        let mut select = Select::new(&self.root.name);
        let mut fields = Vec::with_capacity(candidates.len());
        for (path, binding) in candidates {
            select.fields.push(SelectField {
                label: path.to_string(),
                column: binding.column.clone(),
            });
            fields.push(OutputField::new(path, binding.ty));
        }
        select.joins = self.joins.clone();
        select.predicate = predicate.into_predicate();

        Ok(FindPlan { select, fields })
    }

    // ── Writes ──────────────────────────────────────────────────

    /// Keep the document keys that write a root-table column.
    pub fn insert(&self, document: &Document) -> Result<Insert, DbError> {
        let mut values: Vec<(String, Bson)> = Vec::new();
        for (key, value) in path::flatten(document) {
            let target = self
                .mapping
                .get(&key)
                .and_then(|binding| binding.write_target(&self.root.name));
            let Some(target) = target else {
                debug!(field = %key, table = %self.root.name, "not a writable field, ignored");
                continue;
            };
            if values.iter().any(|(column, _)| *column == target.column) {
                return Err(DbError::Usage(format!(
                    "{key} writes {target}, which is already set"
                )));
            }
            values.push((target.column.clone(), value));
        }
        Ok(Insert {
            table: self.root.name.clone(),
            values,
        })
    }

    /// Only `$set` is supported. Joined-table fields are passed through as
    /// joined assignments; catalogs may reject them.
    pub fn update(&self, filter: &Document, update: &Document) -> Result<Update, DbError> {
        if let Some(op) = update.keys().find(|k| *k != "$set") {
            return Err(DbError::Usage(format!("unsupported update operator: {op}")));
        }
        let set = match update.get("$set") {
            Some(Bson::Document(set)) => set,
            Some(other) => {
                return Err(DbError::Usage(format!(
                    "$set expects a document, got {other}"
                )));
            }
            None => return Err(DbError::Usage("update requires $set".into())),
        };

        let predicate = self.guarded_predicate(filter, "update")?;

        let mut assignments = Vec::new();
        for (key, value) in path::flatten(set) {
            let binding = self.mapping.resolve(&key)?;
            let column = match binding.write_target(&self.root.name) {
                Some(column) => column.clone(),
                None => {
                    warn!(field = %key, column = %binding.column, "update assigns a joined column");
                    binding.column.clone()
                }
            };
            assignments.push(Assignment { column, value });
        }
        if assignments.is_empty() {
            return Err(DbError::Usage("$set has no fields".into()));
        }

        Ok(Update {
            table: self.root.name.clone(),
            joins: self.joins.clone(),
            predicate,
            assignments,
        })
    }

    pub fn delete(&self, filter: &Document) -> Result<Delete, DbError> {
        Ok(Delete {
            table: self.root.name.clone(),
            joins: self.joins.clone(),
            predicate: self.guarded_predicate(filter, "delete")?,
        })
    }

    /// Mutations refuse an empty filter. The join equalities are ANDed in so
    /// joined sources only restrict the matched rows.
    fn guarded_predicate(&self, filter: &Document, verb: &str) -> Result<Expression, DbError> {
        let predicate = self.predicate(filter)?;
        if predicate.is_empty() {
            return Err(DbError::Filter(format!(
                "refusing to {verb} {} without a filter",
                self.root.name
            )));
        }
        let mut parts: Vec<Expression> = self.joins.iter().map(Join::condition).collect();
        parts.push(predicate);
        Ok(Expression::and(parts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use sqlcoll_catalog::ColumnType;
    use sqlcoll_query::{ColumnRef, Operator};

    fn tables() -> Vec<Arc<TableDescriptor>> {
        vec![
            Arc::new(
                TableDescriptor::new("project")
                    .primary_key("id", ColumnType::Integer)
                    .required_column("name", ColumnType::String)
                    .column("client", ColumnType::Integer)
                    .foreign_key("client", "client", "id"),
            ),
            Arc::new(
                TableDescriptor::new("client")
                    .primary_key("id", ColumnType::Integer)
                    .required_column("name", ColumnType::String),
            ),
        ]
    }

    fn planner(lookups: Vec<LookupDescriptor>) -> Planner {
        let tables = tables();
        let resolve = move |name: &str| {
            tables
                .iter()
                .find(|t| t.name == name)
                .cloned()
                .ok_or_else(|| DbError::Schema(name.to_string()))
        };
        let root = resolve("project").unwrap();
        Planner::new(root, &lookups, FilterMode::Strict, resolve).unwrap()
    }

    fn with_client() -> Planner {
        planner(vec![LookupDescriptor::new(
            "project", "client", "client", "id", "client",
        )])
    }

    fn labels(plan: &FindPlan) -> Vec<&str> {
        plan.select.fields.iter().map(|f| f.label.as_str()).collect()
    }

    #[test]
    fn find_selects_mapping_in_order() {
        let plan = with_client().find(&doc! {}, None).unwrap();
        assert_eq!(labels(&plan), vec!["id", "name", "client.id", "client.name"]);
        assert_eq!(plan.select.joins.len(), 1);
        assert!(plan.select.predicate.is_none());
        assert_eq!(plan.fields[2], OutputField::new("client.id", ColumnType::Integer));
    }

    #[test]
    fn find_applies_projection() {
        let planner = with_client();
        let include = Projection::parse(&doc! { "client": 1 }).unwrap().unwrap();
        let plan = planner.find(&doc! {}, Some(&include)).unwrap();
        assert_eq!(labels(&plan), vec!["client.id", "client.name"]);

        let exclude = Projection::parse(&doc! { "name": -1 }).unwrap().unwrap();
        let plan = planner.find(&doc! {}, Some(&exclude)).unwrap();
        assert_eq!(labels(&plan), vec!["id", "client.id", "client.name"]);

        let partial = Projection::parse(&doc! { "cli": 1 }).unwrap().unwrap();
        let plan = planner.find(&doc! {}, Some(&partial)).unwrap();
        assert_eq!(labels(&plan), vec!["client.id", "client.name"]);
    }

    #[test]
    fn find_with_projection_matching_nothing_selects_no_fields() {
        let nothing = Projection::parse(&doc! { "missing": 1 }).unwrap().unwrap();
        let plan = with_client().find(&doc! {}, Some(&nothing)).unwrap();
        assert!(plan.select.fields.is_empty());
        assert!(plan.fields.is_empty());
        assert_eq!(plan.select.joins.len(), 1);
    }

    #[test]
    fn insert_keeps_writable_keys() {
        let insert = with_client()
            .insert(&doc! {
                "name": "new project",
                "client": { "id": 5, "name": "ignored" },
                "unknown": true
            })
            .unwrap();
        assert_eq!(insert.table, "project");
        assert_eq!(
            insert.values,
            vec![
                ("name".to_string(), Bson::from("new project")),
                ("client".to_string(), Bson::Int32(5)),
            ]
        );
    }

    #[test]
    fn update_requires_filter_and_set() {
        let planner = with_client();
        let err = planner
            .update(&doc! {}, &doc! { "$set": { "name": "x" } })
            .unwrap_err();
        assert!(matches!(err, DbError::Filter(_)), "{err}");

        assert!(matches!(
            planner.update(&doc! { "id": 1 }, &doc! { "name": "x" }),
            Err(DbError::Usage(_))
        ));
        assert!(matches!(
            planner.update(
                &doc! { "id": 1 },
                &doc! { "$set": { "name": "x" }, "$inc": { "id": 1 } }
            ),
            Err(DbError::Usage(_))
        ));
        assert!(matches!(
            planner.update(&doc! { "id": 1 }, &doc! { "$set": {} }),
            Err(DbError::Usage(_))
        ));
    }

    #[test]
    fn update_guards_with_join_equalities() {
        let update = with_client()
            .update(
                &doc! { "client.name": "Acme" },
                &doc! { "$set": { "name": "renamed", "client.id": 2, "client.name": "Other" } },
            )
            .unwrap();
        assert_eq!(
            update.predicate.to_string(),
            "project.client = client.id AND client.name = 'Acme'"
        );
        assert_eq!(
            update.assignments,
            vec![
                Assignment {
                    column: ColumnRef::new("project", "name"),
                    value: Bson::from("renamed"),
                },
                Assignment {
                    column: ColumnRef::new("project", "client"),
                    value: Bson::Int32(2),
                },
                Assignment {
                    column: ColumnRef::new("client", "name"),
                    value: Bson::from("Other"),
                },
            ]
        );
    }

    #[test]
    fn delete_without_lookups() {
        let delete = planner(vec![]).delete(&doc! { "id": { "$gte": 3 } }).unwrap();
        assert!(delete.joins.is_empty());
        assert_eq!(
            delete.predicate,
            Expression::compare(ColumnRef::new("project", "id"), Operator::Gte, 3)
        );
        assert!(matches!(
            planner(vec![]).delete(&doc! {}),
            Err(DbError::Filter(_))
        ));
    }
}
