use std::sync::Arc;

use sqlcoll_catalog::TableDescriptor;
use sqlcoll_query::LookupDescriptor;
use tracing::trace;

use crate::config::CyclePolicy;
use crate::error::DbError;

/// Which joins a call brings in.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Lookup {
    /// Root columns only.
    #[default]
    None,
    Explicit(Vec<LookupDescriptor>),
    /// Follow foreign keys this many levels deep.
    Auto(usize),
}

impl From<Vec<LookupDescriptor>> for Lookup {
    fn from(lookups: Vec<LookupDescriptor>) -> Self {
        Lookup::Explicit(lookups)
    }
}

/// Generate lookups by walking `table`'s foreign keys depth-first, in
/// declaration order.
///
/// Each foreign key yields `{to: table, localField: fk.column, from:
/// fk.referenced_table, foreignField: fk.referenced_column}` exposed under
/// `prefix.fk.column`. With `depth > 1` the referenced table is expanded under
/// that path with `depth - 1`. A foreign key pointing back at a table already
/// on the path is handled according to `policy`.
pub fn auto_lookup<F>(
    table: &TableDescriptor,
    depth: usize,
    prefix: Option<&str>,
    policy: CyclePolicy,
    resolve: F,
) -> Result<Vec<LookupDescriptor>, DbError>
where
    F: Fn(&str) -> Result<Arc<TableDescriptor>, DbError>,
{
    let mut walker = Walker {
        resolve,
        policy,
        path: Vec::new(),
        out: Vec::new(),
    };
    walker.walk(table, depth, prefix)?;
    Ok(walker.out)
}

struct Walker<F> {
    resolve: F,
    policy: CyclePolicy,
    /// Tables on the current recursion path.
    path: Vec<String>,
    out: Vec<LookupDescriptor>,
}

impl<F> Walker<F>
where
    F: Fn(&str) -> Result<Arc<TableDescriptor>, DbError>,
{
    fn walk(
        &mut self,
        table: &TableDescriptor,
        depth: usize,
        prefix: Option<&str>,
    ) -> Result<(), DbError> {
        if depth == 0 {
            return Ok(());
        }
        self.path.push(table.name.clone());

        for fk in &table.foreign_keys {
            let as_ = match prefix {
                Some(prefix) => format!("{prefix}.{}", fk.column),
                None => fk.column.clone(),
            };
            trace!(to = %table.name, from = %fk.referenced_table, %as_, "auto lookup");
            self.out.push(LookupDescriptor::new(
                &table.name,
                &fk.column,
                &fk.referenced_table,
                &fk.referenced_column,
                &as_,
            ));

            if depth == 1 {
                continue;
            }
            if self.path.contains(&fk.referenced_table) {
                match self.policy {
                    CyclePolicy::Truncate => {
                        trace!(
                            %as_,
                            table = %fk.referenced_table,
                            "foreign-key cycle, not expanding"
                        );
                        continue;
                    }
                    CyclePolicy::Error => {
                        return Err(DbError::Schema(format!(
                            "foreign-key cycle: {} -> {}",
                            self.path.join(" -> "),
                            fk.referenced_table
                        )));
                    }
                }
            }
            let referenced = (self.resolve)(&fk.referenced_table)?;
            self.walk(&referenced, depth - 1, Some(&as_))?;
        }

        self.path.pop();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlcoll_catalog::ColumnType;

    fn tables() -> Vec<Arc<TableDescriptor>> {
        vec![
            Arc::new(
                TableDescriptor::new("hour")
                    .primary_key("id", ColumnType::Integer)
                    .column("project", ColumnType::Integer)
                    .column("user", ColumnType::Integer)
                    .foreign_key("project", "project", "id")
                    .foreign_key("user", "user", "id"),
            ),
            Arc::new(
                TableDescriptor::new("project")
                    .primary_key("id", ColumnType::Integer)
                    .column("client", ColumnType::Integer)
                    .foreign_key("client", "client", "id"),
            ),
            Arc::new(TableDescriptor::new("client").primary_key("id", ColumnType::Integer)),
            Arc::new(
                TableDescriptor::new("user")
                    .primary_key("id", ColumnType::Integer)
                    .column("manager", ColumnType::Integer)
                    .foreign_key("manager", "user", "id"),
            ),
        ]
    }

    fn lookup(
        root: &str,
        depth: usize,
        policy: CyclePolicy,
    ) -> Result<Vec<LookupDescriptor>, DbError> {
        let tables = tables();
        let resolve = |name: &str| {
            tables
                .iter()
                .find(|t| t.name == name)
                .cloned()
                .ok_or_else(|| DbError::Schema(name.to_string()))
        };
        let root = resolve(root)?;
        auto_lookup(&root, depth, None, policy, resolve)
    }

    fn paths(lookups: &[LookupDescriptor]) -> Vec<&str> {
        lookups.iter().map(|l| l.as_.as_str()).collect()
    }

    #[test]
    fn depth_one_is_direct_foreign_keys() {
        let lookups = lookup("hour", 1, CyclePolicy::Truncate).unwrap();
        assert_eq!(paths(&lookups), vec!["project", "user"]);
        for l in &lookups {
            assert_eq!(l.as_, l.local_field);
            assert_eq!(l.to, "hour");
        }
    }

    #[test]
    fn deeper_lookups_are_depth_first() {
        let lookups = lookup("hour", 2, CyclePolicy::Truncate).unwrap();
        assert_eq!(
            paths(&lookups),
            vec!["project", "project.client", "user", "user.manager"]
        );
        assert_eq!(
            lookups[1],
            LookupDescriptor::new("project", "client", "client", "id", "project.client")
        );
    }

    #[test]
    fn depth_zero_is_empty() {
        assert!(lookup("hour", 0, CyclePolicy::Truncate).unwrap().is_empty());
    }

    #[test]
    fn table_without_foreign_keys() {
        assert!(lookup("client", 3, CyclePolicy::Truncate).unwrap().is_empty());
    }

    #[test]
    fn self_reference_is_truncated() {
        let lookups = lookup("user", 5, CyclePolicy::Truncate).unwrap();
        assert_eq!(paths(&lookups), vec!["manager"]);
    }

    #[test]
    fn self_reference_errors_under_strict_policy() {
        let err = lookup("user", 2, CyclePolicy::Error).unwrap_err();
        assert!(err.to_string().contains("user -> user"), "{err}");

        // A single level never expands, so there is no cycle to report.
        assert_eq!(lookup("user", 1, CyclePolicy::Error).unwrap().len(), 1);
    }
}
