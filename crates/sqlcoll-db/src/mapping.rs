use std::sync::Arc;

use indexmap::IndexMap;
use sqlcoll_catalog::{ColumnDescriptor, ColumnType, TableDescriptor};
use sqlcoll_query::path;
use sqlcoll_query::{ColumnRef, Join, LookupDescriptor};
use tracing::trace;

use crate::error::DbError;

/// The column a dotted path resolves to.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldBinding {
    pub column: ColumnRef,
    pub ty: ColumnType,
    pub nullable: bool,
    pub primary_key: bool,
    /// Local foreign-key column this joined field stands in for.
    pub absorbed: Option<ColumnRef>,
}

impl FieldBinding {
    fn new(source: &str, column: &ColumnDescriptor) -> Self {
        Self {
            column: ColumnRef::new(source, &column.name),
            ty: column.ty,
            nullable: column.nullable,
            primary_key: column.primary_key,
            absorbed: None,
        }
    }

    /// The root-table column written through this field, if any.
    pub fn write_target(&self, root: &str) -> Option<&ColumnRef> {
        if self.column.source == root {
            return Some(&self.column);
        }
        self.absorbed.as_ref().filter(|local| local.source == root)
    }
}

/// Ordered dotted path → column map for one root table and its lookups.
#[derive(Debug, Clone)]
pub struct FieldMapping {
    fields: IndexMap<String, FieldBinding>,
    /// Folded join keys: local path → the joined identity it resolves to.
    /// Addressable in filters, sorts and writes, never selected.
    join_keys: IndexMap<String, String>,
}

impl FieldMapping {
    /// Map `root`'s columns by bare name and every lookup's columns under its
    /// `as` prefix, returning the joins in lookup order.
    ///
    /// A join's local key is folded into the joined field it matches:
    /// `<as>.<foreignField>` survives and remembers the local column. The
    /// local key's own entry is dropped from the output and its path resolves
    /// to the joined column instead.
    pub fn build<F>(
        root: &TableDescriptor,
        lookups: &[LookupDescriptor],
        resolve: F,
    ) -> Result<(Self, Vec<Join>), DbError>
    where
        F: Fn(&str) -> Result<Arc<TableDescriptor>, DbError>,
    {
        let mut fields = IndexMap::with_capacity(root.columns.len());
        for column in &root.columns {
            fields.insert(column.name.clone(), FieldBinding::new(&root.name, column));
        }

        // (alias, table) for every joined source, in join order.
        let mut aliases: Vec<(String, String)> = Vec::with_capacity(lookups.len());
        let mut joins = Vec::with_capacity(lookups.len());

        for lookup in lookups {
            let alias = &lookup.as_;
            if alias.is_empty() || alias.split('.').any(str::is_empty) {
                return Err(DbError::Schema(format!("invalid lookup path: {alias:?}")));
            }
            if *alias == root.name || aliases.iter().any(|(a, _)| a == alias) {
                return Err(DbError::Schema(format!("duplicate lookup path: {alias}")));
            }

            let from = resolve(&lookup.from)?;
            let to = resolve(&lookup.to)?;
            if from.find_column(&lookup.foreign_field).is_none() {
                return Err(DbError::Schema(format!(
                    "lookup {alias}: unknown column {}.{}",
                    from.name, lookup.foreign_field
                )));
            }
            if to.find_column(&lookup.local_field).is_none() {
                return Err(DbError::Schema(format!(
                    "lookup {alias}: unknown column {}.{}",
                    to.name, lookup.local_field
                )));
            }

            let to_alias = source_of(&root.name, &aliases, lookup)?;
            joins.push(Join {
                table: from.name.clone(),
                alias: alias.clone(),
                local: ColumnRef::new(to_alias, &lookup.local_field),
                foreign: ColumnRef::new(alias, &lookup.foreign_field),
            });

            for column in &from.columns {
                let path = format!("{alias}.{}", column.name);
                if fields.contains_key(&path) {
                    return Err(DbError::Schema(format!("duplicate field path: {path}")));
                }
                fields.insert(path, FieldBinding::new(alias, column));
            }
            aliases.push((alias.clone(), from.name.clone()));
        }

        let mut join_keys = IndexMap::new();
        for join in &joins {
            let local = fields
                .iter()
                .find(|(_, binding)| binding.column == join.local)
                .map(|(path, _)| path.clone());
            let identity = format!("{}.{}", join.alias, join.foreign.column);
            if let Some(path) = local {
                trace!(%path, replaced_by = %join.foreign, "join key folded into lookup");
                fields.shift_remove(&path);
                join_keys.insert(path, identity.clone());
            }
            if let Some(binding) = fields.get_mut(&identity) {
                binding.absorbed = Some(join.local.clone());
            }
        }

        let mapping = Self {
            fields,
            join_keys,
        };
        mapping.check_prefixes()?;
        Ok((mapping, joins))
    }

    /// No path may have another path nested under it.
    fn check_prefixes(&self) -> Result<(), DbError> {
        for path in self.fields.keys() {
            for (i, _) in path.match_indices('.') {
                let ancestor = &path[..i];
                if self.fields.contains_key(ancestor) {
                    return Err(DbError::Schema(format!(
                        "field {ancestor} conflicts with {path}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// The binding at `path`. A folded join key resolves to the joined
    /// column it was folded into.
    pub fn get(&self, path: &str) -> Option<&FieldBinding> {
        self.fields.get(path).or_else(|| {
            self.join_keys
                .get(path)
                .and_then(|identity| self.fields.get(identity))
        })
    }

    pub fn resolve(&self, path: &str) -> Result<&FieldBinding, DbError> {
        self.get(path)
            .ok_or_else(|| DbError::Schema(format!("unknown field: {path}")))
    }

    /// True when some mapped path lies strictly beneath `prefix`.
    pub fn is_prefix(&self, prefix: &str) -> bool {
        self.fields
            .keys()
            .any(|path| path.len() > prefix.len() && path::is_under(path, prefix))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldBinding)> {
        self.fields.iter().map(|(path, binding)| (path.as_str(), binding))
    }
}

/// Which source a lookup's `to` side refers to: the lookup's parent path when
/// that is a joined instance of `to`, the root when `to` is the root table,
/// otherwise the latest joined instance of `to`.
fn source_of<'a>(
    root: &'a str,
    aliases: &'a [(String, String)],
    lookup: &LookupDescriptor,
) -> Result<&'a str, DbError> {
    if let Some(parent) = lookup.parent_path() {
        if let Some((alias, _)) = aliases
            .iter()
            .find(|(alias, table)| alias == parent && *table == lookup.to)
        {
            return Ok(alias.as_str());
        }
    }
    if lookup.to == root {
        return Ok(root);
    }
    aliases
        .iter()
        .rev()
        .find(|(_, table)| *table == lookup.to)
        .map(|(alias, _)| alias.as_str())
        .ok_or_else(|| {
            DbError::Schema(format!(
                "lookup {}: table {} is not part of the query",
                lookup.as_, lookup.to
            ))
        })
}
