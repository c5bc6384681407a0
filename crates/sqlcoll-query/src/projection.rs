use bson::{Bson, Document};

use crate::error::QueryError;
use crate::path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProjectionMode {
    Include,
    Exclude,
}

/// A parsed include (`1`) or exclude (`-1`) projection.
///
/// A key matches every field whose dotted path starts with it, so
/// `{"cli": 1}` keeps `client.id` and `{"na": -1}` drops `name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    mode: ProjectionMode,
    keys: Vec<String>,
}

impl Projection {
    /// Parse a projection document. Nested documents are flattened to dotted
    /// keys first. Returns `None` for an empty projection.
    pub fn parse(spec: &Document) -> Result<Option<Self>, QueryError> {
        let mut mode = None;
        let mut keys = Vec::new();

        for (key, value) in path::flatten(spec) {
            let key_mode = match value {
                Bson::Int32(1) | Bson::Int64(1) => ProjectionMode::Include,
                Bson::Int32(-1) | Bson::Int64(-1) => ProjectionMode::Exclude,
                Bson::Double(n) if n == 1.0 => ProjectionMode::Include,
                Bson::Double(n) if n == -1.0 => ProjectionMode::Exclude,
                other => {
                    return Err(QueryError::Projection(format!(
                        "{key}: expected 1 or -1, got {other}"
                    )));
                }
            };
            match mode {
                None => mode = Some(key_mode),
                Some(m) if m != key_mode => {
                    return Err(QueryError::Projection(
                        "cannot mix inclusion and exclusion".into(),
                    ));
                }
                Some(_) => {}
            }
            keys.push(key);
        }

        Ok(mode.map(|mode| Projection { mode, keys }))
    }

    pub fn keeps(&self, field: &str) -> bool {
        let matched = self.keys.iter().any(|key| field.starts_with(key.as_str()));
        match self.mode {
            ProjectionMode::Include => matched,
            ProjectionMode::Exclude => !matched,
        }
    }

    /// Keep the fields this projection selects, preserving their order.
    pub fn apply<T>(&self, fields: Vec<T>, path_of: impl Fn(&T) -> &str) -> Vec<T> {
        fields
            .into_iter()
            .filter(|field| self.keeps(path_of(field)))
            .collect()
    }
}
