use serde::{Deserialize, Serialize};

/// A join hint: bring `from`'s columns in by matching `from.foreignField`
/// against `to.localField`, and expose them under the dotted prefix `as`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupDescriptor {
    pub to: String,
    pub from: String,
    #[serde(rename = "localField")]
    pub local_field: String,
    #[serde(rename = "foreignField")]
    pub foreign_field: String,
    #[serde(rename = "as")]
    pub as_: String,
}

impl LookupDescriptor {
    pub fn new(
        to: impl Into<String>,
        local_field: impl Into<String>,
        from: impl Into<String>,
        foreign_field: impl Into<String>,
        as_: impl Into<String>,
    ) -> Self {
        Self {
            to: to.into(),
            from: from.into(),
            local_field: local_field.into(),
            foreign_field: foreign_field.into(),
            as_: as_.into(),
        }
    }

    /// The prefix this lookup's own `as` path is nested under, if any.
    pub fn parent_path(&self) -> Option<&str> {
        self.as_.rsplit_once('.').map(|(parent, _)| parent)
    }
}
