use bson::{Bson, DateTime, Document};
use sqlcoll_catalog::{CatalogError, ColumnType, Row};
use sqlcoll_query::path;

use crate::error::DbError;

/// One selected column: where it lands in the document and how to read it.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputField {
    pub path: String,
    pub ty: ColumnType,
}

impl OutputField {
    pub fn new(path: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            path: path.into(),
            ty,
        }
    }
}

/// Rebuild a nested document from a flat row aligned with `fields`.
pub fn materialize(fields: &[OutputField], row: Row) -> Result<Document, DbError> {
    if row.len() != fields.len() {
        return Err(CatalogError::Storage(format!(
            "row has {} values for {} selected fields",
            row.len(),
            fields.len()
        ))
        .into());
    }
    let mut doc = Document::new();
    for (field, value) in fields.iter().zip(row) {
        let value = coerce(field, value)?;
        path::set_path(&mut doc, &field.path, value);
    }
    Ok(doc)
}

/// Convert `value` to the field's declared type. `null` passes through.
pub fn coerce(field: &OutputField, value: Bson) -> Result<Bson, DbError> {
    let converted = match (field.ty, &value) {
        (_, Bson::Null) => Some(Bson::Null),

        (ColumnType::Integer, Bson::Int32(_) | Bson::Int64(_)) => Some(value.clone()),
        (ColumnType::Integer, Bson::Double(n)) => float_to_int(*n).map(Bson::Int64),
        (ColumnType::Integer, Bson::String(s)) => s.trim().parse::<i64>().ok().map(Bson::Int64),

        (ColumnType::Float, Bson::Double(_)) => Some(value.clone()),
        (ColumnType::Float, Bson::Int32(n)) => Some(Bson::Double(f64::from(*n))),
        (ColumnType::Float, Bson::Int64(n)) => Some(Bson::Double(*n as f64)),
        (ColumnType::Float, Bson::String(s)) => s.trim().parse::<f64>().ok().map(Bson::Double),

        (ColumnType::String, Bson::String(_)) => Some(value.clone()),

        (ColumnType::Datetime | ColumnType::Date, Bson::DateTime(_)) => Some(value.clone()),
        (ColumnType::Datetime, Bson::String(s)) => {
            DateTime::parse_rfc3339_str(s).ok().map(Bson::DateTime)
        }
        (ColumnType::Datetime, Bson::Int64(ms)) => Some(Bson::DateTime(DateTime::from_millis(*ms))),
        (ColumnType::Datetime, Bson::Int32(ms)) => {
            Some(Bson::DateTime(DateTime::from_millis(i64::from(*ms))))
        }
        (ColumnType::Date, Bson::String(s)) => parse_date(s).map(Bson::DateTime),

        _ => None,
    };
    converted.ok_or_else(|| DbError::Conversion {
        field: field.path.clone(),
        expected: field.ty,
        value,
    })
}

fn float_to_int(n: f64) -> Option<i64> {
    if n.is_finite() && n.fract() == 0.0 && n >= i64::MIN as f64 && n < i64::MAX as f64 {
        Some(n as i64)
    } else {
        None
    }
}

/// `YYYY-MM-DD` (midnight UTC) or a full RFC 3339 timestamp.
fn parse_date(s: &str) -> Option<DateTime> {
    let b = s.as_bytes();
    let plain = b.len() == 10
        && b[4] == b'-'
        && b[7] == b'-'
        && b.iter()
            .enumerate()
            .all(|(i, c)| i == 4 || i == 7 || c.is_ascii_digit());
    if plain {
        return DateTime::parse_rfc3339_str(format!("{s}T00:00:00Z")).ok();
    }
    DateTime::parse_rfc3339_str(s).ok()
}
