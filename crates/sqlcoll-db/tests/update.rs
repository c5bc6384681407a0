mod common;
use common::*;

use bson::{Bson, doc};
use sqlcoll_catalog::CatalogError;
use sqlcoll_db::{DbError, Lookup, UpdateResult};

// ── Update tests ────────────────────────────────────────────────

fn result(matched: u64, modified: u64) -> UpdateResult {
    UpdateResult {
        matched_count: matched,
        modified_count: modified,
    }
}

#[test]
fn update_root_field() {
    let db = hours_db();
    let hours = db.collection("hour").unwrap();
    let res = hours
        .update_many(
            &doc! { "issue": "WEB-1" },
            &doc! { "$set": { "minutes": 65 } },
            Lookup::None,
        )
        .unwrap();
    assert_eq!(res, result(1, 1));
    assert_eq!(db.catalog().rows("hour").unwrap()[0][1], Bson::Int32(65));
}

#[test]
fn unchanged_rows_are_not_modified() {
    let db = hours_db();
    let hours = db.collection("hour").unwrap();
    let res = hours
        .update_many(
            &doc! { "user": 1 },
            &doc! { "$set": { "minutes": 60 } },
            Lookup::None,
        )
        .unwrap();
    // Hour 1 already has 60 minutes, hour 3 does not.
    assert_eq!(res, result(2, 1));
}

#[test]
fn filter_through_lookup() {
    let db = hours_db();
    let hours = db.collection("hour").unwrap();
    let res = hours
        .update_many(
            &doc! { "project.client.name": "Acme" },
            &doc! { "$set": { "issue": "ACME" } },
            Lookup::Auto(2),
        )
        .unwrap();
    assert_eq!(res, result(2, 2));

    let issues: Vec<Bson> = db
        .catalog()
        .rows("hour")
        .unwrap()
        .into_iter()
        .map(|row| row[3].clone())
        .collect();
    assert_eq!(
        issues,
        vec![
            Bson::from("ACME"),
            Bson::from("ACME"),
            Bson::from("API-1"),
            Bson::Null,
            Bson::from("API-2"),
        ]
    );
}

#[test]
fn nested_set_document() {
    let db = hours_db();
    let hours = db.collection("hour").unwrap();
    let res = hours
        .update_many(
            &doc! { "id": 1 },
            &doc! { "$set": { "project": { "id": 2 } } },
            Lookup::Auto(1),
        )
        .unwrap();
    assert_eq!(res, result(1, 1));
    assert_eq!(db.catalog().rows("hour").unwrap()[0][4], Bson::Int32(2));
    assert_eq!(
        db.catalog().rows("project").unwrap()[0][0],
        Bson::Int64(1),
        "joined row keeps its key"
    );
}

#[test]
fn joined_column_is_rejected_by_catalog() {
    let db = hours_db();
    let hours = db.collection("hour").unwrap();
    let err = hours
        .update_many(
            &doc! { "id": 1 },
            &doc! { "$set": { "project.name": "site" } },
            Lookup::Auto(1),
        )
        .unwrap_err();
    assert!(
        matches!(err, DbError::Catalog(CatalogError::Unsupported(_))),
        "{err}"
    );
}

#[test]
fn empty_filter_is_refused() {
    let db = counting_db();
    let hours = db.collection("hour").unwrap();
    let err = hours
        .update_many(&doc! {}, &doc! { "$set": { "minutes": 1 } }, Lookup::None)
        .unwrap_err();
    assert!(matches!(err, DbError::Filter(_)), "{err}");
    assert_eq!(db.catalog().executions(), 0);
}

#[test]
fn only_set_is_supported() {
    let db = hours_db();
    let hours = db.collection("hour").unwrap();
    let err = hours
        .update_many(&doc! { "id": 1 }, &doc! { "$inc": { "minutes": 1 } }, Lookup::None)
        .unwrap_err();
    assert!(matches!(err, DbError::Usage(_)), "{err}");

    let err = hours
        .update_many(&doc! { "id": 1 }, &doc! { "$set": 5 }, Lookup::None)
        .unwrap_err();
    assert!(matches!(err, DbError::Usage(_)), "{err}");

    let err = hours
        .update_many(&doc! { "id": 1 }, &doc! { "$set": {} }, Lookup::None)
        .unwrap_err();
    assert!(matches!(err, DbError::Usage(_)), "{err}");
}

#[test]
fn unknown_set_field() {
    let db = hours_db();
    let hours = db.collection("hour").unwrap();
    let err = hours
        .update_many(
            &doc! { "id": 1 },
            &doc! { "$set": { "billable": true } },
            Lookup::None,
        )
        .unwrap_err();
    assert!(matches!(err, DbError::Schema(_)), "{err}");
}

#[test]
fn required_field_cannot_be_nulled() {
    let db = hours_db();
    let hours = db.collection("hour").unwrap();
    let err = hours
        .update_many(
            &doc! { "id": 2 },
            &doc! { "$set": { "minutes": null } },
            Lookup::None,
        )
        .unwrap_err();
    assert!(
        matches!(err, DbError::Catalog(CatalogError::Constraint(_))),
        "{err}"
    );
    assert_eq!(db.catalog().rows("hour").unwrap()[1][1], Bson::Int32(30));
}
