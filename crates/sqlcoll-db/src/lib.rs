mod client;
mod collection;
mod config;
mod cursor;
mod database;
mod error;
mod lookup;
mod mapping;
mod materialize;
mod parse_filter;
mod planner;
mod result;

pub use bson::{Bson, Document};
pub use client::Client;
pub use collection::{Collection, FindOptions};
pub use config::{CyclePolicy, DatabaseConfig, FilterMode};
pub use cursor::{Cursor, Documents};
pub use database::Database;
pub use error::DbError;
pub use lookup::{Lookup, auto_lookup};
pub use mapping::{FieldBinding, FieldMapping};
pub use materialize::{OutputField, coerce, materialize};
pub use parse_filter::FilterCompiler;
pub use planner::{FindPlan, Planner};
pub use result::{DeleteResult, InsertResult, UpdateResult};
pub use sqlcoll_query::LookupDescriptor;
