mod error;
mod expression;
mod lookup;
mod operator;
pub mod path;
mod projection;
mod sort;
pub mod sql;
mod statement;

pub use error::QueryError;
pub use expression::{ColumnRef, Expression, LogicalOp, Operand};
pub use lookup::LookupDescriptor;
pub use operator::Operator;
pub use projection::Projection;
pub use sort::{SortDirection, SortKey};
pub use statement::{Assignment, Delete, Insert, Join, Select, SelectField, Statement, Update};
