use std::fmt;

use bson::Bson;
use serde::{Deserialize, Serialize};

use crate::operator::Operator;

/// A column as seen by a statement: `source` is the root table name or the
/// alias (lookup `as` path) of a joined table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnRef {
    pub source: String,
    pub column: String,
}

impl ColumnRef {
    pub fn new(source: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            column: column.into(),
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.source, self.column)
    }
}

/// Right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operand {
    Value(Bson),
    /// Column-to-column comparison, used for join equalities.
    Column(ColumnRef),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalOp {
    And,
    Or,
}

impl LogicalOp {
    pub fn symbol(self) -> &'static str {
        match self {
            LogicalOp::And => "AND",
            LogicalOp::Or => "OR",
        }
    }
}

/// A compiled predicate tree.
///
/// Built through [`Expression::group`], which keeps the tree normalized:
/// same-operator nesting is flattened, empty groups are dropped and a group
/// holding a single child collapses into that child. The empty AND is the
/// "no filter" value, see [`Expression::is_empty`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expression {
    Compare {
        column: ColumnRef,
        op: Operator,
        operand: Operand,
    },
    Group {
        logical: LogicalOp,
        children: Vec<Expression>,
    },
}

impl Expression {
    pub fn compare(column: ColumnRef, op: Operator, value: impl Into<Bson>) -> Self {
        Expression::Compare {
            column,
            op,
            operand: Operand::Value(value.into()),
        }
    }

    pub fn columns_eq(lhs: ColumnRef, rhs: ColumnRef) -> Self {
        Expression::Compare {
            column: lhs,
            op: Operator::Eq,
            operand: Operand::Column(rhs),
        }
    }

    pub fn empty() -> Self {
        Expression::Group {
            logical: LogicalOp::And,
            children: Vec::new(),
        }
    }

    pub fn group(logical: LogicalOp, children: Vec<Expression>) -> Self {
        let mut flat = Vec::with_capacity(children.len());
        for child in children {
            match child {
                Expression::Group {
                    logical: inner,
                    children: grandchildren,
                } if inner == logical || grandchildren.is_empty() => {
                    flat.extend(grandchildren);
                }
                other => flat.push(other),
            }
        }

        if flat.len() == 1 {
            return flat.pop().unwrap_or_else(Expression::empty);
        }
        Expression::Group {
            logical,
            children: flat,
        }
    }

    pub fn and(children: Vec<Expression>) -> Self {
        Self::group(LogicalOp::And, children)
    }

    pub fn or(children: Vec<Expression>) -> Self {
        Self::group(LogicalOp::Or, children)
    }

    /// True for a group with no children: nothing was filtered on.
    pub fn is_empty(&self) -> bool {
        matches!(self, Expression::Group { children, .. } if children.is_empty())
    }

    /// `None` when the expression is empty.
    pub fn into_predicate(self) -> Option<Expression> {
        if self.is_empty() { None } else { Some(self) }
    }

    /// Number of comparison leaves.
    pub fn leaf_count(&self) -> usize {
        match self {
            Expression::Compare { .. } => 1,
            Expression::Group { children, .. } => children.iter().map(Self::leaf_count).sum(),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Compare {
                column,
                op,
                operand,
            } => match (op, operand) {
                (Operator::Eq, Operand::Value(Bson::Null)) => write!(f, "{column} IS NULL"),
                (Operator::Ne, Operand::Value(Bson::Null)) => write!(f, "{column} IS NOT NULL"),
                (op, Operand::Value(value)) => {
                    write!(f, "{column} {} ", op.symbol())?;
                    fmt_literal(value, f)
                }
                (op, Operand::Column(other)) => write!(f, "{column} {} {other}", op.symbol()),
            },
            Expression::Group { logical, children } => {
                if children.is_empty() {
                    return match logical {
                        LogicalOp::And => write!(f, "TRUE"),
                        LogicalOp::Or => write!(f, "FALSE"),
                    };
                }
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, " {} ", logical.symbol())?;
                    }
                    match child {
                        Expression::Group { .. } => write!(f, "({child})")?,
                        Expression::Compare { .. } => write!(f, "{child}")?,
                    }
                }
                Ok(())
            }
        }
    }
}

fn fmt_literal(value: &Bson, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match value {
        Bson::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
        Bson::DateTime(dt) => match dt.try_to_rfc3339_string() {
            Ok(s) => write!(f, "'{s}'"),
            Err(_) => write!(f, "{}", dt.timestamp_millis()),
        },
        Bson::Int32(n) => write!(f, "{n}"),
        Bson::Int64(n) => write!(f, "{n}"),
        Bson::Double(n) => write!(f, "{n}"),
        Bson::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
        Bson::Null => write!(f, "NULL"),
        other => write!(f, "{other}"),
    }
}
