//! Logical operator sequence: the contract between the SELECT front end and the executor.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::query::expr::{ColumnRef, ScalarExpr};
use crate::query::parse_expr;

/// A table identifier plus the alias it is addressed by. `alias == source` when unaliased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRef {
    pub source: String,
    pub alias: String,
}

impl TableRef {
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        Self { alias: source.clone(), source }
    }

    pub fn aliased(source: impl Into<String>, alias: impl Into<String>) -> Self {
        Self { source: source.into(), alias: alias.into() }
    }

    pub fn is_aliased(&self) -> bool { self.alias != self.source }
}

impl Display for TableRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.is_aliased() { write!(f, "{} AS {}", self.source, self.alias) } else { f.write_str(&self.source) }
    }
}

/// One (expression, output alias) pair. `text` is the expression as written and
/// doubles as the alias when none was given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnItem {
    pub expr: ScalarExpr,
    pub text: String,
    pub alias: String,
}

impl ColumnItem {
    pub fn new(expr: ScalarExpr, text: impl Into<String>, alias: Option<String>) -> Self {
        let text = text.into();
        let alias = alias.unwrap_or_else(|| text.clone());
        Self { expr, text, alias }
    }

    /// Parse `text` as an expression; the item is named by its text.
    pub fn parse(text: &str) -> Result<Self> {
        Ok(Self::new(parse_expr(text)?, text.trim(), None))
    }

    /// Parse `text` as an expression aliased `alias`.
    pub fn parse_as(text: &str, alias: &str) -> Result<Self> {
        Ok(Self::new(parse_expr(text)?, text.trim(), Some(alias.to_string())))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinMode { Left, Right, Inner }

impl Display for JoinMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self { JoinMode::Left => "LEFT", JoinMode::Right => "RIGHT", JoinMode::Inner => "INNER" })
    }
}

/// One equality of a join condition, operands in the order written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinKey {
    pub first: ColumnRef,
    pub second: ColumnRef,
}

impl JoinKey {
    pub fn new(first: impl Into<String>, second: impl Into<String>) -> Self {
        Self { first: ColumnRef::new(first), second: ColumnRef::new(second) }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub item: ColumnItem,
    pub ascending: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operator {
    Load(TableRef),
    Join { table: TableRef, mode: JoinMode, on: Vec<JoinKey> },
    /// Plain projection, or aggregation when the incoming table value is grouped.
    Project(Vec<ColumnItem>),
    /// Row predicate text in the source dialect (`=` accepted for equality).
    Filter(String),
    Group { keys: Vec<ColumnItem>, projection: Vec<ColumnItem> },
    Order(Vec<OrderItem>),
    Limit { offset: usize, count: usize },
}

impl Operator {
    pub fn kind(&self) -> &'static str {
        match self {
            Operator::Load(_) => "LOAD",
            Operator::Join { .. } => "JOIN",
            Operator::Project(_) => "PROJECT",
            Operator::Filter(_) => "FILTER",
            Operator::Group { .. } => "GROUP",
            Operator::Order(_) => "ORDER",
            Operator::Limit { .. } => "LIMIT",
        }
    }
}

impl Display for Operator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let items = |v: &[ColumnItem]| v.iter().map(|c| if c.alias == c.text { c.text.clone() } else { format!("{} AS {}", c.text, c.alias) }).collect::<Vec<_>>().join(", ");
        match self {
            Operator::Load(t) => write!(f, "LOAD {}", t),
            Operator::Join { table, mode, on } => {
                let conds: Vec<String> = on.iter().map(|k| format!("{} = {}", k.first.name, k.second.name)).collect();
                write!(f, "{} JOIN {} ON {}", mode, table, conds.join(" AND "))
            }
            Operator::Project(cols) => write!(f, "PROJECT [{}]", items(cols)),
            Operator::Filter(p) => write!(f, "FILTER {}", p),
            Operator::Group { keys, .. } => write!(f, "GROUP [{}]", items(keys)),
            Operator::Order(o) => {
                let parts: Vec<String> = o.iter().map(|i| format!("{} {}", i.item.text, if i.ascending { "ASC" } else { "DESC" })).collect();
                write!(f, "ORDER [{}]", parts.join(", "))
            }
            Operator::Limit { offset, count } => write!(f, "LIMIT {}, {}", offset, count),
        }
    }
}
