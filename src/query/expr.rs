//! Typed scalar expression tree produced by the parser and consumed by the translator.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::ident::split_qualified;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

/// A column reference as written, e.g. `t1.c` or `c`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnRef {
    pub name: String,
}

impl ColumnRef {
    pub fn new(name: impl Into<String>) -> Self { Self { name: name.into() } }

    /// Table alias prefix, if the reference is qualified.
    pub fn qualifier(&self) -> Option<&str> { split_qualified(&self.name).0 }

    /// Unqualified column part.
    pub fn column(&self) -> &str { split_qualified(&self.name).1 }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp { Neg, Not }

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp { Add, Sub, Mul, Div, Mod, Eq, NotEq, Lt, LtEq, Gt, GtEq, And, Or }

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
        }
    }

    pub fn is_comparison(&self) -> bool {
        matches!(self, BinaryOp::Eq | BinaryOp::NotEq | BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScalarExpr {
    Literal(Literal),
    Column(ColumnRef),
    /// Function call; `name` is upper-cased by the parser.
    Call { name: String, args: Vec<ScalarExpr> },
    /// `count(*)`: the cardinality of the current group.
    CountStar,
    Unary { op: UnaryOp, expr: Box<ScalarExpr> },
    Binary { left: Box<ScalarExpr>, op: BinaryOp, right: Box<ScalarExpr> },
    IsNull { expr: Box<ScalarExpr>, negated: bool },
    InList { expr: Box<ScalarExpr>, list: Vec<ScalarExpr>, negated: bool },
}

/// Aggregate function names recognised in group context.
pub const AGGREGATE_NAMES: &[&str] = &["SUM", "AVG", "MEAN", "MIN", "MAX", "COUNT", "FIRST", "LAST"];

pub fn is_aggregate_name(name: &str) -> bool {
    AGGREGATE_NAMES.iter().any(|a| a.eq_ignore_ascii_case(name))
}

impl ScalarExpr {
    pub fn column(name: impl Into<String>) -> Self { ScalarExpr::Column(ColumnRef::new(name)) }

    pub fn binary(left: ScalarExpr, op: BinaryOp, right: ScalarExpr) -> Self {
        ScalarExpr::Binary { left: Box::new(left), op, right: Box::new(right) }
    }

    /// The referenced column when the expression is a bare column reference.
    pub fn as_column(&self) -> Option<&ColumnRef> {
        if let ScalarExpr::Column(c) = self { Some(c) } else { None }
    }

    pub fn is_literal(&self) -> bool { matches!(self, ScalarExpr::Literal(_)) }

    /// True when an aggregate call or `count(*)` appears anywhere in the tree.
    pub fn contains_aggregate(&self) -> bool {
        match self {
            ScalarExpr::CountStar => true,
            ScalarExpr::Call { name, args } => is_aggregate_name(name) || args.iter().any(|a| a.contains_aggregate()),
            ScalarExpr::Literal(_) | ScalarExpr::Column(_) => false,
            ScalarExpr::Unary { expr, .. } | ScalarExpr::IsNull { expr, .. } => expr.contains_aggregate(),
            ScalarExpr::Binary { left, right, .. } => left.contains_aggregate() || right.contains_aggregate(),
            ScalarExpr::InList { expr, list, .. } => expr.contains_aggregate() || list.iter().any(|a| a.contains_aggregate()),
        }
    }

    /// Collect every column reference in evaluation order.
    pub fn columns(&self) -> Vec<&ColumnRef> {
        let mut out = Vec::new();
        self.walk_columns(&mut out);
        out
    }

    fn walk_columns<'a>(&'a self, out: &mut Vec<&'a ColumnRef>) {
        match self {
            ScalarExpr::Column(c) => out.push(c),
            ScalarExpr::Literal(_) | ScalarExpr::CountStar => {}
            ScalarExpr::Call { args, .. } => args.iter().for_each(|a| a.walk_columns(out)),
            ScalarExpr::Unary { expr, .. } | ScalarExpr::IsNull { expr, .. } => expr.walk_columns(out),
            ScalarExpr::Binary { left, right, .. } => { left.walk_columns(out); right.walk_columns(out); }
            ScalarExpr::InList { expr, list, .. } => {
                expr.walk_columns(out);
                list.iter().for_each(|a| a.walk_columns(out));
            }
        }
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::Null => f.write_str("NULL"),
            Literal::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Literal::Int(i) => write!(f, "{}", i),
            Literal::Float(v) => write!(f, "{:?}", v),
            Literal::Str(s) => write!(f, "'{}'", s.replace('\'', "''")),
        }
    }
}

impl Display for ScalarExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ScalarExpr::Literal(l) => write!(f, "{}", l),
            ScalarExpr::Column(c) => f.write_str(&c.name),
            ScalarExpr::CountStar => f.write_str("COUNT(*)"),
            ScalarExpr::Call { name, args } => {
                let parts: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                write!(f, "{}({})", name, parts.join(", "))
            }
            ScalarExpr::Unary { op: UnaryOp::Neg, expr } => write!(f, "-{}", expr),
            ScalarExpr::Unary { op: UnaryOp::Not, expr } => write!(f, "NOT {}", expr),
            ScalarExpr::Binary { left, op, right } => write!(f, "({} {} {})", left, op.symbol(), right),
            ScalarExpr::IsNull { expr, negated } => write!(f, "{} IS {}NULL", expr, if *negated { "NOT " } else { "" }),
            ScalarExpr::InList { expr, list, negated } => {
                let parts: Vec<String> = list.iter().map(|a| a.to_string()).collect();
                write!(f, "{} {}IN ({})", expr, if *negated { "NOT " } else { "" }, parts.join(", "))
            }
        }
    }
}
