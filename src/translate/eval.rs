//! Cell-level evaluation for the local engine.

use std::collections::HashMap;
use std::sync::Arc;

use polars::prelude::DataFrame;

use crate::error::{Result, SelectError};
use crate::functions::{AggFunc, FunctionRegistry, ScalarUdf};
use crate::ident::resolve_column;
use crate::query::{BinaryOp, ScalarExpr, UnaryOp};
use crate::translate::Scope;
use crate::value::{column_scalars, Datum, Scalar};

/// A bound expression: columns resolved to physical names, functions looked up.
pub enum Compiled {
    Const(Scalar),
    Column(String),
    Call { name: String, func: Arc<dyn ScalarUdf>, args: Vec<Compiled> },
    Agg { func: AggFunc, arg: Box<Compiled> },
    CountRows,
    Neg(Box<Compiled>),
    Not(Box<Compiled>),
    Binary { left: Box<Compiled>, op: BinaryOp, right: Box<Compiled> },
    IsNull { expr: Box<Compiled>, negated: bool },
    InList { expr: Box<Compiled>, list: Vec<Compiled>, negated: bool },
}

impl std::fmt::Debug for Compiled {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Compiled::Const(s) => write!(f, "Const({:?})", s),
            Compiled::Column(c) => write!(f, "Column({})", c),
            Compiled::Call { name, args, .. } => f.debug_tuple(name).field(args).finish(),
            Compiled::Agg { func, arg } => write!(f, "{:?}({:?})", func, arg),
            Compiled::CountRows => f.write_str("CountRows"),
            Compiled::Neg(e) => write!(f, "Neg({:?})", e),
            Compiled::Not(e) => write!(f, "Not({:?})", e),
            Compiled::Binary { left, op, right } => write!(f, "({:?} {} {:?})", left, op.symbol(), right),
            Compiled::IsNull { expr, negated } => write!(f, "IsNull({:?}, negated={})", expr, negated),
            Compiled::InList { expr, list, negated } => write!(f, "InList({:?}, {:?}, negated={})", expr, list, negated),
        }
    }
}

/// Bind `expr` against `columns` and `funcs`.
pub fn compile(expr: &ScalarExpr, columns: &[String], funcs: &FunctionRegistry, scope: Scope) -> Result<Compiled> {
    Compiler { columns, funcs, scope }.compile(expr, false)
}

struct Compiler<'a> {
    columns: &'a [String],
    funcs: &'a FunctionRegistry,
    scope: Scope,
}

impl Compiler<'_> {
    fn compile(&self, expr: &ScalarExpr, in_agg: bool) -> Result<Compiled> {
        let boxed = |e: &ScalarExpr| self.compile(e, in_agg).map(Box::new);
        Ok(match expr {
            ScalarExpr::Literal(l) => Compiled::Const(Scalar::from_literal(l)),
            ScalarExpr::Column(c) => Compiled::Column(resolve_column(&c.name, self.columns)?),
            ScalarExpr::CountStar => {
                self.check_aggregate("COUNT(*)", in_agg)?;
                Compiled::CountRows
            }
            ScalarExpr::Call { name, args } => {
                if let Some(func) = AggFunc::from_name(name) {
                    self.check_aggregate(name, in_agg)?;
                    if args.len() != 1 {
                        return Err(SelectError::expr(format!("{} expects 1 argument, got {}", name, args.len())));
                    }
                    Compiled::Agg { func, arg: Box::new(self.compile(&args[0], true)?) }
                } else {
                    let func = self.funcs.resolve(name, args.len())?;
                    let args = args.iter().map(|a| self.compile(a, in_agg)).collect::<Result<Vec<_>>>()?;
                    Compiled::Call { name: name.clone(), func, args }
                }
            }
            ScalarExpr::Unary { op: UnaryOp::Neg, expr } => Compiled::Neg(boxed(expr)?),
            ScalarExpr::Unary { op: UnaryOp::Not, expr } => Compiled::Not(boxed(expr)?),
            ScalarExpr::Binary { left, op, right } => Compiled::Binary { left: boxed(left)?, op: *op, right: boxed(right)? },
            ScalarExpr::IsNull { expr, negated } => Compiled::IsNull { expr: boxed(expr)?, negated: *negated },
            ScalarExpr::InList { expr, list, negated } => Compiled::InList {
                expr: boxed(expr)?,
                list: list.iter().map(|a| self.compile(a, in_agg)).collect::<Result<Vec<_>>>()?,
                negated: *negated,
            },
        })
    }

    fn check_aggregate(&self, name: &str, in_agg: bool) -> Result<()> {
        if self.scope == Scope::Row {
            return Err(SelectError::expr(format!("aggregate {} used outside of a grouped projection", name)));
        }
        if in_agg {
            return Err(SelectError::expr(format!("aggregate {} nested inside another aggregate", name)));
        }
        Ok(())
    }
}

/// Column access for one evaluation: a single row, or the rows of one group.
pub trait Binding {
    fn column(&self, name: &str) -> Result<Datum>;

    /// Rows covered by the binding (1 for a row binding).
    fn rows(&self) -> usize;
}

/// Columns of a frame pre-extracted as cells, restricted to what an expression set reads.
#[derive(Debug, Default)]
pub struct FrameData {
    columns: HashMap<String, Vec<Scalar>>,
    height: usize,
}

impl FrameData {
    pub fn load(df: &DataFrame, names: &[String]) -> Result<Self> {
        let mut columns = HashMap::new();
        for n in names {
            if !columns.contains_key(n) {
                columns.insert(n.clone(), column_scalars(df, n)?);
            }
        }
        Ok(Self { columns, height: df.height() })
    }

    pub fn height(&self) -> usize { self.height }

    fn values(&self, name: &str) -> Result<&[Scalar]> {
        self.columns
            .get(name)
            .map(|v| v.as_slice())
            .ok_or_else(|| SelectError::exec(format!("column {} was not materialised", name)))
    }
}

pub struct RowBinding<'a> {
    pub data: &'a FrameData,
    pub row: usize,
}

impl Binding for RowBinding<'_> {
    fn column(&self, name: &str) -> Result<Datum> {
        Ok(Datum::Scalar(self.data.values(name)?.get(self.row).cloned().unwrap_or(Scalar::Null)))
    }

    fn rows(&self) -> usize { 1 }
}

pub struct GroupBinding<'a> {
    pub data: &'a FrameData,
    pub rows: &'a [usize],
}

impl Binding for GroupBinding<'_> {
    fn column(&self, name: &str) -> Result<Datum> {
        let vals = self.data.values(name)?;
        Ok(Datum::Column(self.rows.iter().map(|r| vals.get(*r).cloned().unwrap_or(Scalar::Null)).collect()))
    }

    fn rows(&self) -> usize { self.rows.len() }
}

impl Compiled {
    /// Physical column names the expression reads.
    pub fn referenced(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.walk(&mut out);
        out
    }

    fn walk(&self, out: &mut Vec<String>) {
        match self {
            Compiled::Column(c) => {
                if !out.contains(c) { out.push(c.clone()); }
            }
            Compiled::Const(_) | Compiled::CountRows => {}
            Compiled::Call { args, .. } => args.iter().for_each(|a| a.walk(out)),
            Compiled::Agg { arg, .. } => arg.walk(out),
            Compiled::Neg(e) | Compiled::Not(e) | Compiled::IsNull { expr: e, .. } => e.walk(out),
            Compiled::Binary { left, right, .. } => {
                left.walk(out);
                right.walk(out);
            }
            Compiled::InList { expr, list, .. } => {
                expr.walk(out);
                list.iter().for_each(|a| a.walk(out));
            }
        }
    }

    pub fn eval(&self, b: &dyn Binding) -> Result<Datum> {
        match self {
            Compiled::Const(s) => Ok(Datum::Scalar(s.clone())),
            Compiled::Column(c) => b.column(c),
            Compiled::CountRows => Ok(Datum::Scalar(Scalar::Int(b.rows() as i64))),
            Compiled::Call { func, args, .. } => {
                let vals = args.iter().map(|a| a.eval(b)).collect::<Result<Vec<_>>>()?;
                func.invoke(vals)
            }
            Compiled::Agg { func, arg } => {
                let values = match arg.eval(b)? {
                    Datum::Column(v) => v,
                    Datum::Scalar(s) => vec![s; b.rows()],
                };
                Ok(Datum::Scalar(func.reduce(&values)?))
            }
            Compiled::Neg(e) => e.eval(b)?.map(|v| match v {
                Scalar::Null => Ok(Scalar::Null),
                Scalar::Int(i) => Ok(i.checked_neg().map(Scalar::Int).unwrap_or(Scalar::Float(-(*i as f64)))),
                Scalar::Float(f) => Ok(Scalar::Float(-f)),
                other => Err(SelectError::expr(format!("cannot negate '{}'", other))),
            }),
            Compiled::Not(e) => e.eval(b)?.map(|v| Ok(v.truthy().map(|t| Scalar::Bool(!t)).unwrap_or(Scalar::Null))),
            Compiled::Binary { left, op, right } => {
                let l = left.eval(b)?;
                let r = right.eval(b)?;
                l.zip(r, |x, y| x.binary(*op, y))
            }
            Compiled::IsNull { expr, negated } => expr.eval(b)?.map(|v| Ok(Scalar::Bool(v.is_null() != *negated))),
            Compiled::InList { expr, list, negated } => {
                let mut acc = expr.eval(b)?.map(|v| Ok(if v.is_null() { Scalar::Null } else { Scalar::Bool(false) }))?;
                let target = expr.eval(b)?;
                for item in list {
                    let hit = target.clone().zip(item.eval(b)?, |x, y| x.binary(BinaryOp::Eq, y))?;
                    acc = acc.zip(hit, |a, h| Ok(match (a, h) {
                        (Scalar::Bool(true), _) | (_, Scalar::Bool(true)) => Scalar::Bool(true),
                        (Scalar::Null, _) | (_, Scalar::Null) => Scalar::Null,
                        _ => Scalar::Bool(false),
                    }))?;
                }
                if *negated {
                    acc = acc.map(|v| Ok(v.truthy().map(|t| Scalar::Bool(!t)).unwrap_or(Scalar::Null)))?;
                }
                Ok(acc)
            }
        }
    }

    /// Evaluate once per row of `data`.
    pub fn eval_rows(&self, data: &FrameData) -> Result<Vec<Scalar>> {
        (0..data.height())
            .map(|row| self.eval(&RowBinding { data, row })?.into_scalar())
            .collect()
    }

    /// Evaluate once per group; each group is a list of row indices into `data`.
    pub fn eval_groups(&self, data: &FrameData, groups: &[Vec<usize>]) -> Result<Vec<Scalar>> {
        groups
            .iter()
            .map(|rows| self.eval(&GroupBinding { data, rows })?.into_scalar())
            .collect()
    }
}
