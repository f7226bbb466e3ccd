//! Lowering to polars expressions for the lazy engine.

use polars::prelude::*;
use polars_plan::plans::typed_lit;

use crate::error::{Result, SelectError};
use crate::functions::{AggFunc, FunctionRegistry};
use crate::ident::resolve_column;
use crate::query::{BinaryOp, Literal, ScalarExpr, UnaryOp};
use crate::translate::Scope;

const DTYPE_COLUMN: &str = "__fq_dtype";

pub fn to_polars(expr: &ScalarExpr, schema: &Schema, funcs: &FunctionRegistry, scope: Scope) -> Result<Expr> {
    let columns: Vec<String> = schema.iter_names().map(|c| c.to_string()).collect();
    Lowering { schema, columns: &columns, funcs, scope }.lower(expr, false)
}

/// Type of `expr` when evaluated over a table with `schema`. Only the plan is
/// resolved, so type errors surface here without touching data.
pub fn infer_dtype(expr: &Expr, schema: &Schema) -> Result<DataType> {
    let resolved = DataFrame::empty_with_schema(schema)
        .lazy()
        .select([expr.clone().alias(DTYPE_COLUMN)])
        .collect_schema()?;
    resolved
        .get(DTYPE_COLUMN)
        .cloned()
        .ok_or_else(|| SelectError::exec("expression produced no output column"))
}

/// Lower and type `expr` in one go.
pub fn result_dtype(expr: &ScalarExpr, schema: &Schema, funcs: &FunctionRegistry, scope: Scope) -> Result<DataType> {
    infer_dtype(&to_polars(expr, schema, funcs, scope)?, schema)
}

/// Boolean mask keeping the rows whose value of `e` is truthy: non-zero
/// numbers, non-empty strings, `true`. Nulls and NaN never pass.
pub fn truthy_mask(e: Expr, dtype: &DataType) -> Result<Expr> {
    Ok(match dtype {
        DataType::Boolean => e,
        DataType::Null => e.cast(DataType::Boolean),
        DataType::String => e.neq(lit("")),
        dt if dt.is_float() || dt.is_decimal() => {
            let f = e.cast(DataType::Float64);
            f.clone().neq(typed_lit(0.0f64)).and(f.is_nan().not())
        }
        dt if dt.is_integer() || dt.is_temporal() => e.cast(DataType::Int64).neq(typed_lit(0i64)),
        other => return Err(SelectError::expr(format!("predicate of type {} has no truth value", other))),
    })
}

fn literal(l: &Literal) -> Expr {
    match l {
        Literal::Null => lit(Null {}),
        Literal::Bool(b) => lit(*b),
        Literal::Int(i) => typed_lit(*i),
        Literal::Float(f) => typed_lit(*f),
        Literal::Str(s) => lit(s.clone()),
    }
}

struct Lowering<'a> {
    schema: &'a Schema,
    columns: &'a [String],
    funcs: &'a FunctionRegistry,
    scope: Scope,
}

impl Lowering<'_> {
    fn lower(&self, expr: &ScalarExpr, in_agg: bool) -> Result<Expr> {
        Ok(match expr {
            ScalarExpr::Literal(l) => literal(l),
            ScalarExpr::Column(c) => col(resolve_column(&c.name, self.columns)?.as_str()),
            ScalarExpr::CountStar => {
                self.check_aggregate("COUNT(*)", in_agg)?;
                len().cast(DataType::Int64)
            }
            ScalarExpr::Call { name, args } => {
                if let Some(func) = AggFunc::from_name(name) {
                    self.check_aggregate(name, in_agg)?;
                    if args.len() != 1 {
                        return Err(SelectError::expr(format!("{} expects 1 argument, got {}", name, args.len())));
                    }
                    let mut inner = self.lower(&args[0], true)?;
                    if args[0].columns().is_empty() {
                        // a constant stands for one value per row of the group
                        inner = repeat(inner, len());
                    }
                    let out = func.to_expr(inner);
                    if func == AggFunc::Count { out.cast(DataType::Int64) } else { out }
                } else {
                    let udf = self.funcs.resolve(name, args.len())?;
                    let lowered = args.iter().map(|a| self.lower(a, in_agg)).collect::<Result<Vec<_>>>()?;
                    let dtypes: Vec<Option<DataType>> = lowered.iter().map(|e| infer_dtype(e, self.schema).ok()).collect();
                    udf.to_expr_typed(lowered, &dtypes)?
                }
            }
            ScalarExpr::Unary { op: UnaryOp::Neg, expr } => typed_lit(0i64) - self.lower(expr, in_agg)?,
            ScalarExpr::Unary { op: UnaryOp::Not, expr } => self.lower(expr, in_agg)?.not(),
            ScalarExpr::Binary { left, op, right } => {
                let l = self.lower(left, in_agg)?;
                let r = self.lower(right, in_agg)?;
                match op {
                    BinaryOp::Add => l + r,
                    BinaryOp::Sub => l - r,
                    BinaryOp::Mul => l * r,
                    BinaryOp::Div => l.cast(DataType::Float64) / r.cast(DataType::Float64),
                    BinaryOp::Mod => l % r,
                    BinaryOp::Eq => l.eq(r),
                    BinaryOp::NotEq => l.neq(r),
                    BinaryOp::Lt => l.lt(r),
                    BinaryOp::LtEq => l.lt_eq(r),
                    BinaryOp::Gt => l.gt(r),
                    BinaryOp::GtEq => l.gt_eq(r),
                    BinaryOp::And => l.and(r),
                    BinaryOp::Or => l.or(r),
                }
            }
            ScalarExpr::IsNull { expr, negated } => {
                let e = self.lower(expr, in_agg)?;
                if *negated { e.is_not_null() } else { e.is_null() }
            }
            ScalarExpr::InList { expr, list, negated } => {
                let target = self.lower(expr, in_agg)?;
                let mut acc: Option<Expr> = None;
                for item in list {
                    let hit = target.clone().eq(self.lower(item, in_agg)?);
                    acc = Some(match acc { Some(a) => a.or(hit), None => hit });
                }
                let any = acc.unwrap_or_else(|| lit(false));
                if *negated { any.not() } else { any }
            }
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
