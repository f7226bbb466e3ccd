//! Scalar function registry and aggregate functions.
//!
//! Every scalar function has two faces: `invoke` evaluates cells for the local
//! engine, `to_expr` builds a polars expression for the lazy engine. Both must
//! agree on semantics.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use polars::prelude::*;

use crate::error::{Result, SelectError};
use crate::value::{common_len, Datum, Scalar};

pub trait ScalarUdf: Send + Sync {
    /// Inclusive argument bounds; `None` upper bound means variadic.
    fn arity(&self) -> (usize, Option<usize>);

    fn invoke(&self, args: Vec<Datum>) -> Result<Datum>;

    fn to_expr(&self, args: Vec<Expr>) -> Result<Expr>;

    /// `to_expr` with the argument types, where the lowering could resolve
    /// them. Override when the expression depends on the input types.
    fn to_expr_typed(&self, args: Vec<Expr>, _dtypes: &[Option<DataType>]) -> Result<Expr> {
        self.to_expr(args)
    }
}

/// Name-keyed scalar function table. Clones share the underlying map; use
/// `snapshot` for an independent copy.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    inner: Arc<Mutex<HashMap<String, Arc<dyn ScalarUdf>>>>,
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names = self.names();
        names.sort();
        f.debug_struct("FunctionRegistry").field("functions", &names).finish()
    }
}

impl FunctionRegistry {
    /// Empty registry; see `with_builtins` for the usual starting point.
    pub fn new() -> Self { Self::default() }

    pub fn with_builtins() -> Self {
        let reg = Self::new();
        reg.register("IFNULL", Arc::new(Coalesce { min: 2, max: Some(2) }));
        reg.register("COALESCE", Arc::new(Coalesce { min: 1, max: None }));
        reg.register("IF", Arc::new(IfThenElse));
        reg
    }

    #[inline]
    fn norm(name: &str) -> String { name.to_ascii_uppercase() }

    /// Register or replace a function under `name` (case-insensitive).
    pub fn register(&self, name: &str, udf: Arc<dyn ScalarUdf>) {
        self.inner.lock().insert(Self::norm(name), udf);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ScalarUdf>> {
        self.inner.lock().get(&Self::norm(name)).cloned()
    }

    /// Look up `name` and check the call's argument count against its arity.
    pub fn resolve(&self, name: &str, argc: usize) -> Result<Arc<dyn ScalarUdf>> {
        let udf = self.get(name).ok_or_else(|| SelectError::UndefinedFunction(name.to_string()))?;
        let (min, max) = udf.arity();
        if argc < min || max.is_some_and(|m| argc > m) {
            let expect = match max {
                Some(m) if m == min => format!("{}", min),
                Some(m) => format!("{}..{}", min, m),
                None => format!("at least {}", min),
            };
            return Err(SelectError::expr(format!("{} expects {} argument(s), got {}", name, expect, argc)));
        }
        Ok(udf)
    }

    pub fn names(&self) -> Vec<String> {
        self.inner.lock().keys().cloned().collect()
    }

    pub fn snapshot(&self) -> Self {
        let map = self.inner.lock().clone();
        Self { inner: Arc::new(Mutex::new(map)) }
    }
}

/// IFNULL / COALESCE: the first argument that is neither null nor NaN.
struct Coalesce {
    min: usize,
    max: Option<usize>,
}

/// Polars predicate matching `Scalar::is_missing` negated. Only float
/// inputs can hold NaN.
fn present(e: Expr, float: bool) -> Expr {
    if float {
        let nan = e.clone().is_nan().fill_null(lit(false));
        e.is_not_null().and(nan.not())
    } else {
        e.is_not_null()
    }
}

impl ScalarUdf for Coalesce {
    fn arity(&self) -> (usize, Option<usize>) { (self.min, self.max) }

    fn invoke(&self, args: Vec<Datum>) -> Result<Datum> {
        let pick = |i: usize| -> Scalar {
            args.iter().map(|a| a.at(i)).find(|v| !v.is_missing()).cloned().unwrap_or(Scalar::Null)
        };
        if args.iter().all(|a| a.len().is_none()) {
            return Ok(Datum::Scalar(pick(0)));
        }
        let n = common_len(&args.iter().collect::<Vec<_>>())?;
        Ok(Datum::Column((0..n).map(pick).collect()))
    }

    fn to_expr(&self, args: Vec<Expr>) -> Result<Expr> {
        self.to_expr_typed(args, &[])
    }

    fn to_expr_typed(&self, args: Vec<Expr>, dtypes: &[Option<DataType>]) -> Result<Expr> {
        let mut acc = lit(Null {});
        for (i, a) in args.into_iter().enumerate().rev() {
            let float = matches!(dtypes.get(i), Some(Some(dt)) if dt.is_float());
            acc = when(present(a.clone(), float)).then(a).otherwise(acc);
        }
        Ok(acc)
    }
}

/// IF(cond, a, b). A null condition selects `b`.
struct IfThenElse;

impl ScalarUdf for IfThenElse {
    fn arity(&self) -> (usize, Option<usize>) { (3, Some(3)) }

    fn invoke(&self, mut args: Vec<Datum>) -> Result<Datum> {
        let otherwise = args.pop().unwrap_or(Datum::Scalar(Scalar::Null));
        let then = args.pop().unwrap_or(Datum::Scalar(Scalar::Null));
        let cond = args.pop().unwrap_or(Datum::Scalar(Scalar::Null));
        match &cond {
            Datum::Scalar(c) => Ok(if c.truthy() == Some(true) { then } else { otherwise }),
            Datum::Column(_) => {
                let n = common_len(&[&cond, &then, &otherwise])?;
                let out = (0..n)
                    .map(|i| if cond.at(i).truthy() == Some(true) { then.at(i).clone() } else { otherwise.at(i).clone() })
                    .collect();
                Ok(Datum::Column(out))
            }
        }
    }

    fn to_expr(&self, args: Vec<Expr>) -> Result<Expr> {
        let [cond, then, otherwise]: [Expr; 3] = args
            .try_into()
            .map_err(|_| SelectError::expr("IF expects 3 arguments"))?;
        Ok(when(cond).then(then).otherwise(otherwise))
    }
}

/// Aggregates available in group context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggFunc { Sum, Avg, Min, Max, Count, First, Last }

impl AggFunc {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "SUM" => Some(AggFunc::Sum),
            "AVG" | "MEAN" => Some(AggFunc::Avg),
            "MIN" => Some(AggFunc::Min),
            "MAX" => Some(AggFunc::Max),
            "COUNT" => Some(AggFunc::Count),
            "FIRST" => Some(AggFunc::First),
            "LAST" => Some(AggFunc::Last),
            _ => None,
        }
    }

    /// Reduce one group's values.
    pub fn reduce(&self, values: &[Scalar]) -> Result<Scalar> {
        let non_null = || values.iter().filter(|v| !v.is_null());
        match self {
            AggFunc::Count => Ok(Scalar::Int(non_null().count() as i64)),
            AggFunc::First => Ok(values.first().cloned().unwrap_or(Scalar::Null)),
            AggFunc::Last => Ok(values.last().cloned().unwrap_or(Scalar::Null)),
            AggFunc::Sum => {
                let mut int_sum: i64 = 0;
                let mut float_sum: Option<f64> = None;
                for v in non_null() {
                    match v {
                        Scalar::Int(i) => int_sum = int_sum.wrapping_add(*i),
                        Scalar::Bool(b) => int_sum += *b as i64,
                        Scalar::Float(f) => *float_sum.get_or_insert(0.0) += f,
                        other => return Err(SelectError::exec(format!("SUM over non-numeric value '{}'", other))),
                    }
                }
                Ok(match float_sum {
                    Some(f) => Scalar::Float(f + int_sum as f64),
                    None => Scalar::Int(int_sum),
                })
            }
            AggFunc::Avg => {
                let mut n = 0usize;
                let mut total = 0.0f64;
                for v in non_null() {
                    let f = v.as_f64().ok_or_else(|| SelectError::exec(format!("AVG over non-numeric value '{}'", v)))?;
                    total += f;
                    n += 1;
                }
                Ok(if n == 0 { Scalar::Null } else { Scalar::Float(total / n as f64) })
            }
            AggFunc::Min | AggFunc::Max => {
                let mut best: Option<&Scalar> = None;
                for v in non_null() {
                    best = match best {
                        None => Some(v),
                        Some(b) => {
                            let ord = v.partial_cmp_value(b).ok_or_else(|| {
                                SelectError::exec(format!("cannot compare '{}' with '{}'", v, b))
                            })?;
                            let take = if *self == AggFunc::Min { ord.is_lt() } else { ord.is_gt() };
                            Some(if take { v } else { b })
                        }
                    };
                }
                Ok(best.cloned().unwrap_or(Scalar::Null))
            }
        }
    }

    pub fn to_expr(&self, e: Expr) -> Expr {
        match self {
            AggFunc::Sum => e.sum(),
            AggFunc::Avg => e.mean(),
            AggFunc::Min => e.min(),
            AggFunc::Max => e.max(),
            AggFunc::Count => e.count(),
            AggFunc::First => e.first(),
            AggFunc::Last => e.last(),
        }
    }
}
