//! Cell values for row-wise evaluation.
//!
//! `Scalar` is the engine-neutral cell type the local engine evaluates with;
//! `Datum` is either one scalar or a whole column of them (group context).

use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

use polars::prelude::*;

use crate::error::{Result, SelectError};
use crate::query::{BinaryOp, Literal};

#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Scalar {
    pub fn is_null(&self) -> bool { matches!(self, Scalar::Null) }

    /// Null or NaN: the values IFNULL/COALESCE skip over.
    pub fn is_missing(&self) -> bool {
        match self {
            Scalar::Null => true,
            Scalar::Float(f) => f.is_nan(),
            _ => false,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(i) => Some(*i as f64),
            Scalar::Float(f) => Some(*f),
            Scalar::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Truth value for conditions; `None` for null.
    pub fn truthy(&self) -> Option<bool> {
        match self {
            Scalar::Null => None,
            Scalar::Bool(b) => Some(*b),
            Scalar::Int(i) => Some(*i != 0),
            Scalar::Float(f) => Some(*f != 0.0 && !f.is_nan()),
            Scalar::Str(s) => Some(!s.is_empty()),
        }
    }

    pub fn from_literal(l: &Literal) -> Self {
        match l {
            Literal::Null => Scalar::Null,
            Literal::Bool(b) => Scalar::Bool(*b),
            Literal::Int(i) => Scalar::Int(*i),
            Literal::Float(f) => Scalar::Float(*f),
            Literal::Str(s) => Scalar::Str(s.clone()),
        }
    }

    pub fn from_any(av: AnyValue<'_>) -> Self {
        match av {
            AnyValue::Null => Scalar::Null,
            AnyValue::Boolean(b) => Scalar::Bool(b),
            AnyValue::Int64(v) => Scalar::Int(v),
            AnyValue::Int32(v) => Scalar::Int(v as i64),
            AnyValue::UInt32(v) => Scalar::Int(v as i64),
            AnyValue::UInt64(v) => i64::try_from(v).map(Scalar::Int).unwrap_or(Scalar::Float(v as f64)),
            AnyValue::Float64(v) => Scalar::Float(v),
            AnyValue::Float32(v) => Scalar::Float(v as f64),
            AnyValue::String(s) => Scalar::Str(s.to_string()),
            AnyValue::StringOwned(s) => Scalar::Str(s.to_string()),
            other => {
                let dt = other.dtype();
                // temporal cells travel as their physical integer; the engine casts results back
                if dt.is_integer() || dt.is_temporal() {
                    other.extract::<i64>().map(Scalar::Int).unwrap_or(Scalar::Null)
                } else if dt.is_float() || dt.is_decimal() {
                    other.extract::<f64>().map(Scalar::Float).unwrap_or(Scalar::Null)
                } else {
                    Scalar::Str(other.to_string())
                }
            }
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Scalar::Null => "null",
            Scalar::Bool(_) => "bool",
            Scalar::Int(_) => "int",
            Scalar::Float(_) => "float",
            Scalar::Str(_) => "str",
        }
    }

    /// Apply an arithmetic, comparison or logical operator to two cells.
    pub fn binary(&self, op: BinaryOp, other: &Scalar) -> Result<Scalar> {
        match op {
            BinaryOp::And | BinaryOp::Or => Ok(logical(op, self.truthy(), other.truthy())),
            _ if op.is_comparison() => self.compare_with(op, other),
            _ => self.arith(op, other),
        }
    }

    fn arith(&self, op: BinaryOp, other: &Scalar) -> Result<Scalar> {
        use self::Scalar::*;
        if self.is_null() || other.is_null() {
            return Ok(Null);
        }
        match (self, other) {
            (Int(a), Int(b)) => Ok(match op {
                BinaryOp::Add => a.checked_add(*b).map(Int).unwrap_or(Float(*a as f64 + *b as f64)),
                BinaryOp::Sub => a.checked_sub(*b).map(Int).unwrap_or(Float(*a as f64 - *b as f64)),
                BinaryOp::Mul => a.checked_mul(*b).map(Int).unwrap_or(Float(*a as f64 * *b as f64)),
                BinaryOp::Div => Float(*a as f64 / *b as f64),
                BinaryOp::Mod => if *b == 0 { Null } else { Int(floored_rem_int(*a, *b)) },
                _ => unreachable!("non-arithmetic operator routed to arith"),
            }),
            (Str(a), Str(b)) if op == BinaryOp::Add => Ok(Str(format!("{}{}", a, b))),
            (l, r) => match (l.as_f64(), r.as_f64()) {
                (Some(a), Some(b)) if !matches!(l, Str(_)) && !matches!(r, Str(_)) => Ok(Float(match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Div => a / b,
                    BinaryOp::Mod => floored_rem(a, b),
                    _ => unreachable!("non-arithmetic operator routed to arith"),
                })),
                _ => Err(SelectError::expr(format!(
                    "cannot apply '{}' to {} and {}", op.symbol(), l.type_name(), r.type_name()
                ))),
            },
        }
    }

    fn compare_with(&self, op: BinaryOp, other: &Scalar) -> Result<Scalar> {
        if self.is_null() || other.is_null() {
            return Ok(Scalar::Null);
        }
        let ord = self.partial_cmp_value(other).ok_or_else(|| {
            SelectError::expr(format!("cannot compare {} with {}", self.type_name(), other.type_name()))
        })?;
        let b = match op {
            BinaryOp::Eq => ord == Ordering::Equal,
            BinaryOp::NotEq => ord != Ordering::Equal,
            BinaryOp::Lt => ord == Ordering::Less,
            BinaryOp::LtEq => ord != Ordering::Greater,
            BinaryOp::Gt => ord == Ordering::Greater,
            BinaryOp::GtEq => ord != Ordering::Less,
            _ => unreachable!("non-comparison operator routed to compare"),
        };
        Ok(Scalar::Bool(b))
    }

    /// Ordering between two non-null cells of compatible types.
    pub fn partial_cmp_value(&self, other: &Scalar) -> Option<Ordering> {
        use self::Scalar::*;
        match (self, other) {
            (Int(a), Int(b)) => Some(a.cmp(b)),
            (Str(a), Str(b)) => Some(a.cmp(b)),
            (Bool(a), Bool(b)) => Some(a.cmp(b)),
            (Str(_), _) | (_, Str(_)) => None,
            (a, b) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        }
    }

    /// Total order used for sorting: nulls compare greater than every value.
    pub fn sort_cmp(&self, other: &Scalar) -> Ordering {
        match (self.is_null(), other.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            _ => self.partial_cmp_value(other).unwrap_or_else(|| self.type_name().cmp(other.type_name())),
        }
    }

    /// Hashable identity used to bucket rows into groups.
    pub fn group_key(&self) -> HashKey {
        match self {
            Scalar::Null => HashKey::Null,
            Scalar::Bool(b) => HashKey::Bool(*b),
            Scalar::Int(i) => HashKey::Int(*i),
            Scalar::Float(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => HashKey::Int(*f as i64),
            Scalar::Float(f) => HashKey::Float(f.to_bits()),
            Scalar::Str(s) => HashKey::Str(s.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HashKey {
    Null,
    Bool(bool),
    Int(i64),
    Float(u64),
    Str(String),
}

/// Remainder taking the sign of the divisor, as polars' `%` does.
fn floored_rem_int(a: i64, b: i64) -> i64 {
    let r = a.wrapping_rem(b);
    if r != 0 && (r < 0) != (b < 0) { r + b } else { r }
}

fn floored_rem(a: f64, b: f64) -> f64 {
    let r = a % b;
    if r != 0.0 && (r < 0.0) != (b < 0.0) { r + b } else { r }
}

fn logical(op: BinaryOp, l: Option<bool>, r: Option<bool>) -> Scalar {
    let out = match op {
        BinaryOp::And => match (l, r) {
            (Some(false), _) | (_, Some(false)) => Some(false),
            (Some(true), Some(true)) => Some(true),
            _ => None,
        },
        _ => match (l, r) {
            (Some(true), _) | (_, Some(true)) => Some(true),
            (Some(false), Some(false)) => Some(false),
            _ => None,
        },
    };
    out.map(Scalar::Bool).unwrap_or(Scalar::Null)
}

impl Display for Scalar {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Scalar::Null => f.write_str("null"),
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Float(v) => write!(f, "{}", v),
            Scalar::Str(s) => f.write_str(s),
        }
    }
}

/// One cell, or a column of cells when evaluating inside a group.
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    Scalar(Scalar),
    Column(Vec<Scalar>),
}

impl Datum {
    pub fn len(&self) -> Option<usize> {
        match self {
            Datum::Scalar(_) => None,
            Datum::Column(v) => Some(v.len()),
        }
    }

    /// Element `i`, broadcasting scalars.
    pub fn at(&self, i: usize) -> &Scalar {
        match self {
            Datum::Scalar(s) => s,
            Datum::Column(v) => v.get(i).unwrap_or(&Scalar::Null),
        }
    }

    pub fn into_scalar(self) -> Result<Scalar> {
        match self {
            Datum::Scalar(s) => Ok(s),
            Datum::Column(_) => Err(SelectError::expr("expression does not reduce to a single value per group")),
        }
    }

    pub fn map(self, f: impl Fn(&Scalar) -> Result<Scalar>) -> Result<Datum> {
        match self {
            Datum::Scalar(s) => Ok(Datum::Scalar(f(&s)?)),
            Datum::Column(v) => Ok(Datum::Column(v.iter().map(f).collect::<Result<Vec<_>>>()?)),
        }
    }

    pub fn zip(self, other: Datum, f: impl Fn(&Scalar, &Scalar) -> Result<Scalar>) -> Result<Datum> {
        if let (Datum::Scalar(a), Datum::Scalar(b)) = (&self, &other) {
            return Ok(Datum::Scalar(f(a, b)?));
        }
        let n = common_len(&[&self, &other])?;
        let out = (0..n).map(|i| f(self.at(i), other.at(i))).collect::<Result<Vec<_>>>()?;
        Ok(Datum::Column(out))
    }
}

/// Shared length of the column-valued arguments; `0` columns means all scalars.
pub fn common_len(args: &[&Datum]) -> Result<usize> {
    let mut n: Option<usize> = None;
    for a in args {
        if let Some(l) = a.len() {
            match n {
                Some(m) if m != l => {
                    return Err(SelectError::exec(format!("column length mismatch: {} vs {}", m, l)));
                }
                _ => n = Some(l),
            }
        }
    }
    Ok(n.unwrap_or(1))
}

/// Build a typed series from evaluated cells. Ints mixed with floats widen to
/// Float64; any other mix falls back to strings.
pub fn series_from_scalars(name: &str, values: &[Scalar]) -> Series {
    let (mut bools, mut ints, mut floats, mut strs) = (false, false, false, false);
    for v in values {
        match v {
            Scalar::Null => {}
            Scalar::Bool(_) => bools = true,
            Scalar::Int(_) => ints = true,
            Scalar::Float(_) => floats = true,
            Scalar::Str(_) => strs = true,
        }
    }
    let name: PlSmallStr = name.into();
    match (bools, ints, floats, strs) {
        (false, false, false, false) => Series::new_null(name, values.len()),
        (true, false, false, false) => {
            let v: Vec<Option<bool>> = values.iter().map(|s| if let Scalar::Bool(b) = s { Some(*b) } else { None }).collect();
            Series::new(name, v)
        }
        (false, true, false, false) => {
            let v: Vec<Option<i64>> = values.iter().map(|s| if let Scalar::Int(i) = s { Some(*i) } else { None }).collect();
            Series::new(name, v)
        }
        (false, _, true, false) => {
            let v: Vec<Option<f64>> = values.iter().map(|s| if s.is_null() { None } else { s.as_f64() }).collect();
            Series::new(name, v)
        }
        _ => {
            let v: Vec<Option<String>> = values.iter().map(|s| if s.is_null() { None } else { Some(s.to_string()) }).collect();
            Series::new(name, v)
        }
    }
}

/// Materialise one column of a frame as cells.
pub fn column_scalars(df: &DataFrame, name: &str) -> Result<Vec<Scalar>> {
    let c = df.column(name)?;
    let mut out = Vec::with_capacity(c.len());
    for i in 0..c.len() {
        out.push(Scalar::from_any(c.get(i)?));
    }
    Ok(out)
}
