//! Eager engine over materialised `DataFrame`s.
//!
//! Computed columns are evaluated cell by cell through `translate::eval` and
//! assigned immediately; aggregation walks each group's row indices.

use std::collections::HashMap;

use polars::prelude::*;
use tracing::debug;

use super::{check_unique, AggItem, Engine, JoinPlan, ProjectItem, Table};
use crate::context::Context;
use crate::error::Result;
use crate::functions::FunctionRegistry;
use crate::query::ScalarExpr;
use crate::translate::{compile, result_dtype, Compiled, FrameData, Scope};
use crate::value::{column_scalars, series_from_scalars, HashKey, Scalar};

/// Config key naming a directory of parquet files to fall back to.
pub const SOURCE_ROOT_KEY: &str = "local.source_root";

#[derive(Debug, Default, Clone, Copy)]
pub struct LocalEngine;

fn frame(table: Table) -> Result<DataFrame> { table.into_frame() }

fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names().iter().map(|c| c.to_string()).collect()
}

fn take_rows(df: &DataFrame, rows: &[u32]) -> Result<DataFrame> {
    let idx = IdxCa::from_vec("__take".into(), rows.iter().map(|r| *r as IdxSize).collect());
    Ok(df.take(&idx)?)
}

/// Compile `expr` against `df` and evaluate it once per row.
fn eval_rows(df: &DataFrame, expr: &ScalarExpr, funcs: &FunctionRegistry) -> Result<Vec<Scalar>> {
    let compiled = compile(expr, &column_names(df), funcs, Scope::Row)?;
    let data = FrameData::load(df, &compiled.referenced())?;
    compiled.eval_rows(&data)
}

/// Give a column built from cells the type the lazy engine would produce for
/// `expr`. Cells lose temporal and narrow integer types on the way through
/// `Scalar`; the resolved plan type restores them. Integer results that
/// widened to float on overflow stay float.
fn conform(series: Series, expr: &ScalarExpr, df: &DataFrame, funcs: &FunctionRegistry, scope: Scope) -> Series {
    let Ok(target) = result_dtype(expr, df.schema(), funcs, scope) else {
        return series;
    };
    let current = series.dtype().clone();
    let castable = match &current {
        c if *c == target => return series,
        DataType::Null => true,
        c if c.is_integer() => target.is_integer() || target.is_temporal() || target.is_float(),
        c if c.is_float() => target.is_float() || target.is_decimal(),
        _ => false,
    };
    if !castable {
        return series;
    }
    match series.cast(&target) {
        Ok(s) => s,
        Err(e) => {
            debug!(target: "framequery::engine", "local result {} kept as {}: {}", series.name(), current, e);
            series
        }
    }
}

/// Row indices of each distinct key tuple, in first-appearance order.
fn group_rows(df: &DataFrame, keys: &[String]) -> Result<Vec<Vec<usize>>> {
    if keys.is_empty() {
        return Ok(vec![(0..df.height()).collect()]);
    }
    let cols = keys.iter().map(|k| column_scalars(df, k)).collect::<Result<Vec<_>>>()?;
    let mut index: HashMap<Vec<HashKey>, usize> = HashMap::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for row in 0..df.height() {
        let key: Vec<HashKey> = cols.iter().map(|c| c[row].group_key()).collect();
        match index.get(&key) {
            Some(g) => groups[*g].push(row),
            None => {
                index.insert(key, groups.len());
                groups.push(vec![row]);
            }
        }
    }
    Ok(groups)
}

impl Engine for LocalEngine {
    fn name(&self) -> &'static str { "local" }

    fn initialize(&self, ctx: &mut Context) -> Result<()> {
        ctx.register_source_root(SOURCE_ROOT_KEY)
    }

    fn adopt(&self, table: Table) -> Result<Table> {
        Ok(Table::Frame(table.into_frame()?))
    }

    fn extend_columns(&self, table: Table, items: &[(String, ScalarExpr)], funcs: &FunctionRegistry) -> Result<Table> {
        let mut df = frame(table)?;
        for (name, expr) in items {
            let values = eval_rows(&df, expr, funcs)?;
            let series = conform(series_from_scalars(name, &values), expr, &df, funcs, Scope::Row);
            df.with_column(series)?;
        }
        Ok(Table::Frame(df))
    }

    fn project(&self, table: Table, items: &[ProjectItem], funcs: &FunctionRegistry) -> Result<Table> {
        check_unique(items.iter().map(|i| i.alias()))?;
        let df = frame(table)?;
        let mut out: Vec<Column> = Vec::with_capacity(items.len());
        for item in items {
            match item {
                ProjectItem::Column { source, alias } => {
                    let mut c = df.column(source)?.clone();
                    c.rename(alias.as_str().into());
                    out.push(c);
                }
                ProjectItem::Computed { expr, alias } => {
                    let values = eval_rows(&df, expr, funcs)?;
                    out.push(conform(series_from_scalars(alias, &values), expr, &df, funcs, Scope::Row).into());
                }
            }
        }
        if out.is_empty() {
            return Ok(Table::Frame(DataFrame::empty()));
        }
        Ok(Table::Frame(DataFrame::new(out)?))
    }

    fn aggregate(&self, table: Table, keys: &[String], items: &[AggItem], funcs: &FunctionRegistry) -> Result<Table> {
        check_unique(items.iter().map(|i| i.alias()))?;
        let df = frame(table)?;
        let groups = group_rows(&df, keys)?;
        debug!(target: "framequery::engine", "local aggregate: keys={:?} groups={}", keys, groups.len());
        let firsts: Vec<u32> = groups.iter().filter_map(|g| g.first().map(|r| *r as u32)).collect();
        let names = column_names(&df);
        let mut out: Vec<Column> = Vec::with_capacity(items.len());
        for item in items {
            match item {
                AggItem::Key { column, alias } => {
                    let keyed = take_rows(&df.select([column.as_str()])?, &firsts)?;
                    let mut c = keyed.column(column)?.clone();
                    c.rename(alias.as_str().into());
                    out.push(c);
                }
                AggItem::Agg { expr, alias } => {
                    let compiled: Compiled = compile(expr, &names, funcs, Scope::Group)?;
                    let data = FrameData::load(&df, &compiled.referenced())?;
                    let values = compiled.eval_groups(&data, &groups)?;
                    out.push(conform(series_from_scalars(alias, &values), expr, &df, funcs, Scope::Group).into());
                }
            }
        }
        Ok(Table::Frame(DataFrame::new(out)?))
    }

    fn filter(&self, table: Table, predicate: &ScalarExpr, funcs: &FunctionRegistry) -> Result<Table> {
        let df = frame(table)?;
        let values = eval_rows(&df, predicate, funcs)?;
        let keep: Vec<bool> = values.iter().map(|v| v.truthy() == Some(true)).collect();
        let mask = BooleanChunked::from_slice("__mask".into(), &keep);
        Ok(Table::Frame(df.filter(&mask)?))
    }

    fn join(&self, left: Table, right: Table, plan: &JoinPlan) -> Result<Table> {
        let mut left = frame(left)?;
        let mut right = frame(right)?;
        let left_cols = column_names(&left);
        let renames = plan.renamed_right(&left_cols, &column_names(&right))?;
        for (from, to) in &renames {
            if from != to {
                right.rename(from, to.as_str().into())?;
            }
        }
        let mut lk: Vec<String> = Vec::with_capacity(plan.left_on.len());
        let mut rk: Vec<String> = Vec::with_capacity(plan.right_on.len());
        for (i, (l, r)) in plan.left_on.iter().zip(&plan.right_on).enumerate() {
            let r_now = renames.iter().find(|(from, _)| from == r).map(|(_, to)| to.clone()).unwrap_or_else(|| r.clone());
            let mut lc = left.column(l)?.clone();
            lc.rename(JoinPlan::hidden_left(i).into());
            left.with_column(lc)?;
            let mut rc = right.column(&r_now)?.clone();
            rc.rename(JoinPlan::hidden_right(i).into());
            right.with_column(rc)?;
            lk.push(JoinPlan::hidden_left(i));
            rk.push(JoinPlan::hidden_right(i));
        }
        debug!(target: "framequery::engine", "local join: {} right renames={:?}", plan, renames);
        let joined = left.join(&right, lk.iter().map(|s| s.as_str()), rk.iter().map(|s| s.as_str()), plan.args(), None)?;
        let order: Vec<&str> = left_cols.iter().map(|s| s.as_str()).chain(renames.iter().map(|(_, to)| to.as_str())).collect();
        Ok(Table::Frame(joined.select(order)?))
    }

    fn sort(&self, table: Table, keys: &[String], descending: &[bool]) -> Result<Table> {
        let df = frame(table)?;
        let cols = keys.iter().map(|k| column_scalars(&df, k)).collect::<Result<Vec<_>>>()?;
        let mut rows: Vec<u32> = (0..df.height() as u32).collect();
        rows.sort_by(|a, b| {
            for (c, desc) in cols.iter().zip(descending) {
                let (x, y) = (&c[*a as usize], &c[*b as usize]);
                let ord = if *desc && !x.is_null() && !y.is_null() { y.sort_cmp(x) } else { x.sort_cmp(y) };
                if ord.is_ne() {
                    return ord;
                }
            }
            std::cmp::Ordering::Equal
        });
        Ok(Table::Frame(take_rows(&df, &rows)?))
    }

    fn slice(&self, table: Table, offset: usize, count: usize) -> Result<Table> {
        let df = frame(table)?;
        let offset = offset.min(df.height());
        Ok(Table::Frame(df.slice(offset as i64, count)))
    }

    fn select_columns(&self, table: Table, names: &[String]) -> Result<Table> {
        let df = frame(table)?;
        Ok(Table::Frame(df.select(names.iter().map(|s| s.as_str()))?))
    }
}
