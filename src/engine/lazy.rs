//! Lazy engine: every operator extends a polars `LazyFrame` plan.
//!
//! Computed columns are symbolic (`with_columns`), column sets come from the
//! plan's schema, and nothing runs until `collect`.

use polars::prelude::*;
use tracing::debug;

use super::{check_unique, AggItem, Engine, JoinPlan, ProjectItem, Table};
use crate::context::Context;
use crate::error::Result;
use crate::functions::FunctionRegistry;
use crate::query::ScalarExpr;
use crate::translate::{infer_dtype, to_polars, truthy_mask, Scope};

/// Config key naming a directory of parquet files to fall back to.
pub const SOURCE_ROOT_KEY: &str = "lazy.source_root";

#[derive(Debug, Default, Clone, Copy)]
pub struct LazyEngine;

fn lowered(table: &Table, expr: &ScalarExpr, funcs: &FunctionRegistry, scope: Scope) -> Result<Expr> {
    to_polars(expr, &*table.schema()?, funcs, scope)
}

fn cols(names: &[String]) -> Vec<Expr> {
    names.iter().map(|n| col(n.as_str())).collect()
}

impl Engine for LazyEngine {
    fn name(&self) -> &'static str { "lazy" }

    fn initialize(&self, ctx: &mut Context) -> Result<()> {
        ctx.register_source_root(SOURCE_ROOT_KEY)
    }

    fn adopt(&self, table: Table) -> Result<Table> {
        Ok(Table::Lazy(table.into_lazy()))
    }

    fn extend_columns(&self, table: Table, items: &[(String, ScalarExpr)], funcs: &FunctionRegistry) -> Result<Table> {
        let mut exprs = Vec::with_capacity(items.len());
        for (name, expr) in items {
            exprs.push(lowered(&table, expr, funcs, Scope::Row)?.alias(name.as_str()));
        }
        Ok(Table::Lazy(table.into_lazy().with_columns(exprs)))
    }

    fn project(&self, table: Table, items: &[ProjectItem], funcs: &FunctionRegistry) -> Result<Table> {
        check_unique(items.iter().map(|i| i.alias()))?;
        let mut exprs = Vec::with_capacity(items.len());
        for item in items {
            exprs.push(match item {
                ProjectItem::Column { source, alias } => col(source.as_str()).alias(alias.as_str()),
                ProjectItem::Computed { expr, alias } => lowered(&table, expr, funcs, Scope::Row)?.alias(alias.as_str()),
            });
        }
        Ok(Table::Lazy(table.into_lazy().select(exprs)))
    }

    fn aggregate(&self, table: Table, keys: &[String], items: &[AggItem], funcs: &FunctionRegistry) -> Result<Table> {
        check_unique(items.iter().map(|i| i.alias()))?;
        let schema = table.schema()?;
        let lf = table.into_lazy();
        if keys.is_empty() {
            let mut exprs = Vec::with_capacity(items.len());
            for item in items {
                exprs.push(match item {
                    AggItem::Key { column, alias } => col(column.as_str()).first().alias(alias.as_str()),
                    AggItem::Agg { expr, alias } => to_polars(expr, &schema, funcs, Scope::Group)?.alias(alias.as_str()),
                });
            }
            return Ok(Table::Lazy(lf.select(exprs)));
        }
        let mut aggs = Vec::new();
        let mut outputs = Vec::with_capacity(items.len());
        for item in items {
            match item {
                AggItem::Key { column, alias } => outputs.push(col(column.as_str()).alias(alias.as_str())),
                AggItem::Agg { expr, alias } => {
                    let tmp = format!("__fq_agg_{}", aggs.len());
                    aggs.push(to_polars(expr, &schema, funcs, Scope::Group)?.alias(tmp.as_str()));
                    outputs.push(col(tmp.as_str()).alias(alias.as_str()));
                }
            }
        }
        debug!(target: "framequery::engine", "lazy aggregate: keys={:?} aggs={}", keys, aggs.len());
        Ok(Table::Lazy(lf.group_by_stable(cols(keys)).agg(aggs).select(outputs)))
    }

    fn filter(&self, table: Table, predicate: &ScalarExpr, funcs: &FunctionRegistry) -> Result<Table> {
        let schema = table.schema()?;
        let e = to_polars(predicate, &schema, funcs, Scope::Row)?;
        let mask = truthy_mask(e.clone(), &infer_dtype(&e, &schema)?)?;
        Ok(Table::Lazy(table.into_lazy().filter(mask)))
    }

    fn join(&self, left: Table, right: Table, plan: &JoinPlan) -> Result<Table> {
        let left_cols = left.column_names()?;
        let renames = plan.renamed_right(&left_cols, &right.column_names()?)?;
        let mut lf = left.into_lazy();
        let mut rf = right.into_lazy();
        let (from, to): (Vec<&str>, Vec<&str>) = renames.iter().filter(|(f, t)| f != t).map(|(f, t)| (f.as_str(), t.as_str())).unzip();
        if !from.is_empty() {
            rf = rf.rename(from, to, true);
        }
        let mut lk = Vec::with_capacity(plan.left_on.len());
        let mut rk = Vec::with_capacity(plan.right_on.len());
        for (i, (l, r)) in plan.left_on.iter().zip(&plan.right_on).enumerate() {
            let r_now = renames.iter().find(|(f, _)| f == r).map(|(_, t)| t.as_str()).unwrap_or(r.as_str());
            lf = lf.with_column(col(l.as_str()).alias(JoinPlan::hidden_left(i).as_str()));
            rf = rf.with_column(col(r_now).alias(JoinPlan::hidden_right(i).as_str()));
            lk.push(col(JoinPlan::hidden_left(i).as_str()));
            rk.push(col(JoinPlan::hidden_right(i).as_str()));
        }
        debug!(target: "framequery::engine", "lazy join: {} right renames={:?}", plan, renames);
        let order: Vec<Expr> = left_cols.iter().map(|c| col(c.as_str())).chain(renames.iter().map(|(_, t)| col(t.as_str()))).collect();
        Ok(Table::Lazy(lf.join(rf, lk, rk, plan.args()).select(order)))
    }

    fn sort(&self, table: Table, keys: &[String], descending: &[bool]) -> Result<Table> {
        let opts = SortMultipleOptions {
            descending: descending.to_vec(),
            nulls_last: vec![true; keys.len()],
            maintain_order: true,
            multithreaded: true,
            limit: None,
        };
        Ok(Table::Lazy(table.into_lazy().sort_by_exprs(cols(keys), opts)))
    }

    fn slice(&self, table: Table, offset: usize, count: usize) -> Result<Table> {
        let len = count.min(IdxSize::MAX as usize) as IdxSize;
        Ok(Table::Lazy(table.into_lazy().slice(offset.min(i64::MAX as usize) as i64, len)))
    }

    fn select_columns(&self, table: Table, names: &[String]) -> Result<Table> {
        Ok(Table::Lazy(table.into_lazy().select(cols(names))))
    }
}
