//! Operator pipeline executor.
//!
//! Threads one `TableValue` through the operator sequence. Each operator's
//! failure is terminal and comes back wrapped with its position and text.

pub mod group;

use polars::prelude::DataFrame;
use tracing::debug;

use crate::context::Context;
use crate::engine::{AggItem, Engine, GroupKey, Grouping, JoinPlan, ProjectItem, Table, TableValue};
use crate::error::{Result, SelectError};
use crate::exec::group::{split_group_projection, Slot};
use crate::ident::resolve_column;
use crate::query::{normalize_predicate, parse_expr, ColumnItem, JoinKey, JoinMode, Operator, OrderItem, TableRef};

/// Run `ops` against `ctx` on its active engine.
pub fn execute(ops: &[Operator], ctx: &mut Context) -> Result<TableValue> {
    let engine = ctx.engine();
    let mut current: Option<TableValue> = None;
    for (i, op) in ops.iter().enumerate() {
        debug!(target: "framequery::exec", "op #{} [{}] {}", i, engine.name(), op);
        let at_stage = |e: SelectError| e.at_stage(i, op.to_string());
        let next = step(op, current.take(), ctx, engine.as_ref()).map_err(at_stage)?;
        // deferred plans only type-check when their schema is resolved
        let cols = next.columns().map_err(|e| {
            debug!(target: "framequery::exec", "op #{} {} -> schema error: {}", i, op.kind(), e);
            at_stage(e)
        })?;
        debug!(target: "framequery::exec", "op #{} {} -> columns={:?} grouped={}", i, op.kind(), cols, next.is_grouped());
        current = Some(next);
    }
    current.ok_or_else(|| SelectError::exec("empty operator sequence"))
}

/// `execute` followed by materialisation on the active engine.
pub fn execute_collect(ops: &[Operator], ctx: &mut Context) -> Result<DataFrame> {
    let engine = ctx.engine();
    let value = execute(ops, ctx)?;
    engine.collect(value.into_plain("result")?)
}

fn step(op: &Operator, input: Option<TableValue>, ctx: &mut Context, engine: &dyn Engine) -> Result<TableValue> {
    let input = match (op, input) {
        (Operator::Load(t), None) => return Ok(TableValue::plain(engine.load(ctx, t)?)),
        (Operator::Load(_), Some(_)) => return Err(SelectError::exec("LOAD may only start a pipeline")),
        (_, None) => return Err(SelectError::exec(format!("pipeline must start with LOAD, found {}", op.kind()))),
        (_, Some(v)) => v,
    };
    match op {
        Operator::Load(_) => unreachable!("handled above"),
        Operator::Join { table, mode, on } => join(input, table, *mode, on, ctx, engine),
        Operator::Project(items) => project(input, items, ctx, engine),
        Operator::Filter(predicate) => {
            let expr = parse_expr(&normalize_predicate(predicate))?;
            let t = input.into_plain("FILTER")?;
            Ok(TableValue::plain(engine.filter(t, &expr, ctx.functions())?))
        }
        Operator::Group { keys, projection } => group(input, keys, projection, ctx, engine),
        Operator::Order(items) => order(input, items, ctx, engine),
        Operator::Limit { offset, count } => {
            let t = input.into_plain("LIMIT")?;
            Ok(TableValue::plain(engine.slice(t, *offset, *count)?))
        }
    }
}

/// Orient each key pair so the first name belongs to the left table and the
/// second to `alias`, then resolve both against their side's columns.
pub fn orient_join_keys(on: &[JoinKey], alias: &str, left: &[String], right: &[String]) -> Result<(Vec<String>, Vec<String>)> {
    let mut left_on = Vec::with_capacity(on.len());
    let mut right_on = Vec::with_capacity(on.len());
    for k in on {
        let first_is_right = k.first.qualifier() == Some(alias);
        let second_is_right = k.second.qualifier() == Some(alias);
        let (l, r) = match (first_is_right, second_is_right) {
            (false, true) => (&k.first, &k.second),
            (true, false) => (&k.second, &k.first),
            _ => {
                let fits = |l: &str, r: &str| resolve_column(l, left).is_ok() && resolve_column(r, right).is_ok();
                if fits(&k.first.name, &k.second.name) {
                    (&k.first, &k.second)
                } else if fits(&k.second.name, &k.first.name) {
                    (&k.second, &k.first)
                } else {
                    return Err(SelectError::join(format!(
                        "cannot attribute join condition {} = {} to table {}", k.first.name, k.second.name, alias
                    )));
                }
            }
        };
        left_on.push(resolve_column(&l.name, left)?);
        right_on.push(resolve_column(&r.name, right)?);
    }
    Ok((left_on, right_on))
}

fn join(input: TableValue, table: &TableRef, mode: JoinMode, on: &[JoinKey], ctx: &mut Context, engine: &dyn Engine) -> Result<TableValue> {
    let left = input.into_plain("JOIN")?;
    let right = engine.load(ctx, table)?;
    let (left_on, right_on) = orient_join_keys(on, &table.alias, &left.column_names()?, &right.column_names()?)?;
    let plan = JoinPlan { mode, alias: table.alias.clone(), left_on, right_on };
    debug!(target: "framequery::exec", "join plan: {}", plan);
    Ok(TableValue::plain(engine.join(left, right, &plan)?))
}

fn project(input: TableValue, items: &[ColumnItem], ctx: &Context, engine: &dyn Engine) -> Result<TableValue> {
    match input.grouping {
        Grouping::Plain => {
            let columns = input.table.column_names()?;
            let plan: Vec<ProjectItem> = items
                .iter()
                .map(|it| match it.expr.as_column().and_then(|c| resolve_column(&c.name, &columns).ok()) {
                    Some(source) => ProjectItem::Column { source, alias: it.alias.clone() },
                    None => ProjectItem::Computed { expr: it.expr.clone(), alias: it.alias.clone() },
                })
                .collect();
            Ok(TableValue::plain(engine.project(input.table, &plan, ctx.functions())?))
        }
        Grouping::Grouped(keys) => {
            let key_items: Vec<ColumnItem> = keys.iter().map(|k| k.item.clone()).collect();
            let slots = split_group_projection(&key_items, items)?;
            let plan: Vec<AggItem> = items
                .iter()
                .zip(&slots)
                .map(|(it, slot)| match slot {
                    Slot::Key(k) => AggItem::Key { column: keys[*k].column.clone(), alias: it.alias.clone() },
                    Slot::Aggregate => AggItem::Agg { expr: it.expr.clone(), alias: it.alias.clone() },
                })
                .collect();
            let key_columns: Vec<String> = keys.iter().map(|k| k.column.clone()).collect();
            Ok(TableValue::plain(engine.aggregate(input.table, &key_columns, &plan, ctx.functions())?))
        }
    }
}

fn group(input: TableValue, keys: &[ColumnItem], projection: &[ColumnItem], ctx: &Context, engine: &dyn Engine) -> Result<TableValue> {
    let mut table: Table = input.into_plain("GROUP")?;
    let columns = table.column_names()?;
    let mut computed = Vec::new();
    let mut resolved = Vec::with_capacity(keys.len());
    for key in keys {
        let column = match key.expr.as_column() {
            Some(c) => resolve_column(&c.name, &columns)?,
            None => {
                computed.push((key.alias.clone(), key.expr.clone()));
                key.alias.clone()
            }
        };
        resolved.push(GroupKey { column, item: key.clone() });
    }
    split_group_projection(keys, projection)?;
    if !computed.is_empty() {
        table = engine.extend_columns(table, &computed, ctx.functions())?;
    }
    Ok(TableValue { table, grouping: Grouping::Grouped(resolved) })
}

fn order(input: TableValue, items: &[OrderItem], ctx: &Context, engine: &dyn Engine) -> Result<TableValue> {
    let mut table = input.into_plain("ORDER")?;
    let columns = table.column_names()?;
    let mut temps = Vec::new();
    let mut keys = Vec::with_capacity(items.len());
    let mut descending = Vec::with_capacity(items.len());
    for (i, it) in items.iter().enumerate() {
        let direct = it.item.expr.as_column().and_then(|c| resolve_column(&c.name, &columns).ok())
            .or_else(|| columns.iter().find(|c| **c == it.item.text).cloned());
        let key = match direct {
            Some(c) => c,
            None => {
                let tmp = format!("__fq_order_{}", i);
                temps.push((tmp.clone(), it.item.expr.clone()));
                tmp
            }
        };
        keys.push(key);
        descending.push(!it.ascending);
    }
    if !temps.is_empty() {
        table = engine.extend_columns(table, &temps, ctx.functions())?;
    }
    let mut sorted = engine.sort(table, &keys, &descending)?;
    if !temps.is_empty() {
        sorted = engine.select_columns(sorted, &columns)?;
    }
    Ok(TableValue::plain(sorted))
}
