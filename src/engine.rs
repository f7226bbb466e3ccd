//! Backend engines.
//!
//! The executor owns operator semantics (key orientation, group validation,
//! temporary order columns); an `Engine` supplies the physical capabilities
//! those operators are built from. Two engines ship: `LocalEngine` works on
//! materialised `DataFrame`s cell by cell, `LazyEngine` builds a polars
//! `LazyFrame` plan and only runs it on `collect`.

pub mod lazy;
pub mod loaders;
pub mod local;

use std::fmt::{Display, Formatter};

use polars::prelude::*;

use crate::context::Context;
use crate::error::{Result, SelectError};
use crate::functions::FunctionRegistry;
use crate::ident::qualify;
use crate::query::{ColumnItem, JoinMode, ScalarExpr, TableRef};

pub use lazy::LazyEngine;
pub use loaders::{read_parquet, DirectoryLoader, TableLoader};
pub use local::LocalEngine;

/// A table as stored in the registry or threaded through the pipeline.
#[derive(Clone)]
pub enum Table {
    Frame(DataFrame),
    Lazy(LazyFrame),
}

impl Table {
    pub fn kind(&self) -> &'static str {
        match self {
            Table::Frame(_) => "frame",
            Table::Lazy(_) => "lazy",
        }
    }

    /// Lazy tables resolve their schema without running the plan; plan
    /// errors (bad types, missing columns) surface here.
    pub fn schema(&self) -> Result<SchemaRef> {
        match self {
            Table::Frame(df) => Ok(df.schema().clone()),
            Table::Lazy(lf) => Ok(lf.clone().collect_schema()?),
        }
    }

    /// Column names in order.
    pub fn column_names(&self) -> Result<Vec<String>> {
        Ok(self.schema()?.iter_names().map(|c| c.to_string()).collect())
    }

    pub fn into_frame(self) -> Result<DataFrame> {
        match self {
            Table::Frame(df) => Ok(df),
            Table::Lazy(lf) => Ok(lf.collect()?),
        }
    }

    pub fn into_lazy(self) -> LazyFrame {
        match self {
            Table::Frame(df) => df.lazy(),
            Table::Lazy(lf) => lf,
        }
    }
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Table::Frame(df) => write!(f, "Table::Frame({}x{})", df.height(), df.width()),
            Table::Lazy(_) => f.write_str("Table::Lazy(..)"),
        }
    }
}

impl From<DataFrame> for Table {
    fn from(df: DataFrame) -> Self { Table::Frame(df) }
}

impl From<LazyFrame> for Table {
    fn from(lf: LazyFrame) -> Self { Table::Lazy(lf) }
}

/// A group key: the physical column holding the key and the item it came from.
#[derive(Debug, Clone)]
pub struct GroupKey {
    pub column: String,
    pub item: ColumnItem,
}

#[derive(Debug, Clone)]
pub enum Grouping {
    Plain,
    Grouped(Vec<GroupKey>),
}

/// The value threaded between operators: a table plus its plain/grouped state.
#[derive(Debug, Clone)]
pub struct TableValue {
    pub table: Table,
    pub grouping: Grouping,
}

impl TableValue {
    pub fn plain(table: Table) -> Self { Self { table, grouping: Grouping::Plain } }

    pub fn is_grouped(&self) -> bool { matches!(self.grouping, Grouping::Grouped(_)) }

    pub fn columns(&self) -> Result<Vec<String>> { self.table.column_names() }

    /// The table of a plain value; grouped values must be projected first.
    pub fn into_plain(self, operator: &str) -> Result<Table> {
        match self.grouping {
            Grouping::Plain => Ok(self.table),
            Grouping::Grouped(_) => Err(SelectError::exec(format!("{} cannot run on a grouped table; project it first", operator))),
        }
    }
}

/// One output column of a plain projection.
#[derive(Debug, Clone)]
pub enum ProjectItem {
    /// Existing column copied under `alias`.
    Column { source: String, alias: String },
    Computed { expr: ScalarExpr, alias: String },
}

impl ProjectItem {
    pub fn alias(&self) -> &str {
        match self {
            ProjectItem::Column { alias, .. } | ProjectItem::Computed { alias, .. } => alias,
        }
    }
}

/// One output column of a grouped projection.
#[derive(Debug, Clone)]
pub enum AggItem {
    Key { column: String, alias: String },
    Agg { expr: ScalarExpr, alias: String },
}

impl AggItem {
    pub fn alias(&self) -> &str {
        match self {
            AggItem::Key { alias, .. } | AggItem::Agg { alias, .. } => alias,
        }
    }
}

/// Join with keys already oriented: `left_on[i]` pairs with `right_on[i]`.
#[derive(Debug, Clone)]
pub struct JoinPlan {
    pub mode: JoinMode,
    pub alias: String,
    pub left_on: Vec<String>,
    pub right_on: Vec<String>,
}

impl JoinPlan {
    pub fn how(&self) -> JoinType {
        match self.mode {
            JoinMode::Left => JoinType::Left,
            JoinMode::Right => JoinType::Right,
            JoinMode::Inner => JoinType::Inner,
        }
    }

    pub fn args(&self) -> JoinArgs {
        let mut args = JoinArgs::new(self.how());
        args.maintain_order = match self.mode {
            JoinMode::Right => MaintainOrderJoin::RightLeft,
            _ => MaintainOrderJoin::LeftRight,
        };
        args
    }

    /// Column names on the right after collision renaming, paired with the originals.
    pub fn renamed_right(&self, left: &[String], right: &[String]) -> Result<Vec<(String, String)>> {
        let mut out = Vec::with_capacity(right.len());
        for r in right {
            if left.iter().any(|l| l == r) {
                let q = qualify(&self.alias, r);
                if left.iter().any(|l| *l == q) || right.iter().any(|x| *x == q) {
                    return Err(SelectError::join(format!("cannot disambiguate column {}: {} already exists", r, q)));
                }
                out.push((r.clone(), q));
            } else {
                out.push((r.clone(), r.clone()));
            }
        }
        Ok(out)
    }

    pub(crate) fn hidden_left(i: usize) -> String { format!("__fq_lk_{}", i) }
    pub(crate) fn hidden_right(i: usize) -> String { format!("__fq_rk_{}", i) }
}

impl Display for JoinPlan {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let pairs: Vec<String> = self.left_on.iter().zip(&self.right_on).map(|(l, r)| format!("{}={}", l, r)).collect();
        write!(f, "{} JOIN {} ON [{}]", self.mode, self.alias, pairs.join(", "))
    }
}

/// Physical capabilities an operator pipeline is executed with.
pub trait Engine: Send + Sync {
    fn name(&self) -> &'static str;

    /// Called once by `Context::select_engine`.
    fn initialize(&self, _ctx: &mut Context) -> Result<()> { Ok(()) }

    /// Bring a registry table into this engine's representation.
    fn adopt(&self, table: Table) -> Result<Table>;

    /// Resolve `table_ref` through the context and adopt it.
    fn load(&self, ctx: &mut Context, table_ref: &TableRef) -> Result<Table> {
        let alias = if table_ref.is_aliased() { Some(table_ref.alias.as_str()) } else { None };
        let t = ctx.load_table(&table_ref.source, alias, None)?;
        self.adopt(t)
    }

    /// Add (or overwrite) one column per `(name, expr)`, evaluated per row.
    fn extend_columns(&self, table: Table, items: &[(String, ScalarExpr)], funcs: &FunctionRegistry) -> Result<Table>;

    fn project(&self, table: Table, items: &[ProjectItem], funcs: &FunctionRegistry) -> Result<Table>;

    /// One row per distinct key tuple (first-appearance order), or one row overall when `keys` is empty.
    fn aggregate(&self, table: Table, keys: &[String], items: &[AggItem], funcs: &FunctionRegistry) -> Result<Table>;

    fn filter(&self, table: Table, predicate: &ScalarExpr, funcs: &FunctionRegistry) -> Result<Table>;

    fn join(&self, left: Table, right: Table, plan: &JoinPlan) -> Result<Table>;

    /// Stable multi-key sort; nulls last regardless of direction.
    fn sort(&self, table: Table, keys: &[String], descending: &[bool]) -> Result<Table>;

    /// Rows `[offset, offset + count)`, clipped to the table.
    fn slice(&self, table: Table, offset: usize, count: usize) -> Result<Table>;

    fn select_columns(&self, table: Table, names: &[String]) -> Result<Table>;

    fn collect(&self, table: Table) -> Result<DataFrame> { table.into_frame() }
}

/// Reject duplicate output names of a projection.
pub(crate) fn check_unique<'a>(names: impl Iterator<Item = &'a str>) -> Result<()> {
    let mut seen: Vec<&str> = Vec::new();
    for n in names {
        if seen.contains(&n) {
            return Err(SelectError::exec(format!("duplicate output column {}", n)));
        }
        seen.push(n);
    }
    Ok(())
}
