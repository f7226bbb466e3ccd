//! framequery: SELECT-style queries over in-memory polars tables.
//!
//! Query text is parsed into an operator sequence (`query`), which the
//! executor (`exec`) threads through the active backend engine of a
//! [`Context`]. Two engines share one operator contract: the eager
//! [`engine::LocalEngine`] over `DataFrame`s and the deferred
//! [`engine::LazyEngine`] that builds a polars `LazyFrame` plan.

pub mod context;
pub mod engine;
pub mod error;
pub mod exec;
pub mod functions;
pub mod ident;
pub mod output;
pub mod query;
pub mod translate;
pub mod value;

use polars::prelude::DataFrame;
use serde_json::{Map, Value};
use tracing::debug;

pub use context::Context;
pub use engine::{Engine, LazyEngine, LocalEngine, Table};
pub use error::{ErrorKind, Result, SelectError};
pub use functions::{FunctionRegistry, ScalarUdf};
pub use query::{parse_select, Operator};

/// Parse and run `query` against `ctx`. The result is a plain table; on the
/// lazy engine it is still an unmaterialised plan.
pub fn run(query: &str, ctx: &mut Context) -> Result<Table> {
    let ops = parse_select(query)?;
    debug!(target: "framequery::exec", "{} operators for query {:?}", ops.len(), query);
    exec::execute(&ops, ctx)?.into_plain("result")
}

/// `run` followed by materialisation on the context's engine.
pub fn run_collect(query: &str, ctx: &mut Context) -> Result<DataFrame> {
    let table = run(query, ctx)?;
    ctx.engine().collect(table)
}

/// Full entry point: `tables` are merged into the registry (replacing existing
/// keys) and `config` into the configuration before the query runs. Without a
/// context a fresh local-engine context is used and discarded.
pub fn run_with<I, K, T>(query: &str, ctx: Option<&mut Context>, tables: I, config: Option<Map<String, Value>>) -> Result<Table>
where
    I: IntoIterator<Item = (K, T)>,
    K: Into<String>,
    T: Into<Table>,
{
    let mut scratch;
    let ctx = match ctx {
        Some(c) => c,
        None => {
            scratch = Context::new();
            &mut scratch
        }
    };
    for (k, t) in tables {
        ctx.add_table(&k.into(), t.into(), true);
    }
    if let Some(cfg) = config {
        ctx.merge_config(cfg);
    }
    run(query, ctx)
}
