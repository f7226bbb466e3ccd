//! Expression translation.
//!
//! A `ScalarExpr` is bound against a table's column set and a function
//! registry, then lowered either into a `Compiled` tree the local engine
//! evaluates cell by cell, or into a polars `Expr` for the lazy engine.
//! Column references resolve by literal name first, then by bare name
//! (`t1.c` falls back to `c`).

pub mod eval;
pub mod polars_expr;

pub use eval::{compile, Binding, Compiled, FrameData, GroupBinding, RowBinding};
pub use polars_expr::{infer_dtype, result_dtype, to_polars, truthy_mask};

/// Evaluation context of an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// One value per row; aggregates are rejected.
    Row,
    /// One value per group; aggregates reduce the group's rows.
    Group,
}
