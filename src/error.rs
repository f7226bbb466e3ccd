//! Unified error model for query compilation and execution.
//! Every failure surfaces as a `SelectError`; `kind()` folds the variants into
//! the four reporting kinds (parse, context, translation, execution).

use std::fmt::{Display, Formatter};

use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Parse,
    Context,
    Translation,
    Execution,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Parse => "parse_error",
            ErrorKind::Context => "context_error",
            ErrorKind::Translation => "translation_error",
            ErrorKind::Execution => "exec_error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum SelectError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("table {0} not found")]
    TableNotFound(String),

    #[error("config key {0} not found")]
    ConfigNotFound(String),

    #[error("invalid config {key}: {reason}")]
    InvalidConfig { key: String, reason: String },

    #[error("invalid column {name}; available columns: [{}]", available.join(", "))]
    ColumnNotFound { name: String, available: Vec<String> },

    #[error("udf [{0}] not defined")]
    UndefinedFunction(String),

    #[error("invalid expression: {0}")]
    InvalidExpression(String),

    #[error("group-by keys {missing:?} not used in select clause; non-aggregate columns {extra:?} are not group-by keys")]
    GroupBy { missing: Vec<String>, extra: Vec<String> },

    #[error("join error: {0}")]
    Join(String),

    #[error("execution error: {0}")]
    Execution(String),

    #[error(transparent)]
    Polars(#[from] PolarsError),

    #[error("operator #{index} {operator} failed: {source}")]
    Stage {
        index: usize,
        operator: String,
        #[source]
        source: Box<SelectError>,
    },
}

pub type Result<T> = std::result::Result<T, SelectError>;

impl SelectError {
    pub fn parse<S: Into<String>>(msg: S) -> Self { SelectError::Parse(msg.into()) }
    pub fn exec<S: Into<String>>(msg: S) -> Self { SelectError::Execution(msg.into()) }
    pub fn expr<S: Into<String>>(msg: S) -> Self { SelectError::InvalidExpression(msg.into()) }
    pub fn join<S: Into<String>>(msg: S) -> Self { SelectError::Join(msg.into()) }

    pub fn column_not_found<S: AsRef<str>>(name: &str, available: &[S]) -> Self {
        SelectError::ColumnNotFound {
            name: name.to_string(),
            available: available.iter().map(|s| s.as_ref().to_string()).collect(),
        }
    }

    /// Attach pipeline position and operator description to a failure.
    pub fn at_stage(self, index: usize, operator: String) -> Self {
        SelectError::Stage { index, operator, source: Box::new(self) }
    }

    /// Innermost error, looking through stage wrappers.
    pub fn root(&self) -> &SelectError {
        let mut cur = self;
        while let SelectError::Stage { source, .. } = cur {
            cur = source;
        }
        cur
    }

    pub fn kind(&self) -> ErrorKind {
        match self.root() {
            SelectError::Parse(_) => ErrorKind::Parse,
            SelectError::TableNotFound(_)
            | SelectError::ConfigNotFound(_)
            | SelectError::InvalidConfig { .. } => ErrorKind::Context,
            SelectError::ColumnNotFound { .. }
            | SelectError::UndefinedFunction(_)
            | SelectError::InvalidExpression(_) => ErrorKind::Translation,
            SelectError::GroupBy { .. }
            | SelectError::Join(_)
            | SelectError::Execution(_)
            | SelectError::Polars(_)
            | SelectError::Stage { .. } => ErrorKind::Execution,
        }
    }
}
