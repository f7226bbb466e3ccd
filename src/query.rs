//! Query front end: operator contract, scalar expression tree and the SELECT parser.

pub mod expr;
pub mod lexer;
pub mod operators;
mod parser;

pub use expr::{BinaryOp, ColumnRef, Literal, ScalarExpr, UnaryOp};
pub use operators::{ColumnItem, JoinKey, JoinMode, Operator, OrderItem, TableRef};

use crate::error::{Result, SelectError};
use crate::query::lexer::{strip_sql_comments, tokenize};
use crate::query::parser::Parser;

/// Parse SELECT text into its ordered operator sequence.
pub fn parse_select(text: &str) -> Result<Vec<Operator>> {
    let clean = strip_sql_comments(text);
    let toks = tokenize(&clean)?;
    if toks.is_empty() { return Err(SelectError::parse("empty query")); }
    let mut p = Parser::new(&clean, toks);
    p.parse_select()
}

/// Parse a single scalar expression.
pub fn parse_expr(text: &str) -> Result<ScalarExpr> {
    let toks = tokenize(text)?;
    let mut p = Parser::new(text, toks);
    let expr = p.parse_expr()?;
    if !p.at_end() {
        return Err(SelectError::parse(format!("unexpected trailing input in expression '{}'", text.trim())));
    }
    Ok(expr)
}

/// Rewrite every run of `=` outside string literals into `==`, leaving `!=`, `<=`
/// and `>=` alone. Predicates arrive in a dialect where `=` is equality.
pub fn normalize_predicate(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 4);
    let mut quote: Option<char> = None;
    let mut i = 0usize;
    while i < chars.len() {
        let ch = chars[i];
        if let Some(q) = quote {
            if ch == q { quote = None; }
            out.push(ch);
            i += 1;
            continue;
        }
        if ch == '\'' || ch == '"' {
            quote = Some(ch);
            out.push(ch);
            i += 1;
            continue;
        }
        if ch == '=' {
            let prev = out.chars().last();
            let mut j = i;
            while j < chars.len() && chars[j] == '=' { j += 1; }
            if matches!(prev, Some('!') | Some('<') | Some('>')) {
                out.extend(&chars[i..j]);
            } else {
                out.push_str("==");
            }
            i = j;
            continue;
        }
        out.push(ch);
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests;
