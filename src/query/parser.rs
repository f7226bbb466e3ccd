//! Recursive-descent parser for scalar expressions and the supported SELECT surface.

use crate::error::{Result, SelectError};
use crate::query::expr::{BinaryOp, ColumnRef, Literal, ScalarExpr, UnaryOp};
use crate::query::lexer::{Tok, Token};
use crate::query::operators::{ColumnItem, JoinKey, JoinMode, Operator, OrderItem, TableRef};

/// Words that end an expression or cannot stand as a bare alias.
const RESERVED: &[&str] = &[
    "SELECT", "FROM", "WHERE", "GROUP", "ORDER", "BY", "LIMIT", "OFFSET", "AS", "ON", "JOIN",
    "LEFT", "RIGHT", "INNER", "OUTER", "FULL", "CROSS", "AND", "OR", "NOT", "IN", "IS", "NULL",
    "ASC", "DESC", "HAVING", "UNION", "DISTINCT", "TRUE", "FALSE",
];

fn is_reserved(word: &str) -> bool { RESERVED.iter().any(|r| r.eq_ignore_ascii_case(word)) }

pub(crate) struct Parser<'a> {
    src: &'a str,
    toks: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(src: &'a str, toks: Vec<Token>) -> Self { Self { src, toks, pos: 0 } }

    fn peek(&self) -> Option<&Token> { self.toks.get(self.pos) }

    fn peek_at(&self, k: usize) -> Option<&Token> { self.toks.get(self.pos + k) }

    fn next(&mut self) -> Option<Token> {
        let t = self.toks.get(self.pos).cloned();
        if t.is_some() { self.pos += 1; }
        t
    }

    pub(crate) fn at_end(&self) -> bool { self.pos >= self.toks.len() }

    fn peek_kw(&self, kw: &str) -> bool { self.peek().map(|t| t.is_kw(kw)).unwrap_or(false) }

    fn eat_kw(&mut self, kw: &str) -> bool {
        if self.peek_kw(kw) { self.pos += 1; true } else { false }
    }

    fn expect_kw(&mut self, kw: &str) -> Result<()> {
        if self.eat_kw(kw) { Ok(()) } else { Err(self.unexpected(&format!("keyword {}", kw))) }
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.peek().map(|t| &t.tok == tok).unwrap_or(false) { self.pos += 1; true } else { false }
    }

    fn eat_op(&mut self, op: &str) -> bool {
        if matches!(self.peek().map(|t| &t.tok), Some(Tok::Op(o)) if *o == op) { self.pos += 1; true } else { false }
    }

    fn unexpected(&self, wanted: &str) -> SelectError {
        match self.peek() {
            Some(t) => SelectError::parse(format!("expected {} near '{}' (offset {})", wanted, &self.src[t.start..], t.start)),
            None => SelectError::parse(format!("expected {} at end of input", wanted)),
        }
    }

    /// Source text between two token positions (inclusive start, exclusive end).
    fn text(&self, from: usize, to: usize) -> String {
        if from >= to { return String::new(); }
        self.src[self.toks[from].start..self.toks[to - 1].end].trim().to_string()
    }

    // ---- expressions --------------------------------------------------------

    pub(crate) fn parse_expr(&mut self) -> Result<ScalarExpr> { self.parse_or() }

    fn parse_or(&mut self) -> Result<ScalarExpr> {
        let mut left = self.parse_and()?;
        while self.eat_kw("OR") {
            let right = self.parse_and()?;
            left = ScalarExpr::binary(left, BinaryOp::Or, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<ScalarExpr> {
        let mut left = self.parse_not()?;
        while self.eat_kw("AND") {
            let right = self.parse_not()?;
            left = ScalarExpr::binary(left, BinaryOp::And, right);
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<ScalarExpr> {
        if self.eat_kw("NOT") {
            let inner = self.parse_not()?;
            return Ok(ScalarExpr::Unary { op: UnaryOp::Not, expr: Box::new(inner) });
        }
        self.parse_cmp()
    }

    fn parse_cmp(&mut self) -> Result<ScalarExpr> {
        let left = self.parse_add()?;
        if self.eat_kw("IS") {
            let negated = self.eat_kw("NOT");
            self.expect_kw("NULL")?;
            return Ok(ScalarExpr::IsNull { expr: Box::new(left), negated });
        }
        let negated_in = self.peek_kw("NOT") && self.peek_at(1).map(|t| t.is_kw("IN")).unwrap_or(false);
        if negated_in { self.pos += 1; }
        if self.eat_kw("IN") {
            if !self.eat(&Tok::LParen) { return Err(self.unexpected("'(' after IN")); }
            if self.peek_kw("SELECT") { return Err(SelectError::parse("subqueries are not supported")); }
            let mut list = Vec::new();
            if !self.eat(&Tok::RParen) {
                loop {
                    list.push(self.parse_expr()?);
                    if self.eat(&Tok::Comma) {
                        // tolerate a trailing comma: `c in (7,)`
                        if self.eat(&Tok::RParen) { break; }
                        continue;
                    }
                    if self.eat(&Tok::RParen) { break; }
                    return Err(self.unexpected("',' or ')' in IN list"));
                }
            }
            return Ok(ScalarExpr::InList { expr: Box::new(left), list, negated: negated_in });
        }
        if negated_in { return Err(self.unexpected("IN after NOT")); }
        let op = match self.peek().map(|t| &t.tok) {
            Some(Tok::Op("=")) | Some(Tok::Op("==")) => Some(BinaryOp::Eq),
            Some(Tok::Op("!=")) => Some(BinaryOp::NotEq),
            Some(Tok::Op("<")) => Some(BinaryOp::Lt),
            Some(Tok::Op("<=")) => Some(BinaryOp::LtEq),
            Some(Tok::Op(">")) => Some(BinaryOp::Gt),
            Some(Tok::Op(">=")) => Some(BinaryOp::GtEq),
            _ => None,
        };
        if let Some(op) = op {
            self.pos += 1;
            let right = self.parse_add()?;
            return Ok(ScalarExpr::binary(left, op, right));
        }
        Ok(left)
    }

    fn parse_add(&mut self) -> Result<ScalarExpr> {
        let mut left = self.parse_mul()?;
        loop {
            let op = if self.eat_op("+") { BinaryOp::Add } else if self.eat_op("-") { BinaryOp::Sub } else { break };
            let right = self.parse_mul()?;
            left = ScalarExpr::binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_mul(&mut self) -> Result<ScalarExpr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = if self.eat_op("*") { BinaryOp::Mul }
                else if self.eat_op("/") { BinaryOp::Div }
                else if self.eat_op("%") { BinaryOp::Mod }
                else { break };
            let right = self.parse_unary()?;
            left = ScalarExpr::binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<ScalarExpr> {
        if self.eat_op("-") {
            let inner = self.parse_unary()?;
            return Ok(match inner {
                ScalarExpr::Literal(Literal::Int(i)) => ScalarExpr::Literal(Literal::Int(-i)),
                ScalarExpr::Literal(Literal::Float(v)) => ScalarExpr::Literal(Literal::Float(-v)),
                other => ScalarExpr::Unary { op: UnaryOp::Neg, expr: Box::new(other) },
            });
        }
        if self.eat_op("+") { return self.parse_unary(); }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<ScalarExpr> {
        let tok = match self.next() {
            Some(t) => t,
            None => return Err(self.unexpected("expression")),
        };
        match tok.tok {
            Tok::Number(n) => {
                if n.contains('.') {
                    n.parse::<f64>().map(|v| ScalarExpr::Literal(Literal::Float(v)))
                        .map_err(|_| SelectError::parse(format!("invalid number {}", n)))
                } else {
                    Ok(match n.parse::<i64>() {
                        Ok(i) => ScalarExpr::Literal(Literal::Int(i)),
                        Err(_) => ScalarExpr::Literal(Literal::Float(n.parse::<f64>().unwrap_or(f64::INFINITY))),
                    })
                }
            }
            Tok::Str(s) => Ok(ScalarExpr::Literal(Literal::Str(s))),
            Tok::LParen => {
                if self.peek_kw("SELECT") { return Err(SelectError::parse("subqueries are not supported")); }
                let inner = self.parse_expr()?;
                if !self.eat(&Tok::RParen) { return Err(self.unexpected("')'")); }
                Ok(inner)
            }
            Tok::Ident(word) => {
                if word.eq_ignore_ascii_case("NULL") { return Ok(ScalarExpr::Literal(Literal::Null)); }
                if word.eq_ignore_ascii_case("TRUE") { return Ok(ScalarExpr::Literal(Literal::Bool(true))); }
                if word.eq_ignore_ascii_case("FALSE") { return Ok(ScalarExpr::Literal(Literal::Bool(false))); }
                if self.eat(&Tok::LParen) {
                    return self.parse_call(word);
                }
                if is_reserved(&word) {
                    self.pos -= 1;
                    return Err(self.unexpected("expression"));
                }
                Ok(ScalarExpr::Column(ColumnRef::new(word)))
            }
            _ => {
                self.pos -= 1;
                Err(self.unexpected("expression"))
            }
        }
    }

    fn parse_call(&mut self, name: String) -> Result<ScalarExpr> {
        let name = name.to_ascii_uppercase();
        if self.peek_kw("DISTINCT") { return Err(SelectError::parse(format!("{}(DISTINCT ...) is not supported", name))); }
        if self.peek_kw("SELECT") { return Err(SelectError::parse("subqueries are not supported")); }
        if self.peek().map(|t| t.tok == Tok::Op("*")).unwrap_or(false) {
            self.pos += 1;
            if !self.eat(&Tok::RParen) { return Err(self.unexpected("')' after '*'")); }
            if name != "COUNT" { return Err(SelectError::parse(format!("'*' argument is only valid for COUNT, not {}", name))); }
            return Ok(ScalarExpr::CountStar);
        }
        let mut args = Vec::new();
        if !self.eat(&Tok::RParen) {
            loop {
                args.push(self.parse_expr()?);
                if self.eat(&Tok::Comma) { continue; }
                if self.eat(&Tok::RParen) { break; }
                return Err(self.unexpected("',' or ')' in argument list"));
            }
        }
        Ok(ScalarExpr::Call { name, args })
    }

    /// Expression plus its source text.
    fn parse_item_expr(&mut self) -> Result<(ScalarExpr, String)> {
        let from = self.pos;
        let expr = self.parse_expr()?;
        Ok((expr, self.text(from, self.pos)))
    }

    fn parse_alias(&mut self) -> Result<Option<String>> {
        if self.eat_kw("AS") {
            let alias = match self.peek().map(|t| &t.tok) {
                Some(Tok::Ident(a)) | Some(Tok::Str(a)) => a.clone(),
                _ => return Err(self.unexpected("alias after AS")),
            };
            self.pos += 1;
            return Ok(Some(alias));
        }
        if let Some(Token { tok: Tok::Ident(a), .. }) = self.peek() {
            if !is_reserved(a) {
                let a = a.clone();
                self.pos += 1;
                return Ok(Some(a));
            }
        }
        Ok(None)
    }

    // ---- SELECT -------------------------------------------------------------

    fn parse_table_ref(&mut self) -> Result<TableRef> {
        let source = match self.peek().map(|t| &t.tok) {
            Some(Tok::Ident(s)) if !is_reserved(s) => s.clone(),
            Some(Tok::LParen) => return Err(SelectError::parse("subqueries are not supported")),
            _ => return Err(self.unexpected("table name")),
        };
        self.pos += 1;
        Ok(match self.parse_alias()? {
            Some(alias) => TableRef::aliased(source, alias),
            None => TableRef::new(source),
        })
    }

    fn parse_join_mode(&mut self) -> Result<Option<JoinMode>> {
        let mode = if self.eat_kw("LEFT") { Some(JoinMode::Left) }
            else if self.eat_kw("RIGHT") { Some(JoinMode::Right) }
            else if self.eat_kw("INNER") { Some(JoinMode::Inner) }
            else if self.peek_kw("JOIN") { Some(JoinMode::Inner) }
            else if self.peek_kw("FULL") || self.peek_kw("CROSS") { return Err(SelectError::parse("only LEFT, RIGHT and INNER joins are supported")); }
            else { None };
        if mode.is_some() {
            self.eat_kw("OUTER");
            self.expect_kw("JOIN")?;
        }
        Ok(mode)
    }

    fn join_keys(cond: ScalarExpr, out: &mut Vec<JoinKey>) -> Result<()> {
        match cond {
            ScalarExpr::Binary { left, op: BinaryOp::And, right } => {
                Self::join_keys(*left, out)?;
                Self::join_keys(*right, out)
            }
            ScalarExpr::Binary { left, op: BinaryOp::Eq, right } => match (*left, *right) {
                (ScalarExpr::Column(a), ScalarExpr::Column(b)) => {
                    out.push(JoinKey { first: a, second: b });
                    Ok(())
                }
                (l, r) => Err(SelectError::parse(format!("join condition must compare two columns, got {} = {}", l, r))),
            },
            other => Err(SelectError::parse(format!("join condition must be column equalities joined by AND, got {}", other))),
        }
    }

    fn parse_count(&mut self) -> Result<usize> {
        let n = match self.peek().map(|t| &t.tok) {
            Some(Tok::Number(n)) if !n.contains('.') => n.clone(),
            _ => return Err(self.unexpected("non-negative integer")),
        };
        self.pos += 1;
        n.parse::<usize>().map_err(|_| SelectError::parse(format!("invalid LIMIT value {}", n)))
    }

    pub(crate) fn parse_select(&mut self) -> Result<Vec<Operator>> {
        self.expect_kw("SELECT")?;
        if self.peek_kw("DISTINCT") { return Err(SelectError::parse("SELECT DISTINCT is not supported")); }

        // select list
        let mut items: Vec<ColumnItem> = Vec::new();
        let mut wildcard = false;
        loop {
            if self.peek().map(|t| t.tok == Tok::Op("*")).unwrap_or(false) {
                self.pos += 1;
                wildcard = true;
            } else {
                let (expr, text) = self.parse_item_expr()?;
                let alias = self.parse_alias()?;
                items.push(ColumnItem::new(expr, text, alias));
            }
            if !self.eat(&Tok::Comma) { break; }
        }
        if wildcard && !items.is_empty() {
            return Err(SelectError::parse("'*' cannot be combined with other select items"));
        }

        self.expect_kw("FROM")?;
        let base = self.parse_table_ref()?;
        let mut ops = vec![Operator::Load(base)];

        while let Some(mode) = self.parse_join_mode()? {
            let table = self.parse_table_ref()?;
            self.expect_kw("ON")?;
            let cond = self.parse_expr()?;
            let mut on = Vec::new();
            Self::join_keys(cond, &mut on)?;
            ops.push(Operator::Join { table, mode, on });
        }

        if self.eat_kw("WHERE") {
            let from = self.pos;
            // validate now, carry the text verbatim
            self.parse_expr()?;
            ops.push(Operator::Filter(self.text(from, self.pos)));
        }

        let mut group_keys: Option<Vec<ColumnItem>> = None;
        if self.eat_kw("GROUP") {
            self.expect_kw("BY")?;
            let mut keys = Vec::new();
            loop {
                let (expr, text) = self.parse_item_expr()?;
                keys.push(ColumnItem::new(expr, text, None));
                if !self.eat(&Tok::Comma) { break; }
            }
            group_keys = Some(keys);
        }
        if self.peek_kw("HAVING") { return Err(SelectError::parse("HAVING is not supported")); }

        let has_aggregate = items.iter().any(|i| i.expr.contains_aggregate());
        match group_keys {
            Some(keys) => {
                if wildcard { return Err(SelectError::parse("'*' cannot be used with GROUP BY")); }
                ops.push(Operator::Group { keys, projection: items.clone() });
            }
            None if has_aggregate => ops.push(Operator::Group { keys: Vec::new(), projection: items.clone() }),
            None => {}
        }
        if !wildcard { ops.push(Operator::Project(items)); }

        if self.eat_kw("ORDER") {
            self.expect_kw("BY")?;
            let mut order = Vec::new();
            loop {
                let (expr, text) = self.parse_item_expr()?;
                let ascending = if self.eat_kw("DESC") { false } else { self.eat_kw("ASC"); true };
                order.push(OrderItem { item: ColumnItem::new(expr, text, None), ascending });
                if !self.eat(&Tok::Comma) { break; }
            }
            ops.push(Operator::Order(order));
        }

        if self.eat_kw("LIMIT") {
            let first = self.parse_count()?;
            let (offset, count) = if self.eat(&Tok::Comma) {
                (first, self.parse_count()?)
            } else if self.eat_kw("OFFSET") {
                (self.parse_count()?, first)
            } else {
                (0, first)
            };
            ops.push(Operator::Limit { offset, count });
        }

        while self.eat(&Tok::Semicolon) {}
        if !self.at_end() {
            if self.peek_kw("UNION") { return Err(SelectError::parse("UNION is not supported")); }
            return Err(self.unexpected("end of query"));
        }
        Ok(ops)
    }
}
