//! Tokenizer shared by the expression and SELECT parsers.

use crate::error::{Result, SelectError};

#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    /// Bare or backtick-quoted identifier; may be dotted (`t1.c`) or carry the `@` sigil.
    Ident(String),
    Number(String),
    Str(String),
    Op(&'static str),
    LParen,
    RParen,
    Comma,
    Semicolon,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub tok: Tok,
    pub start: usize,
    pub end: usize,
}

impl Token {
    /// Case-insensitive keyword test for identifier tokens.
    pub fn is_kw(&self, kw: &str) -> bool {
        matches!(&self.tok, Tok::Ident(s) if s.eq_ignore_ascii_case(kw))
    }
}

/// Strip `--` line comments and `/* */` block comments (nesting allowed) outside
/// string literals. Newlines inside comments are kept so offsets stay readable.
pub fn strip_sql_comments(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut i = 0usize;
    let mut in_squote = false;
    let mut in_dquote = false;
    let mut block_depth: i32 = 0;
    let mut line_comment = false;
    while i < chars.len() {
        let ch = chars[i];
        let next = chars.get(i + 1).copied();
        if line_comment {
            if ch == '\n' { out.push('\n'); line_comment = false; }
            i += 1;
            continue;
        }
        if block_depth > 0 {
            if ch == '\n' { out.push('\n'); }
            if ch == '/' && next == Some('*') { block_depth += 1; i += 2; continue; }
            if ch == '*' && next == Some('/') { block_depth -= 1; i += 2; if block_depth == 0 { out.push(' '); } continue; }
            i += 1;
            continue;
        }
        if !in_dquote && ch == '\'' { in_squote = !in_squote; }
        else if !in_squote && ch == '"' { in_dquote = !in_dquote; }
        else if !in_squote && !in_dquote {
            if ch == '-' && next == Some('-') { line_comment = true; i += 2; continue; }
            if ch == '/' && next == Some('*') { block_depth = 1; i += 2; continue; }
        }
        out.push(ch);
        i += 1;
    }
    out
}

fn is_ident_start(c: char) -> bool { c.is_ascii_alphabetic() || c == '_' || c == '@' }

fn is_ident_char(c: char, external: bool) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '$' || (external && c == '-')
}

pub fn tokenize(src: &str) -> Result<Vec<Token>> {
    let bytes: Vec<(usize, char)> = src.char_indices().collect();
    let n = bytes.len();
    let end_of = |k: usize| -> usize { if k < n { bytes[k].0 } else { src.len() } };
    let mut out = Vec::new();
    let mut i = 0usize;
    while i < n {
        let (pos, ch) = bytes[i];
        if ch.is_whitespace() { i += 1; continue; }
        let start = i;
        let tok = match ch {
            '(' => { i += 1; Tok::LParen }
            ')' => { i += 1; Tok::RParen }
            ',' => { i += 1; Tok::Comma }
            ';' => { i += 1; Tok::Semicolon }
            '+' => { i += 1; Tok::Op("+") }
            '-' => { i += 1; Tok::Op("-") }
            '*' => { i += 1; Tok::Op("*") }
            '/' => { i += 1; Tok::Op("/") }
            '%' => { i += 1; Tok::Op("%") }
            '=' => {
                if i + 1 < n && bytes[i + 1].1 == '=' { i += 2; Tok::Op("==") } else { i += 1; Tok::Op("=") }
            }
            '!' => {
                if i + 1 < n && bytes[i + 1].1 == '=' { i += 2; Tok::Op("!=") }
                else { return Err(SelectError::parse(format!("unexpected '!' at offset {}", pos))); }
            }
            '<' => {
                match bytes.get(i + 1).map(|b| b.1) {
                    Some('=') => { i += 2; Tok::Op("<=") }
                    Some('>') => { i += 2; Tok::Op("!=") }
                    _ => { i += 1; Tok::Op("<") }
                }
            }
            '>' => {
                if i + 1 < n && bytes[i + 1].1 == '=' { i += 2; Tok::Op(">=") } else { i += 1; Tok::Op(">") }
            }
            '\'' | '"' => {
                let quote = ch;
                let mut s = String::new();
                i += 1;
                let mut closed = false;
                while i < n {
                    let c = bytes[i].1;
                    if c == quote {
                        // doubled quote escapes itself
                        if i + 1 < n && bytes[i + 1].1 == quote { s.push(quote); i += 2; continue; }
                        i += 1;
                        closed = true;
                        break;
                    }
                    s.push(c);
                    i += 1;
                }
                if !closed { return Err(SelectError::parse(format!("unterminated string literal at offset {}", pos))); }
                Tok::Str(s)
            }
            '`' => {
                let mut s = String::new();
                i += 1;
                while i < n && bytes[i].1 != '`' { s.push(bytes[i].1); i += 1; }
                if i >= n { return Err(SelectError::parse(format!("unterminated quoted identifier at offset {}", pos))); }
                i += 1;
                Tok::Ident(s)
            }
            c if c.is_ascii_digit() => {
                let mut s = String::new();
                let mut seen_dot = false;
                while i < n {
                    let c = bytes[i].1;
                    if c.is_ascii_digit() { s.push(c); i += 1; }
                    else if c == '.' && !seen_dot && i + 1 < n && bytes[i + 1].1.is_ascii_digit() { seen_dot = true; s.push(c); i += 1; }
                    else { break; }
                }
                Tok::Number(s)
            }
            c if is_ident_start(c) => {
                let external = c == '@';
                let mut s = String::new();
                s.push(c);
                i += 1;
                while i < n && is_ident_char(bytes[i].1, external) { s.push(bytes[i].1); i += 1; }
                Tok::Ident(s)
            }
            other => return Err(SelectError::parse(format!("unexpected character '{}' at offset {}", other, pos))),
        };
        out.push(Token { tok, start: bytes[start].0, end: end_of(i) });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(s: &str) -> Vec<Tok> { tokenize(s).unwrap().into_iter().map(|t| t.tok).collect() }

    #[test]
    fn operators_and_literals() {
        assert_eq!(
            toks("a<=3.5 and b<>'x''y'"),
            vec![
                Tok::Ident("a".into()), Tok::Op("<="), Tok::Number("3.5".into()),
                Tok::Ident("and".into()), Tok::Ident("b".into()), Tok::Op("!="), Tok::Str("x'y".into()),
            ]
        );
    }

    #[test]
    fn external_identifier_keeps_dashes() {
        assert_eq!(toks("@mysql-dev.hogwarts.users u"), vec![Tok::Ident("@mysql-dev.hogwarts.users".into()), Tok::Ident("u".into())]);
        // dashes are arithmetic outside sigil identifiers
        assert_eq!(toks("a-b"), vec![Tok::Ident("a".into()), Tok::Op("-"), Tok::Ident("b".into())]);
    }

    #[test]
    fn spans_cover_source_text() {
        let src = "ifnull(b, 10) as x";
        let t = tokenize(src).unwrap();
        assert_eq!(&src[t[0].start..t[5].end], "ifnull(b, 10)");
    }

    #[test]
    fn comments_are_stripped_outside_strings() {
        let s = strip_sql_comments("select a -- tail\n, '--keep' /* x /* y */ z */ from t");
        assert!(s.contains("'--keep'"));
        assert!(!s.contains("tail"));
        assert!(!s.contains('z'));
        assert!(s.contains("from t"));
    }

    #[test]
    fn unterminated_string_fails() {
        assert!(matches!(tokenize("'abc"), Err(SelectError::Parse(_))));
    }
}
