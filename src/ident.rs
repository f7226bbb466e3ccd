//! Identifier helpers
//! ------------------
//! Column-name resolution against a table's column set, qualifier splitting and
//! whitespace squeezing used when comparing expression texts.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Result, SelectError};

/// Leading sigil of identifiers that only fallback loaders may resolve.
pub const EXTERNAL_SIGIL: char = '@';

static BLANKS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));

/// Remove every whitespace run from an expression text.
pub fn squeeze_blank(seg: &str) -> String {
    BLANKS.replace_all(seg, "").into_owned()
}

/// True when `name` carries the external-source sigil, e.g. `@mysql.db.table`.
pub fn is_external(name: &str) -> bool {
    name.starts_with(EXTERNAL_SIGIL)
}

/// Split `alias.column` at the last dot. Unqualified names return `None` as qualifier.
pub fn split_qualified(name: &str) -> (Option<&str>, &str) {
    match name.rsplit_once('.') {
        Some((q, c)) if !q.is_empty() => (Some(q), c),
        _ => (None, name),
    }
}

pub fn qualify(alias: &str, column: &str) -> String {
    format!("{}.{}", alias, column)
}

/// Resolve a (possibly table-qualified) column name against `columns`.
/// The literal name wins; otherwise the part before the last `.` is stripped
/// and the bare name is tried.
pub fn resolve_column<S: AsRef<str>>(name: &str, columns: &[S]) -> Result<String> {
    let has = |n: &str| columns.iter().any(|c| c.as_ref() == n);
    if has(name) {
        return Ok(name.to_string());
    }
    let (_, bare) = split_qualified(name);
    if bare != name && has(bare) {
        return Ok(bare.to_string());
    }
    Err(SelectError::column_not_found(name, columns))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn squeeze_removes_all_whitespace() {
        assert_eq!(squeeze_blank(" ifnull( b,\t10 )\n"), "ifnull(b,10)");
    }

    #[test]
    fn qualified_and_bare_resolve_the_same() {
        let cols = vec!["a".to_string(), "col".to_string()];
        assert_eq!(resolve_column("t.col", &cols).unwrap(), "col");
        assert_eq!(resolve_column("col", &cols).unwrap(), "col");
        let again = resolve_column(&resolve_column("t.col", &cols).unwrap(), &cols).unwrap();
        assert_eq!(again, "col");
    }

    #[test]
    fn literal_match_beats_stripping() {
        let cols = ["c", "u.c"];
        assert_eq!(resolve_column("u.c", &cols).unwrap(), "u.c");
        assert_eq!(resolve_column("t.c", &cols).unwrap(), "c");
    }

    #[test]
    fn unknown_column_names_offender() {
        let err = resolve_column("t.zz", &["a"]).unwrap_err();
        assert!(matches!(err, SelectError::ColumnNotFound { ref name, .. } if name == "t.zz"));
    }

    #[test]
    fn split_and_sigil() {
        assert_eq!(split_qualified("db.t.c"), (Some("db.t"), "c"));
        assert_eq!(split_qualified("c"), (None, "c"));
        assert!(is_external("@mysql-dev.hogwarts.users"));
        assert!(!is_external("users"));
    }
}
