use polars::prelude::*;

use super::fixtures::{context, engines, run_everywhere, strs, table_t};
use crate::error::{ErrorKind, SelectError};
use crate::exec::execute;
use crate::query::{parse_select, ColumnItem, Operator, TableRef};

#[test]
fn pipeline_must_start_with_load() {
    let mut ctx = context(engines().remove(0), vec![("T", table_t())]);
    let err = execute(&[Operator::Limit { offset: 0, count: 1 }], &mut ctx).unwrap_err();
    assert!(matches!(err, SelectError::Stage { index: 0, .. }));
    assert!(err.to_string().contains("LOAD"));

    let ops = vec![Operator::Load(TableRef::new("T")), Operator::Load(TableRef::new("T"))];
    assert!(execute(&ops, &mut ctx).is_err());
    assert!(execute(&[], &mut ctx).is_err());
}

#[test]
fn failures_carry_stage_and_operator_text() {
    for engine in engines() {
        let mut ctx = context(engine, vec![("T", table_t())]);
        let ops = vec![
            Operator::Load(TableRef::new("T")),
            Operator::Filter("a > 1".into()),
            Operator::Project(vec![ColumnItem::parse("zz + 1").unwrap()]),
        ];
        let err = execute(&ops, &mut ctx).unwrap_err();
        match &err {
            SelectError::Stage { index, operator, .. } => {
                assert_eq!(*index, 2);
                assert!(operator.starts_with("PROJECT"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(err.kind(), ErrorKind::Translation);
        assert!(err.to_string().contains("invalid column zz"));
    }
}

#[test]
fn undefined_function_is_reported_by_name() {
    for engine in engines() {
        let mut ctx = context(engine, vec![("T", table_t())]);
        let ops = vec![Operator::Load(TableRef::new("T")), Operator::Project(vec![ColumnItem::parse("frob(a)").unwrap()])];
        let err = execute(&ops, &mut ctx).unwrap_err();
        assert!(matches!(err.root(), SelectError::UndefinedFunction(n) if n == "FROB"));
        assert!(err.to_string().contains("udf [FROB] not defined"));
    }
}

#[test]
fn malformed_filter_is_a_parse_error() {
    let mut ctx = context(engines().remove(0), vec![("T", table_t())]);
    let ops = vec![Operator::Load(TableRef::new("T")), Operator::Filter("a >".into())];
    let err = execute(&ops, &mut ctx).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parse);
}

#[test]
fn duplicate_output_names_are_rejected() {
    for engine in engines() {
        let mut ctx = context(engine, vec![("T", table_t())]);
        let ops = vec![
            Operator::Load(TableRef::new("T")),
            Operator::Project(vec![ColumnItem::parse("a").unwrap(), ColumnItem::parse_as("b", "a").unwrap()]),
        ];
        let err = execute(&ops, &mut ctx).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Execution);
    }
}

fn tagged() -> DataFrame {
    df!("s" => ["a", "b", "c"], "k" => [0i64, 2, -1]).unwrap()
}

#[test]
fn numeric_filters_keep_non_zero_rows() {
    let ops = parse_select("select s from T where k").unwrap();
    let df = run_everywhere(vec![("T", tagged())], &ops);
    assert_eq!(strs(&df, "s"), vec![Some("b".into()), Some("c".into())]);
}

#[test]
fn type_errors_name_the_operator_that_caused_them() {
    for engine in engines() {
        let name = engine.name();
        let mut ctx = context(engine, vec![("T", tagged())]);
        let ops = vec![
            Operator::Load(TableRef::new("T")),
            Operator::Filter("s + 1 > 2".into()),
            Operator::Project(vec![ColumnItem::parse("s").unwrap()]),
        ];
        let err = execute(&ops, &mut ctx).unwrap_err();
        assert!(matches!(err, SelectError::Stage { index: 1, .. }), "[{}] {}", name, err);

        let ops = vec![
            Operator::Load(TableRef::new("T")),
            Operator::Project(vec![ColumnItem::parse_as("s + k", "x").unwrap()]),
            Operator::Limit { offset: 0, count: 1 },
        ];
        let err = execute(&ops, &mut ctx).unwrap_err();
        match &err {
            SelectError::Stage { index, operator, .. } => {
                assert_eq!(*index, 1, "[{}] {}", name, err);
                assert!(operator.starts_with("PROJECT"));
            }
            other => panic!("[{}] unexpected {:?}", name, other),
        }
    }
}
