use polars::prelude::*;

use super::fixtures::{engines, context, ints, names, run_everywhere, strs, table_t};
use crate::error::{ErrorKind, SelectError};
use crate::exec::execute;
use crate::query::{parse_select, ColumnItem, JoinKey, JoinMode, Operator, TableRef};

#[test]
fn project_computes_and_aliases() {
    let ops = vec![
        Operator::Load(TableRef::new("T")),
        Operator::Project(vec![ColumnItem::parse("a").unwrap(), ColumnItem::parse_as("b+2", "b2").unwrap()]),
    ];
    let df = run_everywhere(vec![("T", table_t())], &ops);
    assert_eq!(names(&df), vec!["a", "b2"]);
    assert_eq!(ints(&df, "a"), vec![Some(1), Some(2), Some(3)]);
    assert_eq!(ints(&df, "b2"), vec![Some(5), Some(6), Some(7)]);
}

#[test]
fn filter_accepts_single_equals() {
    let ops = vec![Operator::Load(TableRef::new("T")), Operator::Filter("b = 4".into())];
    let df = run_everywhere(vec![("T", table_t())], &ops);
    assert_eq!(df.height(), 1);
    assert_eq!(ints(&df, "a"), vec![Some(2)]);
    assert_eq!(ints(&df, "b"), vec![Some(4)]);
}

#[test]
fn group_by_computed_key_counts_each_group() {
    let key = ColumnItem::parse("ifnull(b,10)").unwrap();
    let projection = vec![key.clone(), ColumnItem::parse_as("count(*)", "n").unwrap()];
    let ops = vec![
        Operator::Load(TableRef::new("T")),
        Operator::Group { keys: vec![key], projection: projection.clone() },
        Operator::Project(projection),
    ];
    let df = run_everywhere(vec![("T", table_t())], &ops);
    assert_eq!(df.height(), 3);
    assert_eq!(ints(&df, "ifnull(b,10)"), vec![Some(3), Some(4), Some(5)]);
    assert_eq!(ints(&df, "n"), vec![Some(1), Some(1), Some(1)]);
}

#[test]
fn unknown_table_is_a_context_error_naming_it() {
    for engine in engines() {
        let mut ctx = context(engine, vec![("T", table_t())]);
        let err = execute(&[Operator::Load(TableRef::new("missing"))], &mut ctx).unwrap_err();
        assert!(matches!(err.root(), SelectError::TableNotFound(n) if n == "missing"));
        assert_eq!(err.kind(), ErrorKind::Context);
        assert!(err.to_string().contains("missing"));
    }
}

#[test]
fn left_join_leaves_unmatched_right_columns_null() {
    let t = df!("a" => [1i64, 2, 3], "c" => [10i64, 20, 30]).unwrap();
    let u = df!("c" => [10i64, 30], "d" => ["x", "z"]).unwrap();
    let ops = vec![
        Operator::Load(TableRef::new("T")),
        Operator::Join { table: TableRef::new("U"), mode: JoinMode::Left, on: vec![JoinKey::new("T.c", "U.c")] },
    ];
    let df = run_everywhere(vec![("T", t), ("U", u)], &ops);
    assert_eq!(names(&df), vec!["a", "c", "U.c", "d"]);
    assert_eq!(ints(&df, "a"), vec![Some(1), Some(2), Some(3)]);
    assert_eq!(ints(&df, "U.c"), vec![Some(10), None, Some(30)]);
    assert_eq!(strs(&df, "d"), vec![Some("x".into()), None, Some("z".into())]);
}

#[test]
fn repeated_runs_are_deterministic() {
    let ops = crate::query::parse_select(
        "select b % 2 as parity, sum(a) as s, count(*) as n from T group by b % 2 order by parity",
    )
    .unwrap();
    let first = run_everywhere(vec![("T", table_t())], &ops);
    for _ in 0..3 {
        assert!(first.equals_missing(&run_everywhere(vec![("T", table_t())], &ops)));
    }
    assert_eq!(ints(&first, "parity"), vec![Some(0), Some(1)]);
    assert_eq!(ints(&first, "s"), vec![Some(2), Some(4)]);
}

#[test]
fn computed_columns_keep_the_same_types_on_every_engine() {
    let mut t = df!(
        "g" => ["x", "y", "x"],
        "a" => [1i32, 2, 3],
        "d" => [19000i32, 19001, 19002]
    )
    .unwrap();
    let d = t.column("d").unwrap().cast(&DataType::Date).unwrap();
    t.with_column(d).unwrap();

    let ops = parse_select("select ifnull(d, d) as dd, if(a > 1, 1, -1) as sign, a + 1 as a1 from T").unwrap();
    let df = run_everywhere(vec![("T", t.clone())], &ops);
    assert_eq!(df.column("dd").unwrap().dtype(), &DataType::Date);
    assert_eq!(df.column("sign").unwrap().dtype(), &DataType::Int64);
    assert_eq!(df.column("a1").unwrap().dtype(), &DataType::Int64);

    let ops = parse_select("select g, sum(if(a > 1, 1, -1)) as stat, min(d) as first_day from T group by g").unwrap();
    for engine in engines() {
        let name = engine.name();
        let mut ctx = context(engine, vec![("T", t.clone())]);
        let df = crate::exec::execute_collect(&ops, &mut ctx).unwrap();
        assert_eq!(df.column("stat").unwrap().dtype(), &DataType::Int64, "[{}]", name);
        assert_eq!(df.column("first_day").unwrap().dtype(), &DataType::Date, "[{}]", name);
        assert_eq!(ints(&df, "stat"), vec![Some(0), Some(1)], "[{}]", name);
    }
}
