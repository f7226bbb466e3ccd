use polars::prelude::*;

use super::fixtures::{context, engines, ints, names, run_everywhere, strs};
use crate::error::{ErrorKind, SelectError};
use crate::exec::execute;
use crate::query::{parse_select, ColumnItem, Operator, TableRef};

fn sales() -> DataFrame {
    df!(
        "region" => ["n", "s", "n", "e", "s", "n"],
        "qty" => [Some(1i64), Some(2), None, Some(4), Some(5), Some(6)],
        "price" => [1.5f64, 2.0, 3.0, 4.0, 0.5, 1.0]
    )
    .unwrap()
}

#[test]
fn groups_come_out_in_first_appearance_order() {
    let ops = parse_select(
        "select region, sum(qty) as total, count(qty) as seen, count(*) as n, max(price) as top from S group by region",
    )
    .unwrap();
    let df = run_everywhere(vec![("S", sales())], &ops);
    assert_eq!(names(&df), vec!["region", "total", "seen", "n", "top"]);
    assert_eq!(strs(&df, "region"), vec![Some("n".into()), Some("s".into()), Some("e".into())]);
    assert_eq!(ints(&df, "total"), vec![Some(7), Some(7), Some(4)]);
    assert_eq!(ints(&df, "seen"), vec![Some(2), Some(2), Some(1)]);
    assert_eq!(ints(&df, "n"), vec![Some(3), Some(2), Some(1)]);
    let top: Vec<Option<f64>> = df.column("top").unwrap().f64().unwrap().into_iter().collect();
    assert_eq!(top, vec![Some(3.0), Some(2.0), Some(4.0)]);
}

#[test]
fn aggregate_expressions_combine_functions() {
    let ops = parse_select(
        "select region, avg(price * 2) as p2, sum(if(qty > 3, 1, 0)) as big, first(qty) as f, last(qty) as l from S group by region",
    )
    .unwrap();
    let df = run_everywhere(vec![("S", sales())], &ops);
    let p2: Vec<Option<f64>> = df.column("p2").unwrap().f64().unwrap().into_iter().collect();
    assert_eq!(p2[0], Some((1.5 + 3.0 + 1.0) * 2.0 / 3.0));
    assert_eq!(ints(&df, "big"), vec![Some(1), Some(1), Some(1)]);
    assert_eq!(ints(&df, "f"), vec![Some(1), Some(2), Some(4)]);
    assert_eq!(ints(&df, "l"), vec![Some(6), Some(5), Some(4)]);
}

#[test]
fn whole_table_aggregation_yields_one_row() {
    let ops = parse_select("select sum(qty) as total, count(*) as n, min(price) as lo from S").unwrap();
    let df = run_everywhere(vec![("S", sales())], &ops);
    assert_eq!(df.height(), 1);
    assert_eq!(ints(&df, "total"), vec![Some(18)]);
    assert_eq!(ints(&df, "n"), vec![Some(6)]);
}

#[test]
fn projection_with_extra_non_aggregate_fails() {
    let ops = vec![
        Operator::Load(TableRef::new("S")),
        Operator::Group {
            keys: vec![ColumnItem::parse("region").unwrap()],
            projection: vec![ColumnItem::parse("region").unwrap(), ColumnItem::parse("price").unwrap()],
        },
    ];
    for engine in engines() {
        let mut ctx = context(engine, vec![("S", sales())]);
        let err = execute(&ops, &mut ctx).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Execution);
        match err.root() {
            SelectError::GroupBy { missing, extra } => {
                assert!(missing.is_empty());
                assert_eq!(extra, &vec!["price".to_string()]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}

#[test]
fn projection_omitting_a_key_fails() {
    let err = parse_select("select count(*) from S group by region")
        .and_then(|ops| execute(&ops, &mut context(engines().remove(0), vec![("S", sales())])))
        .unwrap_err();
    assert!(matches!(err.root(), SelectError::GroupBy { missing, .. } if missing == &vec!["region".to_string()]));
}

#[test]
fn grouped_value_must_be_projected_before_other_operators() {
    let keys = vec![ColumnItem::parse("region").unwrap()];
    let ops = vec![
        Operator::Load(TableRef::new("S")),
        Operator::Group { keys: keys.clone(), projection: keys },
        Operator::Limit { offset: 0, count: 1 },
    ];
    let mut ctx = context(engines().remove(0), vec![("S", sales())]);
    let err = execute(&ops, &mut ctx).unwrap_err();
    assert!(matches!(err, SelectError::Stage { index: 2, .. }));
}

#[test]
fn aggregate_outside_group_is_a_translation_error() {
    let ops = vec![
        Operator::Load(TableRef::new("S")),
        Operator::Project(vec![ColumnItem::parse("sum(qty)").unwrap()]),
    ];
    for engine in engines() {
        let mut ctx = context(engine, vec![("S", sales())]);
        let err = execute(&ops, &mut ctx).and_then(|v| v.table.into_frame()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Translation);
    }
}

#[test]
fn aggregates_over_constants_see_every_row() {
    let ops = parse_select("select count(1) as n, sum(1) as s from S").unwrap();
    let df = run_everywhere(vec![("S", sales())], &ops);
    assert_eq!(ints(&df, "n"), vec![Some(6)]);
    assert_eq!(ints(&df, "s"), vec![Some(6)]);

    let ops = parse_select("select region, count(1) as n, sum(2) as s from S group by region").unwrap();
    let df = run_everywhere(vec![("S", sales())], &ops);
    assert_eq!(ints(&df, "n"), vec![Some(3), Some(2), Some(1)]);
    assert_eq!(ints(&df, "s"), vec![Some(6), Some(4), Some(2)]);
}
