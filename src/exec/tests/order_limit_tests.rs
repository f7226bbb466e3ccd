use polars::prelude::*;

use super::fixtures::{ints, names, run_everywhere, strs, table_t};
use crate::query::{parse_select, ColumnItem, Operator, OrderItem, TableRef};

fn ties() -> DataFrame {
    df!(
        "k" => [Some(2i64), Some(1), None, Some(2), Some(1), Some(2)],
        "seq" => [0i64, 1, 2, 3, 4, 5],
        "tag" => ["a", "b", "c", "d", "e", "f"]
    )
    .unwrap()
}

#[test]
fn sort_is_stable_for_equal_keys() {
    let ops = parse_select("select * from X order by k").unwrap();
    let df = run_everywhere(vec![("X", ties())], &ops);
    assert_eq!(ints(&df, "seq"), vec![Some(1), Some(4), Some(0), Some(3), Some(5), Some(2)]);
}

#[test]
fn descending_keeps_nulls_last_and_mixes_directions() {
    let ops = parse_select("select k, tag from X order by k desc, tag desc").unwrap();
    let df = run_everywhere(vec![("X", ties())], &ops);
    assert_eq!(ints(&df, "k"), vec![Some(2), Some(2), Some(2), Some(1), Some(1), None]);
    assert_eq!(
        strs(&df, "tag"),
        vec![Some("f".into()), Some("d".into()), Some("a".into()), Some("e".into()), Some("b".into()), Some("c".into())]
    );
}

#[test]
fn computed_order_keys_are_temporary() {
    let ops = vec![
        Operator::Load(TableRef::new("T")),
        Operator::Order(vec![OrderItem { item: ColumnItem::parse("0 - a * b").unwrap(), ascending: true }]),
    ];
    let df = run_everywhere(vec![("T", table_t())], &ops);
    assert_eq!(names(&df), vec!["a", "b"]);
    assert_eq!(ints(&df, "a"), vec![Some(3), Some(2), Some(1)]);
}

#[test]
fn limit_windows_and_clips() {
    let df = run_everywhere(vec![("X", ties())], &parse_select("select seq from X limit 2, 3").unwrap());
    assert_eq!(ints(&df, "seq"), vec![Some(2), Some(3), Some(4)]);

    let df = run_everywhere(vec![("X", ties())], &parse_select("select seq from X limit 4, 100").unwrap());
    assert_eq!(ints(&df, "seq"), vec![Some(4), Some(5)]);

    let df = run_everywhere(vec![("X", ties())], &parse_select("select seq from X limit 50 offset 10").unwrap());
    assert_eq!(df.height(), 0);
}

#[test]
fn full_window_limit_is_a_no_op() {
    let base = vec![Operator::Load(TableRef::new("X")), Operator::Limit { offset: 1, count: 3 }];
    let mut twice = base.clone();
    twice.push(Operator::Limit { offset: 0, count: 3 });
    let a = run_everywhere(vec![("X", ties())], &base);
    let b = run_everywhere(vec![("X", ties())], &twice);
    assert!(a.equals_missing(&b));
}

#[test]
fn order_by_projected_aggregate_text() {
    let ops = parse_select("select tag, count(*) from X group by tag order by count(*) desc, tag limit 1").unwrap();
    let df = run_everywhere(vec![("X", ties())], &ops);
    assert_eq!(strs(&df, "tag"), vec![Some("a".into())]);
}
