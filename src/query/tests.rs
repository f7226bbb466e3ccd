use super::*;

fn items(op: &Operator) -> Vec<(String, String)> {
    match op {
        Operator::Project(cols) => cols.iter().map(|c| (c.text.clone(), c.alias.clone())).collect(),
        other => panic!("expected PROJECT, got {}", other),
    }
}

#[test]
fn simple_select_emits_load_and_project() {
    let ops = parse_select("select a, b+2 as b2 from T").unwrap();
    assert_eq!(ops.len(), 2);
    assert_eq!(ops[0], Operator::Load(TableRef::new("T")));
    assert_eq!(items(&ops[1]), vec![("a".into(), "a".into()), ("b+2".into(), "b2".into())]);
}

#[test]
fn full_clause_order() {
    let q = "select a, b, t2.b, b+2, ifnull(b, 10), if(b > 3,1,-1) from df as t1 \
             left join df2 as t2 on t1.c = t2.c where b = 4 order by a+b desc, a limit 3";
    let ops = parse_select(q).unwrap();
    let kinds: Vec<&str> = ops.iter().map(|o| o.kind()).collect();
    assert_eq!(kinds, vec!["LOAD", "JOIN", "FILTER", "PROJECT", "ORDER", "LIMIT"]);
    assert_eq!(ops[0], Operator::Load(TableRef::aliased("df", "t1")));
    match &ops[1] {
        Operator::Join { table, mode, on } => {
            assert_eq!(table, &TableRef::aliased("df2", "t2"));
            assert_eq!(*mode, JoinMode::Left);
            assert_eq!(on, &vec![JoinKey::new("t1.c", "t2.c")]);
        }
        other => panic!("unexpected {}", other),
    }
    assert_eq!(ops[2], Operator::Filter("b = 4".into()));
    let proj = items(&ops[3]);
    assert_eq!(proj[2], ("t2.b".into(), "t2.b".into()));
    assert_eq!(proj[4], ("ifnull(b, 10)".into(), "ifnull(b, 10)".into()));
    match &ops[4] {
        Operator::Order(o) => {
            assert_eq!(o[0].item.text, "a+b");
            assert!(!o[0].ascending);
            assert!(o[1].ascending);
        }
        other => panic!("unexpected {}", other),
    }
    assert_eq!(ops[5], Operator::Limit { offset: 0, count: 3 });
}

#[test]
fn group_by_emits_group_before_project() {
    let ops = parse_select("select ifnull(b,10), count(*) as n from T group by ifnull(b, 10)").unwrap();
    assert_eq!(ops.len(), 3);
    match &ops[1] {
        Operator::Group { keys, projection } => {
            assert_eq!(keys.len(), 1);
            assert_eq!(keys[0].expr, projection[0].expr);
            assert_eq!(projection[1].expr, ScalarExpr::CountStar);
            assert_eq!(projection[1].alias, "n");
        }
        other => panic!("unexpected {}", other),
    }
    assert_eq!(ops[2].kind(), "PROJECT");
}

#[test]
fn aggregate_without_group_by_groups_whole_table() {
    let ops = parse_select("select sum(a) as total from T").unwrap();
    assert!(matches!(&ops[1], Operator::Group { keys, .. } if keys.is_empty()));
}

#[test]
fn limit_forms() {
    let a = parse_select("select a from T limit 2, 5").unwrap();
    assert_eq!(a.last(), Some(&Operator::Limit { offset: 2, count: 5 }));
    let b = parse_select("select a from T limit 5 offset 2;").unwrap();
    assert_eq!(b.last(), Some(&Operator::Limit { offset: 2, count: 5 }));
}

#[test]
fn external_tables_and_bare_aliases() {
    let q = "select a.col1, u.col2 from @mysql-dev.hogwarts.institution_admin as a \
             left join @mysql-dev.hogwarts.institution_user u on a.phone = u.account_no and a.age = u.age limit 10";
    let ops = parse_select(q).unwrap();
    assert_eq!(ops[0], Operator::Load(TableRef::aliased("@mysql-dev.hogwarts.institution_admin", "a")));
    match &ops[1] {
        Operator::Join { table, on, .. } => {
            assert_eq!(table.alias, "u");
            assert_eq!(on.len(), 2);
            assert_eq!(on[1], JoinKey::new("a.age", "u.age"));
        }
        other => panic!("unexpected {}", other),
    }
}

#[test]
fn wildcard_skips_projection() {
    let ops = parse_select("SELECT * FROM T WHERE a > 1").unwrap();
    let kinds: Vec<&str> = ops.iter().map(|o| o.kind()).collect();
    assert_eq!(kinds, vec!["LOAD", "FILTER"]);
}

#[test]
fn comments_are_ignored() {
    let ops = parse_select("-- header\nselect a /* inline */ from T").unwrap();
    assert_eq!(ops.len(), 2);
}

#[test]
fn unsupported_surface_is_a_parse_error() {
    for q in [
        "select a from T where a in (select a from U)",
        "select distinct a from T",
        "select a from T full join U on T.a = U.a",
        "select a, count(*) from T group by a having count(*) > 1",
        "select a from T join U on T.a > U.a",
        "select a from",
    ] {
        let err = parse_select(q).unwrap_err();
        assert!(matches!(err, crate::error::SelectError::Parse(_)), "{} -> {}", q, err);
    }
}

#[test]
fn expression_precedence() {
    let e = parse_expr("a + b * 2 > 3 and not c is null or d in (1, 2,)").unwrap();
    assert_eq!(e.to_string(), "((((a + (b * 2)) > 3) AND NOT c IS NULL) OR d IN (1, 2))");
}

#[test]
fn function_names_are_uppercased_and_negatives_fold() {
    let e = parse_expr("if(b > 3, 1, -1)").unwrap();
    match e {
        ScalarExpr::Call { name, args } => {
            assert_eq!(name, "IF");
            assert_eq!(args[2], ScalarExpr::Literal(Literal::Int(-1)));
        }
        other => panic!("unexpected {}", other),
    }
    assert!(parse_expr("count(*)").unwrap().contains_aggregate());
    assert!(parse_expr("sum(if(b > t2.b, 1, -1))").unwrap().contains_aggregate());
    assert!(!parse_expr("ifnull(b, 10)").unwrap().contains_aggregate());
}

#[test]
fn trailing_garbage_is_rejected() {
    assert!(parse_expr("a b").is_err());
}

#[test]
fn predicate_normalization() {
    assert_eq!(normalize_predicate("b = 4"), "b == 4");
    assert_eq!(normalize_predicate("b == 4"), "b == 4");
    assert_eq!(normalize_predicate("b === 4"), "b == 4");
    assert_eq!(normalize_predicate("a <= 1 and b >= 2 and c != 3"), "a <= 1 and b >= 2 and c != 3");
    assert_eq!(normalize_predicate("s = 'x=y'"), "s == 'x=y'");
}

#[test]
fn operators_serialize_as_json() {
    let ops = parse_select("select a from T as t1 limit 1").unwrap();
    let text = serde_json::to_string(&ops).unwrap();
    let back: Vec<Operator> = serde_json::from_str(&text).unwrap();
    assert_eq!(back, ops);
}
