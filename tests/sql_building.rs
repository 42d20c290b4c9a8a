//! Builder-level tests: clause layout, quoting, and placeholder discipline.

use std::collections::BTreeSet;

use serde_json::json;

use htnql::dialect::AnsiDialect;
use htnql::sql_builder::{build_auto_sql, build_base_sql};
use htnql::state::JoinEdge;
use htnql::{FilterOp, FilterSpec, HtnqlError, MetricSpec, ReportSpec};

fn tables(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|n| n.to_string()).collect()
}

fn edge(lt: &str, lc: &str, rt: &str, rc: &str) -> JoinEdge {
    JoinEdge {
        left_table: lt.to_string(),
        left_column: lc.to_string(),
        right_table: rt.to_string(),
        right_column: rc.to_string(),
    }
}

#[test]
fn clause_order_is_fixed() {
    let mut spec = ReportSpec::new("r", vec![MetricSpec::new("SUM(orders.amount_cents)", "rev")]);
    spec.group_by = vec!["customers.region".to_string()];
    spec.filters = vec![FilterSpec::new("orders.status", FilterOp::Eq, json!("paid"))];
    spec.limit = Some(10);

    let built = build_auto_sql(
        &spec,
        &tables(&["customers", "orders"]),
        &[edge("orders", "customer_id", "customers", "id")],
        &AnsiDialect,
    )
    .unwrap();

    assert_eq!(
        built.sql,
        "SELECT \"customers\".\"region\", SUM(orders.amount_cents) AS rev \
         FROM \"customers\" \
         INNER JOIN \"orders\" ON \"orders\".\"customer_id\" = \"customers\".\"id\" \
         WHERE \"orders\".\"status\" = ? \
         GROUP BY \"customers\".\"region\" \
         LIMIT 10"
    );
    assert_eq!(built.params, vec![json!("paid")]);
}

#[test]
fn aliases_are_quoted_only_when_not_identifiers() {
    let spec = ReportSpec::new(
        "r",
        vec![
            MetricSpec::new("COUNT(*)", "n"),
            MetricSpec::new("SUM(orders.amount_cents)", "total revenue"),
        ],
    );
    let built = build_auto_sql(&spec, &tables(&["orders"]), &[], &AnsiDialect).unwrap();
    assert!(built.sql.contains("COUNT(*) AS n"));
    assert!(built
        .sql
        .contains("SUM(orders.amount_cents) AS \"total revenue\""));
}

#[test]
fn params_follow_filter_order() {
    let mut spec = ReportSpec::new("r", vec![MetricSpec::new("COUNT(*)", "n")]);
    spec.filters = vec![
        FilterSpec::new("orders.amount_cents", FilterOp::Gte, json!(100)),
        FilterSpec::new("orders.status", FilterOp::In, json!(["a", "b", "c"])),
        FilterSpec::new("orders.status", FilterOp::Neq, json!("void")),
    ];

    let built = build_auto_sql(&spec, &tables(&["orders"]), &[], &AnsiDialect).unwrap();
    assert!(built.sql.contains(
        "WHERE \"orders\".\"amount_cents\" >= ? \
         AND \"orders\".\"status\" IN (?, ?, ?) \
         AND \"orders\".\"status\" != ?"
    ));
    assert_eq!(
        built.params,
        vec![json!(100), json!("a"), json!("b"), json!("c"), json!("void")]
    );
}

#[test]
fn empty_in_lists_are_rejected() {
    let mut spec = ReportSpec::new("r", vec![MetricSpec::new("COUNT(*)", "n")]);
    spec.filters = vec![FilterSpec::new("orders.status", FilterOp::In, json!([]))];
    let err = build_auto_sql(&spec, &tables(&["orders"]), &[], &AnsiDialect).unwrap_err();
    assert!(matches!(err, HtnqlError::Spec(_)));
}

#[test]
fn duplicate_join_edges_are_elided() {
    let mut spec = ReportSpec::new("r", vec![MetricSpec::new("COUNT(*)", "n")]);
    spec.group_by = vec!["customers.region".to_string()];
    let forest = vec![
        edge("orders", "customer_id", "customers", "id"),
        edge("orders", "customer_id", "customers", "id"),
    ];
    let built =
        build_auto_sql(&spec, &tables(&["customers", "orders"]), &forest, &AnsiDialect).unwrap();
    assert_eq!(built.sql.matches("INNER JOIN").count(), 1);
}

#[test]
fn forest_must_cover_every_table() {
    let spec = ReportSpec::new("r", vec![MetricSpec::new("COUNT(*)", "n")]);
    let err = build_auto_sql(&spec, &tables(&["audit_log", "orders"]), &[], &AnsiDialect)
        .unwrap_err();
    match err {
        HtnqlError::Join { table, .. } => assert_eq!(table, "orders"),
        other => panic!("expected join error, got {other:?}"),
    }
}

#[test]
fn selecting_nothing_is_an_error() {
    let spec = ReportSpec::new("r", vec![]);
    let err = build_auto_sql(&spec, &tables(&["orders"]), &[], &AnsiDialect).unwrap_err();
    assert!(matches!(err, HtnqlError::Spec(_)));
}

#[test]
fn embedded_quotes_are_doubled() {
    let mut spec = ReportSpec::new("r", vec![MetricSpec::new("COUNT(*)", "n")]);
    spec.group_by = vec!["weird\"table.col".to_string()];
    let built = build_auto_sql(&spec, &tables(&["weird\"table"]), &[], &AnsiDialect).unwrap();
    assert!(built.sql.contains("\"weird\"\"table\".\"col\""));
}

#[test]
fn base_mode_applies_filters_over_the_subquery() {
    let mut spec = ReportSpec::new("r", vec![MetricSpec::new("SUM(amount_cents)", "total")]);
    spec.group_by = vec!["region".to_string()];
    spec.filters = vec![FilterSpec::new("region", FilterOp::Eq, json!("emea"))];
    spec.limit = Some(5);

    let built = build_base_sql(&spec, "SELECT * FROM wide_view", &AnsiDialect).unwrap();
    assert_eq!(
        built.sql,
        "SELECT \"region\", SUM(amount_cents) AS total \
         FROM (SELECT * FROM wide_view) __base__ \
         WHERE \"region\" = ? \
         GROUP BY \"region\" \
         LIMIT 5"
    );
    assert_eq!(built.params, vec![json!("emea")]);
}
