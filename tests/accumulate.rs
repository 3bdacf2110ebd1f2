use std::str::FromStr;

use rust_decimal::Decimal;
use tabula_tools::accumulate::{Accumulator, Total, TotalsOrder, accumulate, accumulate_table};
use tabula_tools::model::{Table, Value};

fn decimal(text: &str) -> Decimal {
    Decimal::from_str(text).expect("decimal literal")
}

fn exact(text: &str) -> Option<Total> {
    Some(Total::Exact(decimal(text)))
}

fn row(category: impl Into<Value>, amount: impl Into<Value>) -> (Value, Value) {
    (category.into(), amount.into())
}

fn household() -> Vec<(Value, Value)> {
    vec![
        row("food", 1200.0),
        row("food", 680.0),
        row("transport", 300.0),
        row("", 999.0),
    ]
}

#[test]
fn totals_follow_first_seen_categories_and_skip_blank_keys() {
    let totals = accumulate(household());

    let entries: Vec<(String, Decimal)> = totals
        .iter()
        .filter_map(|(category, total)| Some((category.to_string(), total.exact()?)))
        .collect();

    assert_eq!(
        entries,
        vec![
            ("food".to_string(), decimal("1880.00")),
            ("transport".to_string(), decimal("300.00")),
        ]
    );
    assert_eq!(totals.total(&Value::from("")), None);
}

#[test]
fn totals_do_not_depend_on_row_order() {
    let mut reversed = household();
    reversed.reverse();

    let forward = accumulate(household());
    let backward = accumulate(reversed);

    for category in forward.categories() {
        assert_eq!(forward.total(category), backward.total(category));
    }
    assert_eq!(backward.categories().next(), Some(&Value::from("transport")));
}

#[test]
fn decimal_totals_do_not_drift() {
    let mut accumulator = Accumulator::new();
    for _ in 0..10 {
        accumulator.add(Value::from("coffee"), &Value::from(0.1));
    }

    let totals = accumulator.finish();

    assert_eq!(totals.raw_total(&Value::from("coffee")), exact("1.0"));
}

#[test]
fn reported_totals_round_halves_away_from_zero() {
    let totals = accumulate(vec![
        row("tea", "0.125"),
        row("refund", "-0.125"),
    ]);

    assert_eq!(totals.total(&Value::from("tea")), exact("0.13"));
    assert_eq!(totals.total(&Value::from("refund")), exact("-0.13"));
}

#[test]
fn null_categories_are_skipped_and_null_amounts_count_as_zero() {
    let totals = accumulate(vec![
        row(Value::Null, 50.0),
        row("rent", Value::Null),
        row("rent", 900.0),
    ]);

    assert_eq!(totals.len(), 1);
    assert_eq!(totals.total(&Value::from("rent")), exact("900.00"));
}

#[test]
fn totals_can_be_ordered_by_size() {
    let totals = accumulate(vec![
        row("books", 20.0),
        row("food", 300.0),
        row("games", 20.0),
    ])
    .ordered(TotalsOrder::TotalDescending);

    let categories: Vec<String> = totals.categories().map(Value::to_string).collect();

    assert_eq!(categories, ["food", "books", "games"]);
}

#[test]
fn table_columns_become_the_report_headers() {
    let table = Table::from_rows(
        vec!["category".to_string(), "amount".to_string()],
        vec![
            vec!["food".into(), 1200.0.into()],
            vec!["food".into(), 680.5.into()],
            vec!["transport".into(), 300.0.into()],
        ],
    )
    .expect("table built");

    let report = accumulate_table(&table, "category", "amount")
        .expect("accumulated")
        .to_table();

    assert_eq!(report.columns(), ["category", "amount"]);
    assert_eq!(report.value(0, "amount"), Some(&Value::from(1880.5)));
    assert_eq!(report.value(1, "category"), Some(&Value::from("transport")));
}

#[test]
fn totals_beyond_the_decimal_range_continue_in_floating_point() {
    let table = Table::from_rows(
        vec!["category".to_string(), "amount".to_string()],
        vec![
            vec!["reserve".into(), 5e28.into()],
            vec!["reserve".into(), 5e28.into()],
            vec!["petty".into(), 12.5.into()],
        ],
    )
    .expect("table built");

    let totals = accumulate_table(&table, "category", "amount").expect("accumulated");

    let reserve = totals.total(&Value::from("reserve")).expect("reserve total");
    assert!(!reserve.is_exact());
    assert!((reserve.to_f64() / 1e29 - 1.0).abs() < 1e-12);
    assert_eq!(totals.total(&Value::from("petty")), exact("12.50"));

    let ordered = totals.ordered(TotalsOrder::TotalDescending).to_table();
    let first = ordered.value(0, "amount").and_then(Value::as_number);
    assert_eq!(ordered.value(0, "category"), Some(&Value::from("reserve")));
    assert!(first.is_some_and(|total| (total / 1e29 - 1.0).abs() < 1e-12));
}

#[test]
fn amounts_too_large_for_a_decimal_are_kept() {
    let totals = accumulate(vec![row("national debt", 1e30), row("national debt", "1e30")]);

    let total = totals
        .total(&Value::from("national debt"))
        .expect("category present");

    assert_eq!(total.exact(), None);
    assert!((total.to_f64() / 2e30 - 1.0).abs() < 1e-12);
}
