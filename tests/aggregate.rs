use tabula_tools::ToolError;
use tabula_tools::aggregate::{AggregateOp, Metric, PivotFill, group_reduce, group_reduce_many, pivot};
use tabula_tools::model::{Table, Value};
use tabula_tools::sort::SortKey;

fn sales() -> Table {
    Table::from_rows(
        ["region", "month", "sales"]
            .iter()
            .map(|column| column.to_string())
            .collect(),
        vec![
            vec!["north".into(), 1.0.into(), 100.0.into()],
            vec!["south".into(), 1.0.into(), 50.0.into()],
            vec!["north".into(), 2.0.into(), 70.0.into()],
            vec!["south".into(), 2.0.into(), Value::Null],
            vec!["north".into(), 1.0.into(), 30.0.into()],
            vec!["east".into(), 3.0.into(), 10.0.into()],
        ],
    )
    .expect("table built")
}

fn key(values: &[Value]) -> Vec<Value> {
    values.to_vec()
}

#[test]
fn group_sums_add_up_to_the_column_total() {
    let table = sales();
    let result = group_reduce(&table, &["region"], "sales", AggregateOp::Sum).expect("grouped");

    let grouped: f64 = result
        .entries()
        .iter()
        .filter_map(|entry| entry.values[0].as_number())
        .sum();
    let total: f64 = table
        .column_values("sales")
        .expect("sales column")
        .iter()
        .map(|value| value.number_or_zero())
        .sum();

    assert_eq!(grouped, total);
    assert_eq!(result.value(&key(&["north".into()]), "sales"), Some(&Value::from(200.0)));
}

#[test]
fn groups_appear_in_first_seen_order() {
    let result = group_reduce(&sales(), &["region"], "sales", AggregateOp::Sum).expect("grouped");

    let regions: Vec<String> = result
        .entries()
        .iter()
        .map(|entry| entry.key[0].to_string())
        .collect();

    assert_eq!(regions, ["north", "south", "east"]);
}

#[test]
fn null_metrics_count_as_zero_observations() {
    let table = sales();
    let south = key(&["south".into()]);

    let mean = group_reduce(&table, &["region"], "sales", AggregateOp::Mean).expect("mean");
    let count = group_reduce(&table, &["region"], "sales", AggregateOp::Count).expect("count");
    let max = group_reduce(&table, &["region"], "sales", AggregateOp::Max).expect("max");

    assert_eq!(mean.value(&south, "sales"), Some(&Value::from(25.0)));
    assert_eq!(count.value(&south, "sales"), Some(&Value::from(2.0)));
    assert_eq!(max.value(&south, "sales"), Some(&Value::from(50.0)));
}

#[test]
fn grouping_by_several_columns_uses_the_value_tuple() {
    let result =
        group_reduce(&sales(), &["region", "month"], "sales", AggregateOp::Sum).expect("grouped");

    assert_eq!(result.len(), 5);
    assert_eq!(
        result.value(&key(&["north".into(), 1.0.into()]), "sales"),
        Some(&Value::from(130.0))
    );
    assert_eq!(result.columns(), ["region", "month", "sales"]);
}

#[test]
fn several_metrics_are_computed_in_one_pass() {
    let metrics = [
        Metric::new("sales", AggregateOp::Sum).named("total"),
        Metric::new("sales", AggregateOp::Count).named("rows"),
    ];

    let result = group_reduce_many(&sales(), &["region"], &metrics).expect("grouped");
    let table = result.to_table();

    assert_eq!(table.columns(), ["region", "total", "rows"]);
    assert_eq!(table.value(0, "total"), Some(&Value::from(200.0)));
    assert_eq!(table.value(0, "rows"), Some(&Value::from(3.0)));
}

#[test]
fn duplicate_metric_names_are_rejected() {
    let metrics = [
        Metric::new("sales", AggregateOp::Sum),
        Metric::new("sales", AggregateOp::Max),
    ];

    let error = group_reduce_many(&sales(), &["region"], &metrics).expect_err("names clash");

    assert!(matches!(error, ToolError::InvalidConfig(_)));
}

#[test]
fn unknown_columns_are_reported_by_name() {
    let error = group_reduce(&sales(), &["branch"], "sales", AggregateOp::Sum)
        .expect_err("column is missing");

    match error {
        ToolError::MissingColumn { column, available } => {
            assert_eq!(column, "branch");
            assert_eq!(available, ["region", "month", "sales"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn aggregation_is_repeatable() {
    let table = sales();

    let first = group_reduce(&table, &["region"], "sales", AggregateOp::Mean).expect("first");
    let second = group_reduce(&table, &["region"], "sales", AggregateOp::Mean).expect("second");

    assert_eq!(first, second);
}

#[test]
fn grouped_results_sort_by_metric() {
    let result = group_reduce(&sales(), &["region"], "sales", AggregateOp::Sum)
        .expect("grouped")
        .sorted_by(&[SortKey::desc("sales")])
        .expect("sorted");

    let regions: Vec<String> = result
        .entries()
        .iter()
        .map(|entry| entry.key[0].to_string())
        .collect();

    assert_eq!(regions, ["north", "south", "east"]);
    assert_eq!(result.entries()[2].values[0], Value::from(10.0));
}

#[test]
fn pivot_cells_match_the_restricted_group_reduction() {
    let table = sales();
    let matrix = pivot(&table, "region", "month", "sales", AggregateOp::Sum, PivotFill::Zero)
        .expect("pivoted");
    let grouped =
        group_reduce(&table, &["region", "month"], "sales", AggregateOp::Sum).expect("grouped");

    for entry in grouped.entries() {
        let (row, col) = (&entry.key[0], &entry.key[1]);
        assert_eq!(matrix.cell(row, col), Some(&entry.values[0]));
        assert!(matrix.is_observed(row, col));
    }
}

#[test]
fn unseen_pivot_cells_hold_the_fill_value() {
    let table = sales();
    let east = Value::from("east");
    let january = Value::from(1.0);

    let zero = pivot(&table, "region", "month", "sales", AggregateOp::Sum, PivotFill::Zero)
        .expect("pivoted");
    let empty = pivot(&table, "region", "month", "sales", AggregateOp::Sum, PivotFill::Empty)
        .expect("pivoted");

    assert!(!zero.is_observed(&east, &january));
    assert_eq!(zero.cell(&east, &january), Some(&Value::from(0.0)));
    assert_eq!(empty.cell(&east, &january), Some(&Value::Null));
}

#[test]
fn sorted_pivot_lays_out_ascending_keys() {
    let matrix = pivot(&sales(), "region", "month", "sales", AggregateOp::Sum, PivotFill::Zero)
        .expect("pivoted")
        .sorted();
    let table = matrix.to_table();

    assert_eq!(table.columns(), ["region", "1", "2", "3"]);
    let regions: Vec<String> = table
        .column_values("region")
        .expect("region column")
        .into_iter()
        .map(Value::to_string)
        .collect();
    assert_eq!(regions, ["east", "north", "south"]);
    assert_eq!(table.value(1, "1"), Some(&Value::from(130.0)));
    assert_eq!(table.value(2, "2"), Some(&Value::from(0.0)));
}

#[test]
fn pivot_headers_stay_unique_when_keys_print_alike() {
    let table = Table::from_rows(
        vec!["region".to_string(), "code".to_string(), "sales".to_string()],
        vec![
            vec!["north".into(), 1.0.into(), 10.0.into()],
            vec!["north".into(), "1".into(), 20.0.into()],
            vec!["south".into(), "Region".into(), 30.0.into()],
            vec!["south".into(), Value::Null, 40.0.into()],
        ],
    )
    .expect("table built");

    let report = pivot(&table, "region", "code", "sales", AggregateOp::Sum, PivotFill::Empty)
        .expect("pivoted")
        .to_table();

    assert_eq!(report.columns(), ["region", "1", "1_2", "Region_2", "code (blank)"]);
    assert_eq!(report.value(0, "1"), Some(&Value::from(10.0)));
    assert_eq!(report.value(0, "1_2"), Some(&Value::from(20.0)));
    assert_eq!(report.value(1, "Region_2"), Some(&Value::from(30.0)));
}
