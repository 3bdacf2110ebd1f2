use tabula_tools::ToolError;
use tabula_tools::merge::{MergeOptions, merge};
use tabula_tools::model::{Table, Value};

fn table(columns: &[&str], rows: Vec<Vec<Value>>) -> Table {
    Table::from_rows(
        columns.iter().map(|column| column.to_string()).collect(),
        rows,
    )
    .expect("table built")
}

fn labels(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

#[test]
fn merged_rows_keep_input_order_and_carry_their_origin() {
    let january = table(
        &["month", "sales"],
        vec![vec![1.0.into(), 10.0.into()], vec![1.0.into(), 15.0.into()]],
    );
    let february = table(&["month", "sales"], vec![vec![2.0.into(), 18.0.into()]]);

    let merged = merge(
        vec![january, february],
        &labels(&["sales_1.xlsx", "sales_2.xlsx"]),
        &MergeOptions::default(),
    )
    .expect("tables merged");

    assert_eq!(merged.columns(), ["month", "sales", "origin"]);
    assert_eq!(merged.row_count(), 3);
    let sales: Vec<&Value> = merged.column_values("sales").expect("sales column");
    assert_eq!(sales, [&Value::from(10.0), &Value::from(15.0), &Value::from(18.0)]);
    let origins: Vec<String> = merged
        .column_values("origin")
        .expect("origin column")
        .into_iter()
        .map(Value::to_string)
        .collect();
    assert_eq!(origins, ["sales_1.xlsx", "sales_1.xlsx", "sales_2.xlsx"]);
}

#[test]
fn columns_missing_from_a_source_are_null() {
    let first = table(&["a", "b"], vec![vec![1.0.into(), 2.0.into()]]);
    let second = table(&["b", "c"], vec![vec![3.0.into(), "x".into()]]);

    let merged = merge(
        vec![first, second],
        &labels(&["first", "second"]),
        &MergeOptions::default(),
    )
    .expect("tables merged");

    assert_eq!(merged.columns(), ["a", "b", "c", "origin"]);
    assert_eq!(merged.value(0, "c"), Some(&Value::Null));
    assert_eq!(merged.value(1, "a"), Some(&Value::Null));
    assert_eq!(merged.value(1, "b"), Some(&Value::from(3.0)));
}

#[test]
fn strict_merge_rejects_columns_with_different_kinds() {
    let first = table(&["amount"], vec![vec![10.0.into()]]);
    let second = table(&["amount"], vec![vec!["n/a".into()]]);

    let error = merge(
        vec![first, second],
        &labels(&["first", "second"]),
        &MergeOptions::default().strict(true),
    )
    .expect_err("kinds differ");

    match error {
        ToolError::SchemaConflict {
            column, sources, ..
        } => {
            assert_eq!(column, "amount");
            assert_eq!(sources, labels(&["first", "second"]));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn lenient_merge_turns_conflicting_columns_into_text() {
    let first = table(&["amount", "units"], vec![vec![10.0.into(), 1.0.into()]]);
    let second = table(&["amount", "units"], vec![vec!["n/a".into(), 2.0.into()]]);

    let merged = merge(
        vec![first, second],
        &labels(&["first", "second"]),
        &MergeOptions::default(),
    )
    .expect("tables merged");

    assert_eq!(merged.value(0, "amount"), Some(&Value::from("10")));
    assert_eq!(merged.value(1, "amount"), Some(&Value::from("n/a")));
    assert_eq!(merged.value(1, "units"), Some(&Value::from(2.0)));
}

#[test]
fn null_cells_do_not_count_as_a_conflicting_kind() {
    let first = table(&["amount"], vec![vec![Value::Null]]);
    let second = table(&["amount"], vec![vec![5.0.into()]]);

    let merged = merge(
        vec![first, second],
        &labels(&["first", "second"]),
        &MergeOptions::default().strict(true),
    )
    .expect("tables merged");

    assert_eq!(merged.value(1, "amount"), Some(&Value::from(5.0)));
}

#[test]
fn label_count_must_match_table_count() {
    let only = table(&["a"], vec![vec![1.0.into()]]);

    let error = merge(vec![only], &[], &MergeOptions::default()).expect_err("labels missing");

    assert!(matches!(
        error,
        ToolError::OriginMismatch {
            tables: 1,
            labels: 0
        }
    ));
}

#[test]
fn merging_nothing_yields_only_the_origin_column() {
    let merged = merge(Vec::new(), &[], &MergeOptions::default()).expect("empty merge");

    assert_eq!(merged.columns(), ["origin"]);
    assert!(merged.is_empty());
}

#[test]
fn origin_column_name_is_configurable_and_overrides_a_source_column() {
    let source = table(
        &["source_file", "sales"],
        vec![vec!["stale".into(), 1.0.into()]],
    );

    let merged = merge(
        vec![source],
        &labels(&["fresh.xlsx"]),
        &MergeOptions::default().with_origin_column("source_file"),
    )
    .expect("tables merged");

    assert_eq!(merged.columns(), ["sales", "source_file"]);
    assert_eq!(merged.value(0, "source_file"), Some(&Value::from("fresh.xlsx")));
}
