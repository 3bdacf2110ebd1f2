use std::fs;

use chrono::NaiveDate;
use tabula_tools::ToolError;
use tabula_tools::io::discover::{SourcePattern, discover_sources};
use tabula_tools::io::{self, SourceLocation};
use tabula_tools::load::{LoadOptions, load, parse_amount};
use tabula_tools::model::Value;
use tabula_tools::transform;
use tempfile::tempdir;

fn midnight(year: i32, month: u32, day: u32) -> Value {
    Value::Date(
        NaiveDate::from_ymd_opt(year, month, day)
            .expect("valid date")
            .and_hms_opt(0, 0, 0)
            .expect("midnight"),
    )
}

#[test]
fn csv_cells_are_coerced_by_column_hints() {
    let temp_dir = tempdir().expect("temporary directory");
    let path = temp_dir.path().join("kakeibo.csv");
    fs::write(
        &path,
        "date,category,amount,memo\n\
         2024-01-05,food,Â£51.77,lunch\n\
         2024/01/06,transport,\"$1,200\",\n\
         not a date,food,-¥300,refund\n",
    )
    .expect("fixture written");

    let raw = io::read_source(&SourceLocation::new(&path)).expect("CSV read");
    let options = LoadOptions::default()
        .with_date_columns(["date"])
        .with_currency_columns(["amount"]);
    let loaded = load(&raw, &options);
    let table = &loaded.table;

    assert_eq!(table.columns(), ["date", "category", "amount", "memo"]);
    assert_eq!(table.value(0, "date"), Some(&midnight(2024, 1, 5)));
    assert_eq!(table.value(1, "date"), Some(&midnight(2024, 1, 6)));
    assert_eq!(table.value(0, "amount"), Some(&Value::from(51.77)));
    assert_eq!(table.value(1, "amount"), Some(&Value::from(1200.0)));
    assert_eq!(table.value(2, "amount"), Some(&Value::from(-300.0)));
    assert_eq!(table.value(1, "memo"), Some(&Value::Null));

    assert_eq!(table.value(2, "date"), Some(&Value::Null));
    assert_eq!(loaded.warnings.len(), 1);
    assert_eq!(loaded.warnings[0].row, 2);
    assert_eq!(loaded.warnings[0].column, "date");
    assert_eq!(loaded.warnings[0].raw, "not a date");
}

#[test]
fn untyped_cells_are_inferred() {
    let temp_dir = tempdir().expect("temporary directory");
    let path = temp_dir.path().join("staff.csv");
    fs::write(&path, "部署,給与\n営業,300000\n開発, \n").expect("fixture written");

    let raw = io::read_source(&SourceLocation::new(&path)).expect("CSV read");
    let table = load(&raw, &LoadOptions::default()).table;

    assert_eq!(table.value(0, "部署"), Some(&Value::from("営業")));
    assert_eq!(table.value(0, "給与"), Some(&Value::from(300000.0)));
    assert_eq!(table.value(1, "給与"), Some(&Value::Null));
}

#[test]
fn ragged_rows_extend_the_schema() {
    let temp_dir = tempdir().expect("temporary directory");
    let path = temp_dir.path().join("ragged.csv");
    fs::write(&path, "a,b\n1\n2,3,4\n").expect("fixture written");

    let raw = io::read_source(&SourceLocation::new(&path)).expect("CSV read");
    let table = load(&raw, &LoadOptions::default()).table;

    assert_eq!(table.columns(), ["a", "b", "column_3"]);
    assert_eq!(table.value(0, "b"), Some(&Value::Null));
    assert_eq!(table.value(1, "column_3"), Some(&Value::from(4.0)));
}

#[test]
fn undecodable_fields_load_as_null_with_a_warning() {
    let temp_dir = tempdir().expect("temporary directory");
    let path = temp_dir.path().join("shift_jis.csv");
    fs::write(&path, b"category,amount\nfood,100\n\xff\xfe,200\ntransport,300\n")
        .expect("fixture written");

    let raw = io::read_source(&SourceLocation::new(&path)).expect("CSV read");
    let loaded = load(&raw, &LoadOptions::default());
    let table = &loaded.table;

    assert_eq!(table.row_count(), 3);
    assert_eq!(table.value(1, "category"), Some(&Value::Null));
    assert_eq!(table.value(1, "amount"), Some(&Value::from(200.0)));
    assert_eq!(table.value(2, "category"), Some(&Value::from("transport")));
    assert_eq!(loaded.warnings.len(), 1);
    assert_eq!(loaded.warnings[0].row, 1);
    assert_eq!(loaded.warnings[0].column, "category");
    assert_eq!(loaded.warnings[0].raw, "\u{fffd}\u{fffd}");
}

#[test]
fn missing_and_unknown_sources_are_unavailable() {
    let temp_dir = tempdir().expect("temporary directory");

    let missing = io::read_source(&SourceLocation::new(temp_dir.path().join("absent.xlsx")))
        .expect_err("file does not exist");
    let unknown = io::read_source(&SourceLocation::new(temp_dir.path().join("notes.pdf")))
        .expect_err("format is unknown");

    assert!(matches!(missing, ToolError::SourceUnavailable { .. }));
    assert!(matches!(unknown, ToolError::SourceUnavailable { .. }));
}

#[test]
fn discovery_matches_prefix_and_extension_in_name_order() {
    let temp_dir = tempdir().expect("temporary directory");
    for name in [
        "sales_3.xlsx",
        "sales_1.xlsx",
        "sales_2.XLSX",
        "~$sales_1.xlsx",
        "costs_1.xlsx",
        "sales_notes.txt",
    ] {
        fs::write(temp_dir.path().join(name), b"").expect("fixture written");
    }

    let found = discover_sources(temp_dir.path(), &SourcePattern::new("sales_", "xlsx"))
        .expect("directory listed");
    let names: Vec<String> = found
        .iter()
        .filter_map(|path| path.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .collect();

    assert_eq!(names, ["sales_1.xlsx", "sales_2.XLSX", "sales_3.xlsx"]);
}

#[test]
fn amounts_with_currency_marks_parse() {
    assert_eq!(parse_amount("Â£51.77"), Some(51.77));
    assert_eq!(parse_amount(" €1,234.50 "), Some(1234.5));
    assert_eq!(parse_amount("-$3"), Some(-3.0));
    assert_eq!(parse_amount("free"), None);
}

#[test]
fn transforms_reshape_the_loaded_table() {
    let temp_dir = tempdir().expect("temporary directory");
    let path = temp_dir.path().join("staff.csv");
    fs::write(
        &path,
        "name,部署,給与,joined\nAoki,営業,300000,2023-04-01\nBaba,開発,350000,2022-10-01\nChiba,営業,280000,2024-01-15\n",
    )
    .expect("fixture written");
    let raw = io::read_source(&SourceLocation::new(&path)).expect("CSV read");
    let table = load(&raw, &LoadOptions::default().with_date_columns(["joined"])).table;

    let sales = transform::filter_eq(&table, "部署", &Value::from("営業")).expect("filtered");
    let yearly = transform::derive_scaled(&sales, "給与", 12.0, "年収").expect("scaled");
    let months = transform::derive_month(&yearly, "joined", "月").expect("month derived");
    let trimmed = transform::drop_columns(&months, &["joined"]).expect("dropped");
    let picked = transform::select(&trimmed, &["name", "年収", "月"]).expect("selected");

    assert_eq!(picked.columns(), ["name", "年収", "月"]);
    assert_eq!(picked.row_count(), 2);
    assert_eq!(picked.value(0, "年収"), Some(&Value::from(3_600_000.0)));
    assert_eq!(picked.value(1, "月"), Some(&Value::from(1.0)));
    assert!(transform::derive_scaled(&table, "給与", f64::NAN, "x").is_err());
}
