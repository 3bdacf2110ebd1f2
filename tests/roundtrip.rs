use chrono::NaiveDate;
use tabula_tools::ToolError;
use tabula_tools::chart::{CellRange, ChartSpec};
use tabula_tools::io::excel_read;
use tabula_tools::load::{LoadOptions, load};
use tabula_tools::model::{Table, Value, excel_serial_to_datetime};
use tabula_tools::write::{self, SheetData, WorkbookData};
use tempfile::tempdir;

fn columns(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

fn date(year: i32, month: u32, day: u32) -> Value {
    Value::Date(
        NaiveDate::from_ymd_opt(year, month, day)
            .expect("valid date")
            .and_hms_opt(0, 0, 0)
            .expect("midnight"),
    )
}

fn sales_table() -> Table {
    Table::from_rows(
        columns(&["region", "date", "sales", "note"]),
        vec![
            vec!["north".into(), date(2024, 1, 15), 1200.5.into(), Value::Null],
            vec!["south".into(), date(2024, 2, 1), 900.0.into(), "late".into()],
            vec!["east".into(), Value::Null, (-35.25).into(), "refund".into()],
        ],
    )
    .expect("table built")
}

#[test]
fn table_survives_an_xlsx_roundtrip() {
    let table = sales_table();
    let temp_dir = tempdir().expect("temporary directory");
    let path = temp_dir.path().join("sales.xlsx");

    write::write(&table, "data", &path, None).expect("workbook written");
    let raw = excel_read::read_sheet(&path, Some("data")).expect("workbook read");
    let restored = load(&raw, &LoadOptions::default()).table;

    assert_eq!(restored, table);
}

#[test]
fn first_sheet_is_read_when_none_is_named() {
    let table = sales_table();
    let temp_dir = tempdir().expect("temporary directory");
    let path = temp_dir.path().join("sales.xlsx");
    write::write(&table, "first", &path, None).expect("workbook written");

    let raw = excel_read::read_sheet(&path, None).expect("workbook read");

    assert_eq!(raw.columns, columns(&["region", "date", "sales", "note"]));
    assert_eq!(raw.rows.len(), 3);
}

#[test]
fn missing_sheet_is_a_parse_failure() {
    let temp_dir = tempdir().expect("temporary directory");
    let path = temp_dir.path().join("sales.xlsx");
    write::write(&sales_table(), "data", &path, None).expect("workbook written");

    let error = excel_read::read_sheet(&path, Some("absent")).expect_err("sheet is missing");

    assert!(matches!(error, ToolError::ParseFailure { .. }));
}

#[test]
fn header_only_sheet_is_written_for_an_empty_table() {
    let table = Table::new(columns(&["month", "sales"]));
    let temp_dir = tempdir().expect("temporary directory");
    let path = temp_dir.path().join("empty.xlsx");

    write::write(&table, "summary", &path, None).expect("workbook written");
    let raw = excel_read::read_sheet(&path, Some("summary")).expect("workbook read");

    assert_eq!(raw.columns, columns(&["month", "sales"]));
    assert!(raw.rows.is_empty());
}

#[test]
fn chart_outside_the_written_cells_is_rejected_before_writing() {
    let temp_dir = tempdir().expect("temporary directory");
    let path = temp_dir.path().join("chart.xlsx");
    let chart = ChartSpec::for_columns("Sales", 0, 7, 3);

    let error = write::write(&sales_table(), "data", &path, Some(chart))
        .expect_err("value column is outside the sheet");

    assert!(matches!(error, ToolError::InvalidRange { .. }));
    assert!(!path.exists());
}

#[test]
fn chart_ranges_of_unequal_length_are_rejected() {
    let chart = ChartSpec::new(
        "Sales",
        CellRange::column(2, 1, 3),
        CellRange::column(0, 1, 2),
    );

    let error = chart.validate().expect_err("ranges differ in length");

    assert!(matches!(error, ToolError::InvalidRange { .. }));
}

#[test]
fn chart_inside_the_written_cells_is_saved() {
    let temp_dir = tempdir().expect("temporary directory");
    let path = temp_dir.path().join("chart.xlsx");
    let chart = ChartSpec::for_columns("Sales by region", 0, 2, 3).with_axes("region", "sales");

    write::write(&sales_table(), "data", &path, Some(chart)).expect("workbook written");

    assert!(path.exists());
}

#[test]
fn cell_range_renders_in_a1_notation() {
    assert_eq!(CellRange::new(0, 0, 9, 2).to_string(), "A1:C10");
    assert_eq!(CellRange::column(27, 1, 4).to_string(), "AB2:AB5");
}

#[test]
fn sheet_names_are_sanitised_and_deduplicated() {
    let table = sales_table();
    let mut workbook = WorkbookData::new();
    workbook.push(SheetData::from_table("Summary", &table));
    workbook.push(SheetData::from_table("summary", &table));
    workbook.push(SheetData::from_table("a/b:c", &table));
    workbook.push(SheetData::from_table("", &table));

    let names: Vec<&str> = workbook
        .sheets()
        .iter()
        .map(|sheet| sheet.name.as_str())
        .collect();

    assert_eq!(names, vec!["Summary", "summary_1", "a_b_c", "Sheet"]);
}

#[test]
fn unwritable_destination_names_the_target() {
    let temp_dir = tempdir().expect("temporary directory");
    let path = temp_dir.path().join("missing").join("sales.xlsx");

    let error = write::write(&sales_table(), "sales", &path, None)
        .expect_err("parent directory does not exist");

    match error {
        ToolError::DestinationWriteFailure { destination, reason } => {
            assert_eq!(destination, path);
            assert!(!reason.is_empty());
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!path.exists());
}

#[test]
fn date_serials_at_the_edge_of_the_millisecond_range_are_rejected() {
    let lowest = i64::MIN as f64 / 86_400_000.0;

    assert_eq!(excel_serial_to_datetime(lowest), None);
    assert_eq!(excel_serial_to_datetime(-lowest), None);
    assert_eq!(excel_serial_to_datetime(f64::NAN), None);
    assert_eq!(excel_serial_to_datetime(45306.0), date(2024, 1, 15).as_date());
}
