use std::collections::HashSet;
use std::path::Path;

use rust_xlsxwriter::{Chart, ChartType, Format, TableColumn, Workbook, Worksheet};
use tracing::debug;

use crate::tabula::tools::chart::{ChartKind, ChartSpec};
use crate::tabula::tools::error::{Result, ToolError};
use crate::tabula::tools::model::{Value, datetime_to_excel_serial};
use crate::tabula::tools::write::WorkbookData;

struct CellFormats {
    date: Format,
    datetime: Format,
}

/// Writes the provided workbook data to the given path.
pub fn write_workbook(path: &Path, workbook: &WorkbookData) -> Result<()> {
    let mut workbook_writer = Workbook::new();
    let formats = CellFormats {
        date: Format::new().set_num_format("yyyy-mm-dd"),
        datetime: Format::new().set_num_format("yyyy-mm-dd hh:mm:ss"),
    };

    for sheet in workbook.sheets() {
        let worksheet = workbook_writer.add_worksheet();
        worksheet.set_name(&sheet.name)?;

        for (col_idx, header) in sheet.columns.iter().enumerate() {
            worksheet.write_string(0, col_idx as u16, header)?;
        }

        for (row_idx, row) in sheet.rows.iter().enumerate() {
            for (col_idx, cell) in row.iter().enumerate() {
                write_cell(worksheet, (row_idx + 1) as u32, col_idx as u16, cell, &formats)?;
            }
        }

        if !sheet.rows.is_empty() && has_unique_headers(&sheet.columns) {
            let columns: Vec<TableColumn> = sheet
                .columns
                .iter()
                .map(|header| TableColumn::new().set_header(header))
                .collect();
            let mut excel_table = rust_xlsxwriter::Table::new();
            excel_table.set_autofilter(true).set_columns(&columns);
            let col_end = (sheet.columns.len() as u16).saturating_sub(1);
            worksheet.add_table(0, 0, sheet.rows.len() as u32, col_end, &excel_table)?;
        }

        if let Some(spec) = &sheet.chart {
            let chart = build_chart(&sheet.name, spec);
            worksheet.insert_chart(1, sheet.written_cols().saturating_add(1), &chart)?;
        }

        debug!(sheet = %sheet.name, rows = sheet.rows.len(), "sheet written");
    }

    workbook_writer
        .save(path)
        .map_err(|err| ToolError::DestinationWriteFailure {
            destination: path.to_path_buf(),
            reason: err.to_string(),
        })?;
    Ok(())
}

fn write_cell(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    value: &Value,
    formats: &CellFormats,
) -> Result<()> {
    match value {
        Value::Number(number) if number.is_finite() => {
            worksheet.write_number(row, col, *number)?;
        }
        Value::Text(text) => {
            worksheet.write_string(row, col, text)?;
        }
        Value::Date(date) => {
            if let Some(serial) = datetime_to_excel_serial(date) {
                let format = if serial.fract() == 0.0 {
                    &formats.date
                } else {
                    &formats.datetime
                };
                worksheet.write_number_with_format(row, col, serial, format)?;
            }
        }
        // Blank cells: Null and numbers a workbook cannot store.
        Value::Number(_) | Value::Null => {}
    }
    Ok(())
}

fn has_unique_headers(columns: &[String]) -> bool {
    let mut seen = HashSet::new();
    columns
        .iter()
        .all(|header| !header.trim().is_empty() && seen.insert(header.to_lowercase()))
}

fn build_chart(sheet_name: &str, spec: &ChartSpec) -> Chart {
    let mut chart = Chart::new(match spec.kind {
        ChartKind::Column => ChartType::Column,
        ChartKind::Bar => ChartType::Bar,
        ChartKind::Line => ChartType::Line,
        ChartKind::Pie => ChartType::Pie,
    });

    let values = spec.values;
    let categories = spec.categories;
    chart
        .add_series()
        .set_categories((
            sheet_name,
            categories.first_row,
            categories.first_col,
            categories.last_row,
            categories.last_col,
        ))
        .set_values((
            sheet_name,
            values.first_row,
            values.first_col,
            values.last_row,
            values.last_col,
        ));

    if !spec.title.is_empty() {
        chart.title().set_name(spec.title.as_str());
    }
    if !spec.x_axis.is_empty() {
        chart.x_axis().set_name(spec.x_axis.as_str());
    }
    if !spec.y_axis.is_empty() {
        chart.y_axis().set_name(spec.y_axis.as_str());
    }
    chart
}
