//! Read the import workbook with calamine

use std::path::Path;

use anyhow::{Context, Result};
use calamine::{Data, Range, Reader, Xlsx, open_workbook};

use super::{ColumnHeader, HEADER_ROWS, Sheet, Tab, Workbook, tabs};
use crate::value::Value;

/// Read the template sheet and any known tabs
///
/// Falls back to the first sheet when `template_sheet` is absent.
pub fn read_workbook(path: &Path, template_sheet: &str) -> Result<Workbook> {
    let mut workbook: Xlsx<_> = open_workbook(path)
        .with_context(|| format!("Failed to open Excel file: {}", path.display()))?;

    let sheet_names = workbook.sheet_names();
    let template_name = if sheet_names.iter().any(|n| n == template_sheet) {
        template_sheet.to_string()
    } else {
        let first = sheet_names.first().context("Excel file has no sheets")?.clone();
        log::warn!(
            "Sheet '{}' not found in {}, using first sheet '{}'",
            template_sheet,
            path.display(),
            first
        );
        first
    };

    let range = workbook
        .worksheet_range(&template_name)
        .with_context(|| format!("Failed to read sheet: {}", template_name))?;
    let template = parse_template(&template_name, &grid(&range));
    log::info!(
        "Read {} rows x {} columns from '{}'",
        template.row_count(),
        template.width(),
        template_name
    );

    let mut tabs_read = Vec::new();
    for name in sheet_names.iter().filter(|n| tabs::ALL.contains(&n.as_str())) {
        let range = workbook
            .worksheet_range(name)
            .with_context(|| format!("Failed to read sheet: {}", name))?;
        tabs_read.push(parse_tab(name, &grid(&range)));
    }

    Ok(Workbook {
        template,
        tabs: tabs_read,
    })
}

/// Cells in absolute sheet coordinates; calamine ranges start at the first used cell
fn grid(range: &Range<Data>) -> Vec<Vec<Value>> {
    let Some((start_row, start_col)) = range.start() else {
        return Vec::new();
    };

    let mut rows = vec![Vec::new(); start_row as usize];
    for row in range.rows() {
        let mut cells = vec![Value::Null; start_col as usize];
        cells.extend(row.iter().map(cell_value));
        rows.push(cells);
    }
    rows
}

fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty | Data::Error(_) => Value::Null,
        Data::String(s) => Value::text(s.clone()),
        Data::Int(i) => Value::Int(*i),
        Data::Float(f) => Value::number(*f),
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(dt) => dt.as_datetime().map(Value::timestamp).unwrap_or(Value::Null),
        Data::DateTimeIso(s) => chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
            .map(Value::timestamp)
            .or_else(|_| chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").map(Value::Date))
            .unwrap_or_else(|_| Value::text(s.clone())),
        Data::DurationIso(s) => Value::text(s.clone()),
    }
}

fn header_text(grid: &[Vec<Value>], row: usize, col: usize) -> String {
    grid.get(row)
        .and_then(|r| r.get(col))
        .and_then(Value::canonical)
        .unwrap_or_default()
}

fn parse_template(name: &str, grid: &[Vec<Value>]) -> Sheet {
    let widest = grid.iter().take(HEADER_ROWS).map(Vec::len).max().unwrap_or(0);

    // Columns past the last one with a qualifier or label are ignored
    let width = (0..widest)
        .rev()
        .find(|&col| !header_text(grid, 1, col).is_empty() || !header_text(grid, 2, col).is_empty())
        .map(|col| col + 1)
        .unwrap_or(0);

    let headers = (0..width)
        .map(|col| ColumnHeader {
            metadata: header_text(grid, 0, col),
            qualifier: header_text(grid, 1, col),
            label: header_text(grid, 2, col),
        })
        .collect();

    let mut sheet = Sheet::new(name, headers);
    for row in grid.iter().skip(HEADER_ROWS) {
        let mut cells: Vec<Value> = row.iter().take(width).cloned().collect();
        if cells.iter().all(Value::is_null) {
            continue;
        }
        cells.resize(width, Value::Null);
        sheet.push_row(cells);
    }
    sheet
}

fn parse_tab(name: &str, grid: &[Vec<Value>]) -> Tab {
    let Some(first) = grid.first() else {
        return Tab::new(name, Vec::new());
    };
    let header: Vec<String> = first.iter().map(|v| v.canonical().unwrap_or_default()).collect();

    let mut tab = Tab::new(name, header);
    tab.rows = grid
        .iter()
        .skip(1)
        .filter(|row| !row.iter().all(Value::is_null))
        .cloned()
        .collect();
    tab
}
