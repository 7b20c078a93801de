//! Write the annotated workbook with rust_xlsxwriter

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Datelike, Timelike};
use rust_xlsxwriter::{ExcelDateTime, Format, Workbook as XlsxWorkbook, Worksheet};

use super::{HEADER_ROWS, Workbook};
use crate::value::Value;

/// Write the template sheet first, then the tabs in order
pub fn write_workbook(workbook: &Workbook, path: &Path) -> Result<()> {
    let mut xlsx = XlsxWorkbook::new();
    let formats = Formats::new();

    let template = &workbook.template;
    let worksheet = xlsx.add_worksheet();
    worksheet.set_name(&template.name)?;

    for (col, header) in template.headers.iter().enumerate() {
        let col = col as u16;
        if !header.metadata.is_empty() {
            worksheet.write_string(0, col, &header.metadata)?;
        }
        if !header.qualifier.is_empty() {
            worksheet.write_string(1, col, &header.qualifier)?;
        }
        if !header.label.is_empty() {
            worksheet.write_string_with_format(2, col, &header.label, &formats.header)?;
        }
    }
    for (row_idx, row) in template.rows.iter().enumerate() {
        let row_num = (row_idx + HEADER_ROWS) as u32;
        for (col, value) in row.iter().enumerate() {
            write_value(worksheet, row_num, col as u16, value, &formats)?;
        }
    }

    for tab in &workbook.tabs {
        let worksheet = xlsx.add_worksheet();
        worksheet.set_name(&tab.name)?;
        for (col, name) in tab.header.iter().enumerate() {
            worksheet.write_string_with_format(0, col as u16, name, &formats.header)?;
        }
        for (row_idx, row) in tab.rows.iter().enumerate() {
            for (col, value) in row.iter().enumerate() {
                write_value(worksheet, (row_idx + 1) as u32, col as u16, value, &formats)?;
            }
        }
    }

    xlsx.save(path)
        .with_context(|| format!("Failed to save Excel file: {}", path.display()))?;
    log::info!("Workbook written to: {}", path.display());
    Ok(())
}

struct Formats {
    header: Format,
    date: Format,
    datetime: Format,
}

impl Formats {
    fn new() -> Self {
        Self {
            header: Format::new().set_bold(),
            date: Format::new().set_num_format("yyyy-mm-dd"),
            datetime: Format::new().set_num_format("yyyy-mm-dd hh:mm:ss"),
        }
    }
}

fn write_value(ws: &mut Worksheet, row: u32, col: u16, value: &Value, formats: &Formats) -> Result<()> {
    match value {
        Value::Null => { /* Leave cell empty */ }
        Value::String(s) => { ws.write_string(row, col, s)?; }
        Value::Int(i) => { ws.write_number(row, col, *i as f64)?; }
        Value::Float(f) => { ws.write_number(row, col, *f)?; }
        Value::Bool(b) => { ws.write_boolean(row, col, *b)?; }
        Value::Date(d) => {
            let dt = ExcelDateTime::from_ymd(d.year() as u16, d.month() as u8, d.day() as u8)?;
            ws.write_datetime_with_format(row, col, &dt, &formats.date)?;
        }
        Value::DateTime(dt) => {
            let excel = ExcelDateTime::from_ymd(dt.year() as u16, dt.month() as u8, dt.day() as u8)?
                .and_hms(dt.hour() as u16, dt.minute() as u8, dt.second() as f64)?;
            ws.write_datetime_with_format(row, col, &excel, &formats.datetime)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::{ColumnHeader, Sheet, Tab, read_workbook};
    use chrono::NaiveDate;

    fn temp_path() -> std::path::PathBuf {
        std::env::temp_dir().join(format!("imm-import-{}.xlsx", uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_write_then_read_round_trip() {
        let mut template = Sheet::new(
            "IMM_template",
            vec![
                ColumnHeader::new("Item.catalogue_num", "Catalogue Number"),
                ColumnHeader::new("CollectionEvent.start_date", "Date"),
                ColumnHeader::new("Collector.pid", "Collector ID"),
            ],
        );
        let date = NaiveDate::from_ymd_opt(2018, 8, 21).unwrap();
        template.push_row(vec![Value::from("974-00012"), Value::Date(date), Value::from("3, 4")]);
        template.push_row(vec![Value::from("974-00013"), Value::Null, Value::Int(4)]);

        let mut person = Tab::new("Person", vec!["Name".into(), "person_id".into()]);
        person.rows.push(vec![Value::from("Meg Sugrue"), Value::from("NEW?")]);

        let workbook = Workbook {
            template,
            tabs: vec![person],
        };
        let path = temp_path();
        write_workbook(&workbook, &path).unwrap();

        let read = read_workbook(&path, "IMM_template").unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(read.template.headers, workbook.template.headers);
        assert_eq!(read.template.rows, workbook.template.rows);
        assert_eq!(read.tab("Person"), workbook.tab("Person"));
    }
}
