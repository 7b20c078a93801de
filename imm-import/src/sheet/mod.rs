//! Workbook model: the template sheet with its three header rows plus resolved tabs

mod reader;
mod writer;

pub use reader::read_workbook;
pub use writer::write_workbook;

use crate::value::Value;

/// Rows above the data in the template sheet
pub const HEADER_ROWS: usize = 3;

/// Names of the generated tabs
pub mod tabs {
    pub const PERSON: &str = "Person";
    pub const ORGANIZATION: &str = "Organization";
    pub const TAXON: &str = "Taxon";
    pub const SITE: &str = "Site";
    pub const EVENT: &str = "Event";
    pub const LOCATION: &str = "Location";

    pub const ALL: [&str; 6] = [PERSON, ORGANIZATION, TAXON, SITE, EVENT, LOCATION];
}

/// Header rows for one template column
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnHeader {
    /// Row 1: grouping/metadata text
    pub metadata: String,
    /// Row 2: destination `Table.column`
    pub qualifier: String,
    /// Row 3: label shown to curators
    pub label: String,
}

impl ColumnHeader {
    pub fn new(qualifier: &str, label: &str) -> Self {
        Self {
            metadata: String::new(),
            qualifier: qualifier.to_string(),
            label: label.to_string(),
        }
    }
}

/// The template sheet
#[derive(Debug, Clone, Default)]
pub struct Sheet {
    pub name: String,
    pub headers: Vec<ColumnHeader>,
    pub rows: Vec<Vec<Value>>,
}

static NULL: Value = Value::Null;

impl Sheet {
    pub fn new(name: &str, headers: Vec<ColumnHeader>) -> Self {
        Self {
            name: name.to_string(),
            headers,
            rows: Vec::new(),
        }
    }

    pub fn width(&self) -> usize {
        self.headers.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Cell value; missing cells read as null
    pub fn cell(&self, row: usize, col: usize) -> &Value {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&NULL)
    }

    pub fn set_cell(&mut self, row: usize, col: usize, value: Value) {
        if row >= self.rows.len() {
            self.rows.resize_with(row + 1, Vec::new);
        }
        let cells = &mut self.rows[row];
        if col >= cells.len() {
            cells.resize(col + 1, Value::Null);
        }
        cells[col] = value;
    }

    pub fn push_row(&mut self, row: Vec<Value>) {
        self.rows.push(row);
    }

    pub fn column_by_label(&self, label: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.label == label)
    }

    pub fn column_by_qualifier(&self, qualifier: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.qualifier == qualifier)
    }

    /// Find a column by label or append it; an existing column gets the new
    /// qualifier and has its cells cleared
    pub fn upsert_column(&mut self, label: &str, qualifier: &str) -> usize {
        match self.column_by_label(label) {
            Some(col) => {
                self.headers[col].qualifier = qualifier.to_string();
                for row in 0..self.rows.len() {
                    if col < self.rows[row].len() {
                        self.rows[row][col] = Value::Null;
                    }
                }
                col
            }
            None => {
                self.headers.push(ColumnHeader::new(qualifier, label));
                self.headers.len() - 1
            }
        }
    }

    /// Spreadsheet row number (1-based, counting header rows) of a data row
    pub fn display_row(row: usize) -> usize {
        row + HEADER_ROWS + 1
    }
}

/// A plain tab: one header row and data rows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tab {
    pub name: String,
    pub header: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Tab {
    pub fn new(name: &str, header: Vec<String>) -> Self {
        Self {
            name: name.to_string(),
            header,
            rows: Vec::new(),
        }
    }
}

/// Template sheet plus any resolved tabs, in output order
#[derive(Debug, Clone, Default)]
pub struct Workbook {
    pub template: Sheet,
    pub tabs: Vec<Tab>,
}

impl Workbook {
    pub fn tab(&self, name: &str) -> Option<&Tab> {
        self.tabs.iter().find(|t| t.name == name)
    }

    /// Insert or replace a tab by name
    pub fn set_tab(&mut self, tab: Tab) {
        match self.tabs.iter_mut().find(|t| t.name == tab.name) {
            Some(existing) => *existing = tab,
            None => self.tabs.push(tab),
        }
    }
}

/// Excel column letters for a zero-based index (0 -> A, 26 -> AA)
pub fn column_letter(mut col: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push((b'A' + (col % 26) as u8) as char);
        if col < 26 {
            break;
        }
        col = col / 26 - 1;
    }
    letters.iter().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_letter() {
        assert_eq!(column_letter(0), "A");
        assert_eq!(column_letter(25), "Z");
        assert_eq!(column_letter(26), "AA");
        assert_eq!(column_letter(701), "ZZ");
        assert_eq!(column_letter(702), "AAA");
    }

    #[test]
    fn test_cell_defaults_to_null() {
        let mut sheet = Sheet::new("IMM_template", vec![ColumnHeader::new("Item.catalogue_num", "Catalogue Number")]);
        assert!(sheet.cell(3, 7).is_null());
        sheet.set_cell(2, 1, Value::from("x"));
        assert_eq!(sheet.row_count(), 3);
        assert_eq!(sheet.cell(2, 1), &Value::from("x"));
        assert!(sheet.cell(2, 0).is_null());
    }

    #[test]
    fn test_upsert_column_overwrites_existing() {
        let mut sheet = Sheet::new("IMM_template", vec![ColumnHeader::new("Person.search_name", "Collector")]);
        let col = sheet.upsert_column("Collector ID", "Collector.pid");
        assert_eq!(col, 1);
        sheet.set_cell(0, col, Value::Int(4));

        let again = sheet.upsert_column("Collector ID", "Collector.pid");
        assert_eq!(again, 1);
        assert_eq!(sheet.width(), 2);
        assert!(sheet.cell(0, again).is_null());
    }

    #[test]
    fn test_display_row() {
        assert_eq!(Sheet::display_row(0), 4);
    }
}
