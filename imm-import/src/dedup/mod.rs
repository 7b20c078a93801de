//! Site and event generation: collapse rows with equal site/event values
//!
//! Rows are compared on the category's columns, minus the identifier column
//! and any column with at most one distinct value. The first row with a given
//! value tuple mints the identifier; later equal rows reuse it.

mod series;

pub use series::{IdSeries, prefix_for, series_for};

use std::collections::{BTreeSet, HashMap};

use crate::schema::tables::EntityTable;
use crate::schema::{ColumnMap, SchemaError};
use crate::sheet::{Sheet, Tab};
use crate::value::Value;

/// One distinct site or event
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedEntity {
    pub identifier: String,
    /// Values of the comparison columns, from the first row
    pub values: Vec<Value>,
    pub first_row: usize,
    /// Minted in this run rather than already present in the sheet
    pub minted: bool,
}

/// Result of generating identifiers for one category
#[derive(Debug, Clone, Default)]
pub struct Generation {
    pub id_column: usize,
    pub comparison_columns: Vec<usize>,
    /// `(row, identifier)` in sheet order
    pub assignments: Vec<(usize, String)>,
    pub entities: Vec<GeneratedEntity>,
}

impl Generation {
    pub fn minted(&self) -> usize {
        self.entities.iter().filter(|e| e.minted).count()
    }
}

fn tuple(sheet: &Sheet, row: usize, columns: &[usize]) -> Vec<Option<String>> {
    columns.iter().map(|&col| sheet.cell(row, col).canonical()).collect()
}

/// Columns with more than one distinct non-null value
fn varying_columns(sheet: &Sheet, columns: &[usize]) -> Vec<usize> {
    columns
        .iter()
        .copied()
        .filter(|&col| {
            let distinct: BTreeSet<String> = (0..sheet.row_count())
                .filter_map(|row| sheet.cell(row, col).canonical())
                .collect();
            distinct.len() > 1
        })
        .collect()
}

/// Assign a site/event identifier to every row
///
/// Identifiers already in the sheet are kept and count toward the series.
/// When none of the category's columns varies, every row shares one entity.
/// Only a category with no columns besides the identifier makes every row
/// its own entity.
pub fn generate(
    sheet: &Sheet,
    columns: &ColumnMap,
    table: &EntityTable,
    series: &mut IdSeries,
) -> Result<Generation, SchemaError> {
    let id_column = columns.require(&table.identifier_qualifier())?;
    let relevant: Vec<usize> = columns
        .resolve(table.category)
        .iter()
        .copied()
        .filter(|&col| col != id_column)
        .collect();
    let comparison_columns = varying_columns(sheet, &relevant);
    log::debug!(
        "{}: comparing {} of {} column(s)",
        table.key.table,
        comparison_columns.len(),
        relevant.len()
    );

    for row in 0..sheet.row_count() {
        if let Some(existing) = sheet.cell(row, id_column).canonical() {
            series.observe(&existing);
        }
    }

    let mut generation = Generation {
        id_column,
        comparison_columns,
        ..Default::default()
    };
    let matchable = !relevant.is_empty();
    let mut by_tuple: HashMap<Vec<Option<String>>, usize> = HashMap::new();
    let mut by_identifier: HashMap<String, usize> = HashMap::new();

    for row in 0..sheet.row_count() {
        let key = tuple(sheet, row, &generation.comparison_columns);

        let identifier = if let Some(existing) = sheet.cell(row, id_column).canonical() {
            if !by_identifier.contains_key(&existing) {
                register(&mut generation, &mut by_identifier, &mut by_tuple, matchable, key, &existing, row, sheet, false);
            }
            existing
        } else if let Some(&entity) = by_tuple.get(&key).filter(|_| matchable) {
            generation.entities[entity].identifier.clone()
        } else {
            let minted = series.mint();
            register(&mut generation, &mut by_identifier, &mut by_tuple, matchable, key, &minted, row, sheet, true);
            minted
        };
        generation.assignments.push((row, identifier));
    }

    log::info!(
        "{}: {} distinct, {} new identifier(s)",
        table.key.table,
        generation.entities.len(),
        generation.minted()
    );
    Ok(generation)
}

#[allow(clippy::too_many_arguments)]
fn register(
    generation: &mut Generation,
    by_identifier: &mut HashMap<String, usize>,
    by_tuple: &mut HashMap<Vec<Option<String>>, usize>,
    matchable: bool,
    key: Vec<Option<String>>,
    identifier: &str,
    row: usize,
    sheet: &Sheet,
    minted: bool,
) {
    let index = generation.entities.len();
    generation.entities.push(GeneratedEntity {
        identifier: identifier.to_string(),
        values: generation
            .comparison_columns
            .iter()
            .map(|&col| sheet.cell(row, col).clone())
            .collect(),
        first_row: row,
        minted,
    });
    by_identifier.insert(identifier.to_string(), index);
    if matchable {
        by_tuple.entry(key).or_insert(index);
    }
}

/// Write each row's identifier into the identifier column
pub fn write_back(sheet: &mut Sheet, generation: &Generation) {
    for (row, identifier) in &generation.assignments {
        sheet.set_cell(*row, generation.id_column, Value::from(identifier.as_str()));
    }
}

/// Review tab: identifier column first, then the comparison columns by label
pub fn to_tab(name: &str, columns: &ColumnMap, generation: &Generation) -> Tab {
    let mut header = vec![columns.label(generation.id_column).to_string()];
    header.extend(generation.comparison_columns.iter().map(|&col| columns.label(col).to_string()));

    let mut tab = Tab::new(name, header);
    tab.rows = generation
        .entities
        .iter()
        .map(|entity| {
            let mut row = vec![Value::from(entity.identifier.as_str())];
            row.extend(entity.values.iter().cloned());
            row
        })
        .collect();
    tab
}
