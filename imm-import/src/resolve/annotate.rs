//! Write reviewed reference ids back into the template as ID columns

use super::dictionary::{ReferenceDictionary, Resolution};
use super::entities::cell_keys;
use crate::schema::tables::{MemberKind, Role};
use crate::schema::{Category, ColumnMap};
use crate::sheet::Sheet;
use crate::value::Value;

/// A name whose id could not be filled in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unresolved {
    /// Spreadsheet row number
    pub row: usize,
    pub column: String,
    pub name: String,
    /// What the tab said instead of a single id
    pub shown: String,
}

#[derive(Debug, Default)]
pub struct AnnotationReport {
    /// Labels of the ID columns written
    pub columns: Vec<String>,
    pub unresolved: Vec<Unresolved>,
}

/// ID column label and qualifier for a source column, `None` when it has no ID form
fn target_column(category: Category, label: &str) -> Option<(String, String)> {
    match category {
        Category::Person | Category::Organization => {
            let kind = if category == Category::Person {
                MemberKind::Person
            } else {
                MemberKind::Organization
            };
            let role = Role::from_label(label)?;
            Some((format!("{} ID", label), role.qualifier(kind)))
        }
        Category::Taxon => Some(("Taxon ID".to_string(), "Taxonomy.taxon_id".to_string())),
        Category::Location => Some(("Location ID".to_string(), "Location.location_id".to_string())),
        _ => None,
    }
}

/// Text for one name inside a multi-name id cell
fn part_text(resolution: Option<&Resolution>) -> String {
    match resolution {
        Some(Resolution::Existing(ids)) => {
            let ids: Vec<String> = ids.iter().map(i64::to_string).collect();
            ids.join(" or ")
        }
        Some(Resolution::New) | None => super::dictionary::NEW_MARKER.to_string(),
    }
}

/// Add or overwrite ID columns for every resolvable reference column
///
/// `columns` must describe the sheet as it was read; source columns are not
/// moved, so indices stay valid while ID columns are appended.
pub fn annotate_ids(sheet: &mut Sheet, columns: &ColumnMap, dictionaries: &[ReferenceDictionary]) -> AnnotationReport {
    let mut report = AnnotationReport::default();

    for dictionary in dictionaries {
        let category = dictionary.category;
        let mut single_target_used = false;

        for &source in columns.resolve(category) {
            let label = columns.label(source).to_string();
            let Some((target_label, qualifier)) = target_column(category, &label) else {
                log::warn!("Column '{}' names no Collector/Determinavit/Preparator role, no ID column added", label);
                continue;
            };
            if matches!(category, Category::Taxon | Category::Location) {
                if single_target_used {
                    log::warn!("Only the first {} column gets an ID column, skipping '{}'", category, label);
                    continue;
                }
                single_target_used = true;
            }

            let target = sheet.upsert_column(&target_label, &qualifier);
            for row in 0..sheet.row_count() {
                let Some(text) = sheet.cell(row, source).canonical() else {
                    continue;
                };
                let keys = cell_keys(category, &text);
                if keys.is_empty() {
                    continue;
                }
                let resolutions: Vec<Option<&Resolution>> = keys.iter().map(|k| dictionary.get(k)).collect();
                let ids: Option<Vec<i64>> = resolutions
                    .iter()
                    .map(|r| r.and_then(Resolution::single_id))
                    .collect();

                let value = match ids {
                    Some(ids) if ids.len() == 1 => Value::Int(ids[0]),
                    Some(ids) => {
                        let ids: Vec<String> = ids.iter().map(i64::to_string).collect();
                        Value::from(ids.join(", "))
                    }
                    None => {
                        for (key, resolution) in keys.iter().zip(&resolutions) {
                            if resolution.and_then(Resolution::single_id).is_none() {
                                report.unresolved.push(Unresolved {
                                    row: Sheet::display_row(row),
                                    column: label.clone(),
                                    name: key.clone(),
                                    shown: part_text(*resolution),
                                });
                            }
                        }
                        let parts: Vec<String> = resolutions.iter().map(|r| part_text(*r)).collect();
                        Value::from(parts.join(", "))
                    }
                };
                sheet.set_cell(row, target, value);
            }
            report.columns.push(target_label);
        }
    }

    log::info!(
        "Added {} ID column(s), {} unresolved name(s)",
        report.columns.len(),
        report.unresolved.len()
    );
    report
}
