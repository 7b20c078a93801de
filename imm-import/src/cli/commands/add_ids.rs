//! `add-ids`: merge the reviewed reference tabs into ID columns

use anyhow::Result;
use colored::*;

use super::default_output;
use crate::cli::AddIdsArgs;
use crate::config::Settings;
use crate::discipline::Discipline;
use crate::resolve::{AnnotationReport, ReferenceDictionary, annotate_ids, reference_categories, tab_layout};
use crate::schema::ColumnMap;
use crate::sheet::{Workbook, read_workbook, write_workbook};

pub fn handle_add_ids_command(args: AddIdsArgs, settings: &Settings, discipline: Discipline) -> Result<()> {
    let mut workbook = read_workbook(&args.file, &settings.template_sheet)?;
    let report = add_ids(&mut workbook, discipline)?;

    for column in &report.columns {
        println!("{} {}", "Filled".bright_green(), column);
    }
    if !report.unresolved.is_empty() {
        println!(
            "{}",
            format!("{} name(s) still need an id:", report.unresolved.len()).yellow().bold()
        );
        for u in &report.unresolved {
            println!("  row {} {}: {} ({})", u.row, u.column, u.name.bold(), u.shown.dimmed());
        }
    }

    let output = args.output.unwrap_or_else(|| default_output(&args.file, "ids"));
    write_workbook(&workbook, &output)?;
    println!("{} {}", "Annotated workbook:".bright_green().bold(), output.display());
    Ok(())
}

/// Read the discipline's reference tabs and write ID columns into the template
pub fn add_ids(workbook: &mut Workbook, discipline: Discipline) -> Result<AnnotationReport> {
    let columns = ColumnMap::build(&workbook.template.headers, discipline)?;

    let mut dictionaries = Vec::new();
    for &category in reference_categories(discipline) {
        let Some((tab_name, _, _)) = tab_layout(category) else {
            continue;
        };
        match workbook.tab(tab_name) {
            Some(tab) => dictionaries.push(ReferenceDictionary::from_tab(category, tab)),
            None => log::warn!("No {} tab, {} ID columns left as they are", tab_name, category),
        }
    }

    Ok(annotate_ids(&mut workbook.template, &columns, &dictionaries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::{ColumnHeader, Sheet, Tab, tabs};
    use crate::value::Value;

    #[test]
    fn test_add_ids_from_reviewed_tab() {
        let mut template = Sheet::new(
            "IMM_template",
            vec![
                ColumnHeader::new("Item.catalogue_num", "Catalogue Number"),
                ColumnHeader::new("Person.search_name", "Preparator"),
            ],
        );
        template.push_row(vec![Value::from("974-00001"), Value::from("Dave Stewart")]);
        let mut people = Tab::new(tabs::PERSON, vec!["Name".into(), "person_id".into()]);
        // Operator replaced NEW? with the id they created
        people.rows.push(vec![Value::from("Dave Stewart"), Value::Int(11)]);
        let mut workbook = Workbook {
            template,
            tabs: vec![people],
        };

        let report = add_ids(&mut workbook, Discipline::Archeolg).unwrap();
        assert!(report.unresolved.is_empty());
        let col = workbook.template.column_by_qualifier("Preparator.pid").unwrap();
        assert_eq!(workbook.template.cell(0, col), &Value::Int(11));
    }
}
