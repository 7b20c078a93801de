//! `columns`: show the category classification of a template

use anyhow::{Context, Result};
use colored::*;
use serde::Serialize;

use crate::cli::ColumnsArgs;
use crate::config::Settings;
use crate::discipline::Discipline;
use crate::schema::{ColumnMap, SchemaError};
use crate::sheet::{column_letter, read_workbook};

#[derive(Debug, Serialize)]
struct ColumnEntry {
    column: String,
    label: String,
    qualifier: String,
}

#[derive(Debug, Serialize)]
struct CategoryColumns {
    category: String,
    columns: Vec<ColumnEntry>,
}

fn classification(columns: &ColumnMap) -> Vec<CategoryColumns> {
    columns
        .summary()
        .into_iter()
        .map(|(category, cols)| CategoryColumns {
            category: category.to_string(),
            columns: cols
                .into_iter()
                .map(|col| ColumnEntry {
                    column: column_letter(col),
                    label: columns.label(col).to_string(),
                    qualifier: columns.qualifier(col).to_string(),
                })
                .collect(),
        })
        .collect()
}

pub fn handle_columns_command(args: ColumnsArgs, settings: &Settings, discipline: Discipline) -> Result<()> {
    let workbook = read_workbook(&args.file, &settings.template_sheet)?;

    let columns = match ColumnMap::build(&workbook.template.headers, discipline) {
        Ok(columns) => columns,
        Err(SchemaError::Columns(mismatches)) => {
            println!("{}", "Unrecognised columns:".red().bold());
            for m in &mismatches {
                println!(
                    "  {} {} [{}]",
                    column_letter(m.column).yellow(),
                    m.label,
                    m.qualifier.dimmed()
                );
            }
            anyhow::bail!(
                "{} column(s) of {} do not match the {} template",
                mismatches.len(),
                args.file.display(),
                discipline.full_name()
            );
        }
        Err(e) => return Err(e.into()),
    };

    let categories = classification(&columns);
    if args.json {
        let json = serde_json::to_string_pretty(&categories).context("Failed to serialize column classification")?;
        println!("{}", json);
        return Ok(());
    }

    println!(
        "{} columns, {} data rows ({})",
        columns.len().to_string().bold(),
        workbook.template.row_count(),
        discipline.full_name().cyan()
    );
    for category in &categories {
        println!("{}", category.category.bright_green().bold());
        for entry in &category.columns {
            println!("  {:>3}  {:<32} {}", entry.column, entry.label, entry.qualifier.dimmed());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::ColumnHeader;

    #[test]
    fn test_classification_lists_columns_per_category() {
        let headers = vec![
            ColumnHeader::new("Item.catalogue_num", "Catalogue Number"),
            ColumnHeader::new("GeoSiteNote.note", "Site Note"),
        ];
        let columns = ColumnMap::build(&headers, Discipline::Inv).unwrap();
        let categories = classification(&columns);

        let names: Vec<_> = categories.iter().map(|c| c.category.as_str()).collect();
        assert_eq!(names, vec!["Sites", "GeoSiteNote", "Item"]);
        assert_eq!(categories[2].columns[0].column, "A");

        let json = serde_json::to_value(&categories).unwrap();
        assert_eq!(json[0]["columns"][0]["qualifier"], "GeoSiteNote.note");
    }
}
