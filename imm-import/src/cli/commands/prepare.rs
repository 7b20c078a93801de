//! `prepare`: resolve references, generate site/event numbers, write the review workbook

use anyhow::{Context, Result};
use colored::*;

use super::default_output;
use crate::cli::PrepareArgs;
use crate::config::Settings;
use crate::db::{self, Database};
use crate::dedup::{generate, series_for, to_tab, write_back};
use crate::discipline::Discipline;
use crate::resolve::{reference_categories, resolve_entities};
use crate::schema::tables::{event_table, site_table};
use crate::session::ImportSession;
use crate::sheet::{Workbook, read_workbook, tabs, write_workbook};

pub async fn handle_prepare_command(args: PrepareArgs, settings: &Settings, discipline: Discipline) -> Result<()> {
    let mut workbook = read_workbook(&args.file, &settings.template_sheet)?;
    let db = db::connect(&settings.database).await?;
    let session = ImportSession::for_sheet(&workbook.template, discipline, settings, db.dialect())?;

    prepare_workbook(db.as_ref(), &session, &mut workbook).await?;

    let output = args.output.unwrap_or_else(|| default_output(&args.file, "prepared"));
    write_workbook(&workbook, &output)?;
    println!("{} {}", "Prepared workbook:".bright_green().bold(), output.display());
    Ok(())
}

/// Add reference tabs and site/event numbers to the workbook
pub async fn prepare_workbook(db: &dyn Database, session: &ImportSession, workbook: &mut Workbook) -> Result<()> {
    for &category in reference_categories(session.discipline) {
        let dictionary = resolve_entities(db, session, &workbook.template, category)
            .await
            .with_context(|| format!("Failed to resolve {} names", category))?;
        println!(
            "{:<14} {} distinct, {} {}",
            category.to_string().cyan(),
            dictionary.len(),
            dictionary.new_count().to_string().yellow(),
            "NEW?".yellow()
        );
        if let Some(tab) = dictionary.to_tab() {
            workbook.set_tab(tab);
        }
    }

    if session.discipline.is_history() {
        return Ok(());
    }

    let area = session.area();
    for (table, tab_name) in [(site_table(area), tabs::SITE), (event_table(area), tabs::EVENT)] {
        if session.columns.find(&table.identifier_qualifier()).is_none() {
            log::warn!("No {} column, {} numbers not generated", table.identifier_qualifier(), tab_name);
            continue;
        }
        let mut series = series_for(db, session, &table).await?;
        let generation = generate(&workbook.template, &session.columns, &table, &mut series)?;
        write_back(&mut workbook.template, &generation);
        workbook.set_tab(to_tab(tab_name, &session.columns, &generation));
        println!(
            "{:<14} {} distinct, {} new",
            tab_name.cyan(),
            generation.entities.len(),
            generation.minted().to_string().green()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::{fixture_db, seed};
    use crate::sheet::{ColumnHeader, Sheet};
    use crate::sql::SqlDialect;
    use crate::value::Value;

    #[tokio::test]
    async fn test_prepare_adds_tabs_and_site_numbers() {
        let db = fixture_db().await;
        seed(
            &db,
            "INSERT INTO NHDisciplineType (discipline_cd, geo_site_prefix, coll_event_prefix) VALUES ('inv', 'IS', 'IE');
             INSERT INTO GeographicSite (geo_site_id, collector_site_id, discipline_cd) VALUES (1, 'IS41', 'inv');
             INSERT INTO Person (person_id, search_name) VALUES (3, 'Meg Sugrue');",
        )
        .await;

        let mut template = Sheet::new(
            "IMM_template",
            vec![
                ColumnHeader::new("Item.catalogue_num", "Catalogue Number"),
                ColumnHeader::new("Person.search_name", "Collector"),
                ColumnHeader::new("GeographicSite.collector_site_id", "Collector's Site ID"),
                ColumnHeader::new("GeographicSite.locality", "Locality"),
                ColumnHeader::new("GeographicSite.latitude", "Latitude"),
            ],
        );
        for (cat, person, locality, lat) in [
            ("974-00001", "Sugrue, Meg", "Victoria: RBCM Collections building", 48.419603),
            ("974-00002", "Dave Stewart", "Victoria: RBCM Collections building", 48.419603),
            ("974-00003", "Meg Sugrue", "Victoria: RBCM Exhibits building", 48.419957),
        ] {
            template.push_row(vec![
                Value::from(cat),
                Value::from(person),
                Value::Null,
                Value::from(locality),
                Value::Float(lat),
            ]);
        }
        let mut workbook = Workbook {
            template,
            tabs: Vec::new(),
        };
        let session = ImportSession::for_sheet(
            &workbook.template,
            Discipline::Inv,
            &Settings::default(),
            SqlDialect::Sqlite,
        )
        .unwrap();

        prepare_workbook(&db, &session, &mut workbook).await.unwrap();

        let sites: Vec<_> = (0..3).map(|row| workbook.template.cell(row, 2).clone()).collect();
        assert_eq!(sites, vec![Value::from("IS42"), Value::from("IS42"), Value::from("IS43")]);

        let people = workbook.tab(tabs::PERSON).unwrap();
        assert_eq!(
            people.rows,
            vec![
                vec![Value::from("Dave Stewart"), Value::from("NEW?")],
                vec![Value::from("Meg Sugrue"), Value::Int(3)],
            ]
        );
        assert_eq!(workbook.tab(tabs::SITE).unwrap().rows.len(), 2);
        assert!(workbook.tab(tabs::EVENT).is_none());
    }
}
