//! Database lookups turning names in the sheet into existing record ids

use std::collections::BTreeSet;

use anyhow::{Result, bail};
use futures::stream::{self, StreamExt};

use super::dictionary::{ReferenceDictionary, Resolution};
use crate::db::{Database, fetch_ids};
use crate::discipline::Discipline;
use crate::normalize::{lookup_key, split};
use crate::schema::{Category, ColumnMap};
use crate::session::ImportSession;
use crate::sheet::Sheet;
use crate::sql::Statement;

/// Dictionary key(s) for one cell of a category column
///
/// Person and organization cells may hold several names; taxa and location
/// codes are taken whole.
pub fn cell_keys(category: Category, text: &str) -> Vec<String> {
    match category {
        Category::Person | Category::Organization => split(text)
            .into_vec()
            .iter()
            .map(|name| lookup_key(name))
            .filter(|key| !key.is_empty())
            .collect(),
        _ => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                Vec::new()
            } else {
                vec![trimmed.to_string()]
            }
        }
    }
}

/// Distinct keys across every column of a category
pub fn distinct_keys(sheet: &Sheet, columns: &ColumnMap, category: Category) -> BTreeSet<String> {
    let mut keys = BTreeSet::new();
    for &col in columns.resolve(category) {
        for row in 0..sheet.row_count() {
            if let Some(text) = sheet.cell(row, col).canonical() {
                keys.extend(cell_keys(category, &text));
            }
        }
    }
    keys
}

/// `sp.`/`spp.` names and bare genera resolve on the genus term
fn is_genus_lookup(name: &str) -> bool {
    let name = name.trim();
    name.ends_with(" sp.") || name.ends_with(" spp.") || !name.contains(char::is_whitespace)
}

fn lookup_statement(category: Category, key: &str, discipline: Discipline) -> Option<Statement> {
    let statement = match category {
        Category::Person => Statement::new("SELECT person_id FROM Person WHERE search_name = ?").bind(key),
        Category::Organization => {
            Statement::new("SELECT organization_id FROM Organization WHERE org_name = ?").bind(key)
        }
        Category::Taxon if is_genus_lookup(key) => {
            let genus = key.split_whitespace().next().unwrap_or(key);
            Statement::new("SELECT taxon_id FROM Taxon WHERE term = ? AND discipline_cd = ?")
                .bind(genus)
                .bind(discipline.code())
        }
        Category::Taxon => {
            Statement::new("SELECT taxon_id FROM ScientificName WHERE scientific_name = ? AND discipline_cd = ?")
                .bind(key)
                .bind(discipline.code())
        }
        Category::Location => {
            Statement::new("SELECT location_id FROM Location WHERE location_code = ?").bind(key)
        }
        _ => return None,
    };
    Some(statement)
}

/// Look every distinct name of a category up in the database
///
/// Lookups run concurrently up to the session's limit; the result does not
/// depend on the order in which they complete.
pub async fn resolve_entities(
    db: &dyn Database,
    session: &ImportSession,
    sheet: &Sheet,
    category: Category,
) -> Result<ReferenceDictionary> {
    if !matches!(
        category,
        Category::Person | Category::Organization | Category::Taxon | Category::Location
    ) {
        bail!("{} is not a reference category", category);
    }

    let keys = distinct_keys(sheet, &session.columns, category);
    log::info!("Resolving {} distinct {} value(s)", keys.len(), category);

    let discipline = session.discipline;
    let results: Vec<_> = stream::iter(keys)
        .map(|key| async move {
            let ids = match lookup_statement(category, &key, discipline) {
                Some(statement) => fetch_ids(db, &statement).await,
                None => Ok(Vec::new()),
            };
            (key, ids)
        })
        .buffer_unordered(session.concurrency)
        .collect()
        .await;

    let mut dictionary = ReferenceDictionary::new(category);
    for (key, ids) in results {
        let ids = ids?;
        let resolution = if ids.is_empty() {
            log::info!("{} '{}' not found in database", category, key);
            Resolution::New
        } else {
            log::debug!("{} '{}' found: {:?}", category, key, ids);
            Resolution::Existing(ids)
        };
        dictionary.insert(key, resolution);
    }

    log::info!(
        "{}: {} resolved, {} new",
        category,
        dictionary.len() - dictionary.new_count(),
        dictionary.new_count()
    );
    Ok(dictionary)
}
