//! Persons phase: collector, determinavit and preparator links

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use super::summary::{Phase, PhaseOutcome, PhaseSummary};
use super::{CATALOGUE_QUALIFIER, RowError, begin_phase, finish_phase, find_item, open_row, present, settle_row};
use crate::db::{Database, DbError, fetch_max};
use crate::normalize::split;
use crate::schema::Category;
use crate::schema::tables::{MemberKind, Role, event_table};
use crate::session::ImportSession;
use crate::sheet::Sheet;
use crate::sql::{InsertBuilder, Statement};

/// A link column of the sheet
#[derive(Debug, Clone, Copy)]
struct LinkColumn {
    column: usize,
    role: Role,
    kind: MemberKind,
}

/// Ids in a link cell: any delimiter, and commas, separate them
fn member_ids(text: &str) -> Result<Vec<i64>, String> {
    split(text)
        .into_vec()
        .iter()
        .flat_map(|part| part.split(','))
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<i64>().map_err(|_| format!("'{}' is not an id", part)))
        .collect()
}

pub(super) async fn run(
    db: &dyn Database,
    session: &mut ImportSession,
    sheet: &Sheet,
    cancel: &CancellationToken,
) -> Result<PhaseSummary> {
    let mut summary = PhaseSummary::new(Phase::Persons);
    let area = session.area();
    let links: Vec<LinkColumn> = session
        .columns
        .resolve(Category::PersonLinks)
        .iter()
        .filter_map(|&column| {
            let (role, kind) = Role::from_qualifier(session.columns.qualifier(column))?;
            Some(LinkColumn { column, role, kind })
        })
        .filter(|link| {
            let applies = link.role.applies_to(area);
            if !applies {
                log::warn!("{} links do not apply to {} items, ignoring column", link.role, area.code());
            }
            applies
        })
        .collect();

    if links.is_empty() {
        log::info!("No person link columns");
        return Ok(summary);
    }

    let result = match begin_phase(db, session).await {
        Ok(()) => write_links(db, session, sheet, &links, cancel, &mut summary).await,
        Err(e) => Err(e),
    };
    finish_phase(db, session, summary, result).await
}

async fn write_links(
    db: &dyn Database,
    session: &mut ImportSession,
    sheet: &Sheet,
    links: &[LinkColumn],
    cancel: &CancellationToken,
    summary: &mut PhaseSummary,
) -> Result<PhaseOutcome, DbError> {
    let catalogue = session.columns.find(CATALOGUE_QUALIFIER);

    for row in 0..sheet.row_count() {
        if cancel.is_cancelled() {
            log::warn!("Person links cancelled at row {}", Sheet::display_row(row));
            return Ok(PhaseOutcome::Cancelled);
        }
        if links.iter().all(|link| present(sheet.cell(row, link.column)).is_none()) {
            continue;
        }
        let key = catalogue
            .and_then(|col| present(sheet.cell(row, col)))
            .unwrap_or_default();

        open_row(db, session).await?;
        let result = link_row(db, session, sheet, row, links).await;
        if let Some(outcome) = settle_row(db, session, summary, Sheet::display_row(row), &key, result).await? {
            return Ok(outcome);
        }
    }
    Ok(PhaseOutcome::Completed)
}

async fn link_row(
    db: &dyn Database,
    session: &mut ImportSession,
    sheet: &Sheet,
    row: usize,
    links: &[LinkColumn],
) -> Result<usize, RowError> {
    let mut written = 0;
    for link in links {
        let Some(text) = present(sheet.cell(row, link.column)) else {
            continue;
        };
        let stage = link.role.table();
        let members = member_ids(&text).map_err(|reason| RowError::fail(stage, reason))?;
        let parent = parent_id(db, session, sheet, row, link.role).await?;

        for member in members {
            let seq = session
                .sequences
                .link(db, link.role, parent, link.kind, member)
                .await
                .map_err(|e| RowError::from_db(Phase::Persons, stage, e))?;
            let Some(seq) = seq else {
                log::debug!("{} {} already linked to {} {}", stage, member, link.role.parent_column(), parent);
                continue;
            };

            let mut insert = InsertBuilder::new(stage);
            insert
                .set(link.role.parent_column(), parent)
                .set(&link.role.member_column(link.kind), member)
                .set("seq_num", seq);
            db.execute(&insert.build())
                .await
                .map_err(|e| RowError::from_db(Phase::Persons, stage, e))?;
            written += 1;
        }
    }
    Ok(written)
}

/// Parent key a role's links hang off for this row
async fn parent_id(
    db: &dyn Database,
    session: &mut ImportSession,
    sheet: &Sheet,
    row: usize,
    role: Role,
) -> Result<i64, RowError> {
    let stage = role.table();
    let db_error = |e: DbError| RowError::from_db(Phase::Persons, stage, e);

    match role {
        Role::Collector => {
            let events = event_table(session.area());
            let identifier = session
                .columns
                .find(&events.identifier_qualifier())
                .and_then(|col| present(sheet.cell(row, col)))
                .ok_or_else(|| RowError::fail(stage, "row has no event number"))?;
            session
                .index
                .lookup(db, &events, &identifier)
                .await
                .map_err(db_error)?
                .ok_or_else(|| RowError::fail(stage, format!("event '{}' is not in the database", identifier)))
        }
        Role::Determinavit => {
            if let Some(id) = session.taxonomy_id(row) {
                return Ok(id);
            }
            let item_id = item_id(db, session, sheet, row, stage).await?;
            let statement =
                Statement::new("SELECT MAX(taxonomy_id) FROM Taxonomy WHERE item_id = ?").bind(item_id);
            fetch_max(db, &statement)
                .await
                .map_err(db_error)?
                .ok_or_else(|| RowError::fail(stage, format!("item {} has no taxonomy", item_id)))
        }
        Role::Preparator => item_id(db, session, sheet, row, stage).await,
    }
}

async fn item_id(
    db: &dyn Database,
    session: &ImportSession,
    sheet: &Sheet,
    row: usize,
    stage: &str,
) -> Result<i64, RowError> {
    if let Some(id) = session.item_id(row) {
        return Ok(id);
    }
    let catalogue_num = session
        .columns
        .find(CATALOGUE_QUALIFIER)
        .and_then(|col| present(sheet.cell(row, col)))
        .ok_or_else(|| RowError::fail(stage, "row has no catalogue number"))?;
    find_item(db, &catalogue_num)
        .await
        .map_err(|e| RowError::from_db(Phase::Persons, stage, e))?
        .ok_or_else(|| RowError::fail(stage, format!("no item with catalogue number '{}'", catalogue_num)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::db::testing::{count, fixture_db, seed};
    use crate::discipline::Discipline;
    use crate::sheet::ColumnHeader;
    use crate::sql::SqlDialect;
    use crate::value::Value;

    #[test]
    fn test_member_ids() {
        assert_eq!(member_ids("3, 4; 5"), Ok(vec![3, 4, 5]));
        assert_eq!(member_ids("12"), Ok(vec![12]));
        assert!(member_ids("NEW?, 5 or 6").is_err());
    }

    async fn existing_specimen() -> crate::db::sqlite::SqliteDatabase {
        let db = fixture_db().await;
        seed(
            &db,
            "INSERT INTO Person (person_id, search_name) VALUES (3, 'Meg Sugrue');
             INSERT INTO Person (person_id, search_name) VALUES (4, 'Evan Harley');
             INSERT INTO Organization (organization_id, org_name) VALUES (9, 'Royal BC Museum');
             INSERT INTO Taxon (taxon_id, term, discipline_cd) VALUES (1, 'Mopalia', 'inv');
             INSERT INTO Item (item_id, catalogue_num) VALUES (10, '974-00001');
             INSERT INTO Taxonomy (taxonomy_id, item_id, taxon_id) VALUES (20, 10, 1);
             INSERT INTO Taxonomy (taxonomy_id, item_id, taxon_id) VALUES (21, 10, 1);
             INSERT INTO Determinavit (taxonomy_id, determinavit_pid, seq_num) VALUES (21, 3, 1);",
        )
        .await;
        db
    }

    fn session(sheet: &Sheet) -> ImportSession {
        ImportSession::for_sheet(sheet, Discipline::Inv, &Settings::default(), SqlDialect::Sqlite).unwrap()
    }

    #[tokio::test]
    async fn test_links_for_existing_item_continue_sequence() {
        let db = existing_specimen().await;
        let mut sheet = Sheet::new(
            "IMM_template",
            vec![
                ColumnHeader::new("Item.catalogue_num", "Catalogue Number"),
                ColumnHeader::new("Determinavit.pid", "Determinavit ID"),
                ColumnHeader::new("Determinavit.oid", "Determinavit (Org) ID"),
                ColumnHeader::new("Preparator.pid", "Preparator ID"),
            ],
        );
        sheet.push_row(vec![
            Value::from("974-00001"),
            Value::from("3, 4"),
            Value::Int(9),
            Value::Int(4),
        ]);
        let mut session = session(&sheet);

        let summary = run(&db, &mut session, &sheet, &CancellationToken::new()).await.unwrap();
        assert_eq!(summary.outcome, PhaseOutcome::Completed);
        assert!(summary.failures.is_empty(), "{:?}", summary.failures);

        // Person 3 already determined taxonomy 21; the newest taxonomy is the parent
        let rows = db
            .fetch_all(&Statement::new(
                "SELECT determinavit_pid, determinavit_oid, seq_num FROM Determinavit WHERE taxonomy_id = 21 ORDER BY seq_num",
            ))
            .await
            .unwrap();
        assert_eq!(
            rows,
            vec![
                vec![Value::Int(3), Value::Null, Value::Int(1)],
                vec![Value::Int(4), Value::Null, Value::Int(2)],
                vec![Value::Null, Value::Int(9), Value::Int(3)],
            ]
        );
        assert_eq!(count(&db, "Preparator").await, 1);
    }

    #[tokio::test]
    async fn test_unresolved_parent_fails_row_only() {
        let db = existing_specimen().await;
        let mut sheet = Sheet::new(
            "IMM_template",
            vec![
                ColumnHeader::new("Item.catalogue_num", "Catalogue Number"),
                ColumnHeader::new("CollectionEvent.event_num", "Event Number"),
                ColumnHeader::new("Collector.pid", "Collector ID"),
                ColumnHeader::new("Preparator.pid", "Preparator ID"),
            ],
        );
        sheet.push_row(vec![Value::from("974-00001"), Value::from("IE404"), Value::Int(3), Value::Null]);
        sheet.push_row(vec![Value::from("974-00001"), Value::Null, Value::Null, Value::Int(3)]);
        sheet.push_row(vec![Value::from("974-00002"), Value::Null, Value::Null, Value::from("NEW?")]);
        let mut session = session(&sheet);

        let summary = run(&db, &mut session, &sheet, &CancellationToken::new()).await.unwrap();
        assert_eq!(summary.outcome, PhaseOutcome::Completed);
        assert_eq!(summary.imported, 1);
        let failed: Vec<_> = summary.failures.iter().map(|f| (f.row, f.stage.as_str())).collect();
        assert_eq!(failed, vec![(4, "Collector"), (6, "Preparator")]);
        assert_eq!(count(&db, "Collector").await, 0);
        assert_eq!(count(&db, "Preparator").await, 1);
    }

    #[tokio::test]
    async fn test_collector_links_ignored_for_human_items() {
        let db = fixture_db().await;
        let mut sheet = Sheet::new("IMM_template", vec![ColumnHeader::new("Collector.pid", "Collector ID")]);
        sheet.push_row(vec![Value::Int(3)]);
        let mut session =
            ImportSession::for_sheet(&sheet, Discipline::Ethnolg, &Settings::default(), SqlDialect::Sqlite).unwrap();

        let summary = run(&db, &mut session, &sheet, &CancellationToken::new()).await.unwrap();
        assert_eq!(summary.imported, 0);
        assert_eq!(count(&db, "Collector").await, 0);
    }
}
