//! Per-parent sequence numbers for link and repeating-row tables

use std::collections::{HashMap, HashSet};

use crate::db::{Database, DbError, fetch_max};
use crate::schema::tables::{MemberKind, Role};
use crate::sql::Statement;

#[derive(Debug, Default)]
struct LinkSet {
    members: HashSet<(MemberKind, i64)>,
    max_seq: i64,
}

#[derive(Debug)]
enum Undo {
    Link {
        role: Role,
        parent: i64,
        member: (MemberKind, i64),
        prev_seq: i64,
    },
    Row {
        table: String,
        item_id: i64,
        prev_seq: i64,
    },
}

/// Sequence numbers keyed by (table, parent id)
///
/// Existing rows are loaded from the database the first time a parent is
/// seen, then numbering continues in memory. Changes made while a row is
/// open are journaled so a rolled-back row leaves no gap.
#[derive(Debug, Default)]
pub struct SequenceTracker {
    links: HashMap<(Role, i64), LinkSet>,
    rows: HashMap<(String, i64), i64>,
    journal: Vec<Undo>,
}

impl SequenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    async fn load_links(&mut self, db: &dyn Database, role: Role, parent: i64) -> Result<(), DbError> {
        if self.links.contains_key(&(role, parent)) {
            return Ok(());
        }
        let statement = Statement::new(format!(
            "SELECT {}, {}, seq_num FROM {} WHERE {} = ?",
            role.member_column(MemberKind::Person),
            role.member_column(MemberKind::Organization),
            role.table(),
            role.parent_column()
        ))
        .bind(parent);

        let mut set = LinkSet::default();
        for row in db.fetch_all(&statement).await? {
            let cell = |i: usize| row.get(i).and_then(|v| v.as_int());
            if let Some(pid) = cell(0) {
                set.members.insert((MemberKind::Person, pid));
            }
            if let Some(oid) = cell(1) {
                set.members.insert((MemberKind::Organization, oid));
            }
            set.max_seq = set.max_seq.max(cell(2).unwrap_or(0));
        }
        log::debug!(
            "Loaded {} existing {} link(s) for {} {}",
            set.members.len(),
            role,
            role.parent_column(),
            parent
        );
        self.links.insert((role, parent), set);
        Ok(())
    }

    /// Sequence number for a new link, or `None` when the parent already has it
    pub async fn link(
        &mut self,
        db: &dyn Database,
        role: Role,
        parent: i64,
        kind: MemberKind,
        member: i64,
    ) -> Result<Option<i64>, DbError> {
        self.load_links(db, role, parent).await?;
        let Some(set) = self.links.get_mut(&(role, parent)) else {
            return Ok(None);
        };
        if set.members.contains(&(kind, member)) {
            return Ok(None);
        }
        let prev_seq = set.max_seq;
        set.max_seq += 1;
        set.members.insert((kind, member));
        self.journal.push(Undo::Link {
            role,
            parent,
            member: (kind, member),
            prev_seq,
        });
        Ok(Some(prev_seq + 1))
    }

    /// Next `seq_num` of a repeating per-item table such as `OtherNumber`
    pub async fn next_row(&mut self, db: &dyn Database, table: &str, item_id: i64) -> Result<i64, DbError> {
        let key = (table.to_string(), item_id);
        let current = match self.rows.get(&key) {
            Some(seq) => *seq,
            None => {
                let statement =
                    Statement::new(format!("SELECT MAX(seq_num) FROM {} WHERE item_id = ?", table)).bind(item_id);
                fetch_max(db, &statement).await?.unwrap_or(0)
            }
        };
        self.rows.insert(key, current + 1);
        self.journal.push(Undo::Row {
            table: table.to_string(),
            item_id,
            prev_seq: current,
        });
        Ok(current + 1)
    }

    /// Start journaling a row
    pub fn begin_row(&mut self) {
        self.journal.clear();
    }

    /// Keep everything assigned since `begin_row`
    pub fn commit_row(&mut self) {
        self.journal.clear();
    }

    /// Undo everything assigned since `begin_row`
    pub fn rollback_row(&mut self) {
        while let Some(undo) = self.journal.pop() {
            match undo {
                Undo::Link {
                    role,
                    parent,
                    member,
                    prev_seq,
                } => {
                    if let Some(set) = self.links.get_mut(&(role, parent)) {
                        set.members.remove(&member);
                        set.max_seq = prev_seq;
                    }
                }
                Undo::Row {
                    table,
                    item_id,
                    prev_seq,
                } => {
                    self.rows.insert((table, item_id), prev_seq);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::{fixture_db, seed};

    const EXISTING: &str = "
        INSERT INTO Person (person_id, search_name) VALUES (3, 'Meg Sugrue');
        INSERT INTO Person (person_id, search_name) VALUES (4, 'Evan Harley');
        INSERT INTO Person (person_id, search_name) VALUES (5, 'Hugh MacIntosh');
        INSERT INTO CollectionEvent (coll_event_id, event_num) VALUES (10, 'INV2018-1');
        INSERT INTO Collector (coll_event_id, collector_pid, seq_num) VALUES (10, 3, 1);
    ";

    #[tokio::test]
    async fn test_links_continue_after_existing() {
        let db = fixture_db().await;
        seed(&db, EXISTING).await;
        let mut tracker = SequenceTracker::new();

        let existing = tracker.link(&db, Role::Collector, 10, MemberKind::Person, 3).await.unwrap();
        assert_eq!(existing, None);
        let next = tracker.link(&db, Role::Collector, 10, MemberKind::Person, 4).await.unwrap();
        assert_eq!(next, Some(2));
        let again = tracker.link(&db, Role::Collector, 10, MemberKind::Person, 4).await.unwrap();
        assert_eq!(again, None);
        let org = tracker.link(&db, Role::Collector, 10, MemberKind::Organization, 4).await.unwrap();
        assert_eq!(org, Some(3));
    }

    #[tokio::test]
    async fn test_rollback_leaves_no_gap() {
        let db = fixture_db().await;
        seed(&db, EXISTING).await;
        let mut tracker = SequenceTracker::new();

        tracker.begin_row();
        assert_eq!(tracker.link(&db, Role::Collector, 10, MemberKind::Person, 4).await.unwrap(), Some(2));
        tracker.rollback_row();

        tracker.begin_row();
        assert_eq!(tracker.link(&db, Role::Collector, 10, MemberKind::Person, 5).await.unwrap(), Some(2));
        assert_eq!(tracker.link(&db, Role::Collector, 10, MemberKind::Person, 4).await.unwrap(), Some(3));
        tracker.commit_row();
    }

    #[tokio::test]
    async fn test_row_sequences_per_item() {
        let db = fixture_db().await;
        seed(
            &db,
            "INSERT INTO Item (item_id, catalogue_num) VALUES (7, '974-00001');
             INSERT INTO OtherNumber (item_id, seq_num, other_num) VALUES (7, 1, 'A-1');",
        )
        .await;
        let mut tracker = SequenceTracker::new();
        assert_eq!(tracker.next_row(&db, "OtherNumber", 7).await.unwrap(), 2);
        assert_eq!(tracker.next_row(&db, "OtherNumber", 7).await.unwrap(), 3);
        assert_eq!(tracker.next_row(&db, "OtherNumber", 8).await.unwrap(), 1);
        assert_eq!(tracker.next_row(&db, "ChemicalTreatment", 7).await.unwrap(), 1);
    }
}
