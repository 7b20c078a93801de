//! Declarative destination tables: what each import stage writes and how

use super::category::Category;
use crate::discipline::{Area, Discipline};
use crate::value::Value;

/// Primary key assigned by the importer rather than the database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PrimaryKey {
    pub table: &'static str,
    pub column: &'static str,
}

pub const ITEM: PrimaryKey = PrimaryKey {
    table: "Item",
    column: "item_id",
};
pub const GEOGRAPHIC_SITE: PrimaryKey = PrimaryKey {
    table: "GeographicSite",
    column: "geo_site_id",
};
pub const COLLECTION_EVENT: PrimaryKey = PrimaryKey {
    table: "CollectionEvent",
    column: "coll_event_id",
};
pub const ARCHAEOLOGICAL_SITE: PrimaryKey = PrimaryKey {
    table: "ArchaeologicalSite",
    column: "site_id",
};
pub const ARCHAEOLOGICAL_EVENT: PrimaryKey = PrimaryKey {
    table: "ArchaeologicalCollectionEvent",
    column: "event_id",
};
pub const TAXONOMY: PrimaryKey = PrimaryKey {
    table: "Taxonomy",
    column: "taxonomy_id",
};

/// Tables whose key is an identity column; explicit keys need `IDENTITY_INSERT`
pub const IDENTITY_TABLES: [&str; 5] = [
    "ArchaeologicalSite",
    "ArchaeologicalCollectionEvent",
    "GeographicSite",
    "CollectionEvent",
    "Taxonomy",
];

pub fn is_identity(table: &str) -> bool {
    IDENTITY_TABLES.contains(&table)
}

/// Destination table name, fixed or resolved from the discipline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableName {
    Fixed(&'static str),
    DisciplineItem,
}

impl TableName {
    pub fn resolve(&self, discipline: Discipline) -> String {
        match self {
            TableName::Fixed(name) => name.to_string(),
            TableName::DisciplineItem => discipline.item_table(),
        }
    }
}

/// Literal default written alongside the sheet columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fill {
    Text(&'static str),
    Int(i64),
    DisciplineCode,
    AreaCode,
}

impl Fill {
    pub fn value(&self, discipline: Discipline) -> Value {
        match self {
            Fill::Text(s) => Value::from(*s),
            Fill::Int(i) => Value::Int(*i),
            Fill::DisciplineCode => Value::from(discipline.code()),
            Fill::AreaCode => Value::from(discipline.area().code()),
        }
    }
}

/// When a stage produces a statement for a row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitRule {
    /// Every row
    Always,
    /// Every row, provided the sheet has at least one column of the category
    WhenSheetHasColumns,
    /// Only rows with a non-null value in one of the category's columns
    WhenRowHasValues,
}

/// One stage of the per-row specimen chain
#[derive(Debug, Clone, Copy)]
pub struct TableDescriptor {
    pub table: TableName,
    /// Sheet columns feeding the stage; `None` writes defaults and keys only
    pub category: Option<Category>,
    pub defaults: &'static [(&'static str, Fill)],
    /// Key minted per row in addition to `item_id`
    pub allocated_key: Option<PrimaryKey>,
    /// Per-item sequence column
    pub sequence: Option<&'static str>,
    /// Receives `geo_site_id`/`coll_event_id` from the site/event index
    pub site_event_keys: bool,
    pub emit: EmitRule,
    /// Rewritten in update mode
    pub updatable: bool,
}

impl TableDescriptor {
    const fn stage(table: &'static str, category: Category) -> Self {
        Self {
            table: TableName::Fixed(table),
            category: Some(category),
            defaults: &[],
            allocated_key: None,
            sequence: None,
            site_event_keys: false,
            emit: EmitRule::WhenRowHasValues,
            updatable: false,
        }
    }

    const fn sequenced(self) -> Self {
        Self {
            sequence: Some("seq_num"),
            ..self
        }
    }

    pub fn table_name(&self, discipline: Discipline) -> String {
        self.table.resolve(discipline)
    }
}

const ITEM_STAGE: TableDescriptor = TableDescriptor {
    table: TableName::Fixed("Item"),
    category: Some(Category::Item),
    defaults: &[("status_cd", Fill::Text("catalog")), ("area_cd", Fill::AreaCode)],
    allocated_key: None,
    sequence: None,
    site_event_keys: false,
    emit: EmitRule::Always,
    updatable: true,
};

const NH_ITEM_STAGE: TableDescriptor = TableDescriptor {
    table: TableName::Fixed("NaturalHistoryItem"),
    category: Some(Category::NHItem),
    defaults: &[("discipline_cd", Fill::DisciplineCode)],
    allocated_key: None,
    sequence: None,
    site_event_keys: true,
    emit: EmitRule::Always,
    updatable: true,
};

const HH_ITEM_STAGE: TableDescriptor = TableDescriptor {
    table: TableName::Fixed("HumanHistoryItem"),
    category: Some(Category::HHItem),
    defaults: &[("discipline_cd", Fill::DisciplineCode)],
    allocated_key: None,
    sequence: None,
    site_event_keys: false,
    emit: EmitRule::Always,
    updatable: true,
};

const DISCIPLINE_ITEM_STAGE: TableDescriptor = TableDescriptor {
    table: TableName::DisciplineItem,
    category: Some(Category::DisciplineItem),
    defaults: &[],
    allocated_key: None,
    sequence: None,
    site_event_keys: false,
    emit: EmitRule::WhenSheetHasColumns,
    updatable: true,
};

const MODERN_HISTORY_STAGE: TableDescriptor = TableDescriptor {
    emit: EmitRule::Always,
    ..DISCIPLINE_ITEM_STAGE
};

const TAXONOMY_STAGE: TableDescriptor = TableDescriptor {
    table: TableName::Fixed("Taxonomy"),
    category: Some(Category::Taxonomy),
    defaults: &[("accepted", Fill::Int(1)), ("cf", Fill::Int(0)), ("aff", Fill::Int(0))],
    allocated_key: Some(TAXONOMY),
    sequence: None,
    site_event_keys: false,
    emit: EmitRule::WhenRowHasValues,
    updatable: false,
};

const NATURAL_STAGES: [TableDescriptor; 8] = [
    ITEM_STAGE,
    NH_ITEM_STAGE,
    DISCIPLINE_ITEM_STAGE,
    TableDescriptor::stage("Preparation", Category::Preparation),
    TableDescriptor::stage("ChemicalTreatment", Category::ChemicalTreatment).sequenced(),
    TAXONOMY_STAGE,
    TableDescriptor::stage("FieldMeasurement", Category::FieldMeasurement),
    TableDescriptor::stage("OtherNumber", Category::OtherNumber).sequenced(),
];

const HUMAN_STAGES: [TableDescriptor; 4] = [
    ITEM_STAGE,
    HH_ITEM_STAGE,
    DISCIPLINE_ITEM_STAGE,
    TableDescriptor::stage("OtherNumber", Category::OtherNumber).sequenced(),
];

const HISTORY_STAGES: [TableDescriptor; 4] = [
    ITEM_STAGE,
    HH_ITEM_STAGE,
    MODERN_HISTORY_STAGE,
    TableDescriptor::stage("ItemLocation", Category::ItemLocation).sequenced(),
];

/// Ordered specimen stages for a discipline
pub fn specimen_stages(discipline: Discipline) -> &'static [TableDescriptor] {
    if discipline.is_history() {
        return &HISTORY_STAGES;
    }
    match discipline.area() {
        Area::Natural => &NATURAL_STAGES,
        Area::Human => &HUMAN_STAGES,
    }
}

/// Site or event table family for an area
#[derive(Debug, Clone, Copy)]
pub struct EntityTable {
    pub key: PrimaryKey,
    /// Column holding the spreadsheet identifier (`collector_site_id`, `event_num`, ...)
    pub identifier: &'static str,
    pub category: Category,
}

impl EntityTable {
    /// Qualifier of the identifier column in the template
    pub fn identifier_qualifier(&self) -> String {
        format!("{}.{}", self.key.table, self.identifier)
    }
}

pub fn site_table(area: Area) -> EntityTable {
    match area {
        Area::Natural => EntityTable {
            key: GEOGRAPHIC_SITE,
            identifier: "collector_site_id",
            category: Category::Sites,
        },
        Area::Human => EntityTable {
            key: ARCHAEOLOGICAL_SITE,
            identifier: "temporary_num",
            category: Category::Sites,
        },
    }
}

pub fn event_table(area: Area) -> EntityTable {
    match area {
        Area::Natural => EntityTable {
            key: COLLECTION_EVENT,
            identifier: "event_num",
            category: Category::Events,
        },
        Area::Human => EntityTable {
            key: ARCHAEOLOGICAL_EVENT,
            identifier: "event_num",
            category: Category::Events,
        },
    }
}

/// Site-event link table and its two key columns
pub fn link_table(area: Area) -> (&'static str, &'static str, &'static str) {
    match area {
        Area::Natural => ("GeographicSite_CollectionEvent", "geo_site_id", "coll_event_id"),
        Area::Human => ("ArchaeologicalSite_Event", "site_id", "event_id"),
    }
}

/// Person/organization link role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    Collector,
    Determinavit,
    Preparator,
}

/// Whether a link points at a person or an organization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MemberKind {
    Person,
    Organization,
}

impl MemberKind {
    /// Qualifier suffix: `pid` or `oid`
    pub fn suffix(&self) -> &'static str {
        match self {
            MemberKind::Person => "pid",
            MemberKind::Organization => "oid",
        }
    }
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Collector, Role::Determinavit, Role::Preparator];

    /// Link table, also the qualifier table prefix
    pub fn table(&self) -> &'static str {
        match self {
            Role::Collector => "Collector",
            Role::Determinavit => "Determinavit",
            Role::Preparator => "Preparator",
        }
    }

    /// Parent key column of the link table
    pub fn parent_column(&self) -> &'static str {
        match self {
            Role::Collector => "coll_event_id",
            Role::Determinavit => "taxonomy_id",
            Role::Preparator => "item_id",
        }
    }

    /// Column holding the linked person or organization id
    pub fn member_column(&self, kind: MemberKind) -> String {
        format!("{}_{}", self.table().to_ascii_lowercase(), kind.suffix())
    }

    /// Collector and Determinavit links only exist for natural-history items
    pub fn applies_to(&self, area: Area) -> bool {
        match self {
            Role::Collector | Role::Determinavit => area == Area::Natural,
            Role::Preparator => true,
        }
    }

    /// Role named by a column label, e.g. `Collector 2` or `Preparator (Org)`
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim_start();
        Self::ALL.into_iter().find(|r| label.starts_with(r.table()))
    }

    /// Parse a link qualifier such as `Collector.pid`
    pub fn from_qualifier(qualifier: &str) -> Option<(Self, MemberKind)> {
        let (table, column) = qualifier.split_once('.')?;
        let role = Self::ALL.into_iter().find(|r| r.table() == table)?;
        let kind = match column {
            "pid" => MemberKind::Person,
            "oid" => MemberKind::Organization,
            _ => return None,
        };
        Some((role, kind))
    }

    pub fn qualifier(&self, kind: MemberKind) -> String {
        format!("{}.{}", self.table(), kind.suffix())
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.table())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(discipline: Discipline) -> Vec<String> {
        specimen_stages(discipline)
            .iter()
            .map(|s| s.table_name(discipline))
            .collect()
    }

    #[test]
    fn test_natural_stage_order() {
        assert_eq!(
            names(Discipline::Inv),
            vec![
                "Item",
                "NaturalHistoryItem",
                "InvertebrateItem",
                "Preparation",
                "ChemicalTreatment",
                "Taxonomy",
                "FieldMeasurement",
                "OtherNumber"
            ]
        );
    }

    #[test]
    fn test_human_and_history_stage_order() {
        assert_eq!(
            names(Discipline::Archeolg),
            vec!["Item", "HumanHistoryItem", "ArchaeologyItem", "OtherNumber"]
        );
        assert_eq!(
            names(Discipline::History),
            vec!["Item", "HumanHistoryItem", "ModernHistoryItem", "ItemLocation"]
        );
        assert_eq!(specimen_stages(Discipline::History)[2].emit, EmitRule::Always);
    }

    #[test]
    fn test_defaults() {
        let item = &specimen_stages(Discipline::Ethnolg)[0];
        let values: Vec<_> = item
            .defaults
            .iter()
            .map(|(col, fill)| (*col, fill.value(Discipline::Ethnolg)))
            .collect();
        assert_eq!(
            values,
            vec![("status_cd", Value::from("catalog")), ("area_cd", Value::from("human"))]
        );
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!(
            Role::from_qualifier("Determinavit.oid"),
            Some((Role::Determinavit, MemberKind::Organization))
        );
        assert_eq!(Role::from_qualifier("Collector.seq_num"), None);
        assert_eq!(Role::from_label("Collector 2"), Some(Role::Collector));
        assert_eq!(Role::from_label("Site Name"), None);
        assert_eq!(Role::Preparator.member_column(MemberKind::Person), "preparator_pid");
        assert!(!Role::Collector.applies_to(Area::Human));
        assert!(Role::Preparator.applies_to(Area::Human));
    }

    #[test]
    fn test_entity_tables() {
        assert_eq!(
            site_table(Area::Human).identifier_qualifier(),
            "ArchaeologicalSite.temporary_num"
        );
        assert_eq!(event_table(Area::Natural).key, COLLECTION_EVENT);
        assert!(is_identity("Taxonomy"));
        assert!(!is_identity("Item"));
    }
}
