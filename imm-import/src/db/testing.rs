//! In-memory SQLite copy of the collections schema for tests

use super::Database;
use super::sqlite::SqliteDatabase;
use crate::sql::Statement;

/// The subset of the collections schema the importer touches
pub const FIXTURE_SCHEMA: &str = r#"
CREATE TABLE Person (person_id INTEGER PRIMARY KEY, search_name TEXT NOT NULL);
CREATE TABLE Organization (organization_id INTEGER PRIMARY KEY, org_name TEXT NOT NULL);
CREATE TABLE Taxon (taxon_id INTEGER PRIMARY KEY, term TEXT NOT NULL, discipline_cd TEXT NOT NULL);
CREATE TABLE ScientificName (taxon_id INTEGER NOT NULL, scientific_name TEXT NOT NULL, discipline_cd TEXT NOT NULL);
CREATE TABLE Location (location_id INTEGER PRIMARY KEY, location_code TEXT NOT NULL);
CREATE TABLE NHDisciplineType (discipline_cd TEXT PRIMARY KEY, geo_site_prefix TEXT, coll_event_prefix TEXT);
CREATE TABLE GeographicSite (
    geo_site_id INTEGER PRIMARY KEY,
    collector_site_id TEXT UNIQUE,
    discipline_cd TEXT,
    site_name TEXT,
    locality TEXT,
    latitude REAL,
    longitude REAL,
    country TEXT
);
CREATE TABLE GeoSiteNote (
    geo_site_id INTEGER NOT NULL REFERENCES GeographicSite(geo_site_id),
    note_date TEXT,
    title TEXT,
    note TEXT
);
CREATE TABLE CollectionEvent (
    coll_event_id INTEGER PRIMARY KEY,
    event_num TEXT UNIQUE,
    discipline_cd TEXT,
    start_date TEXT,
    collection_method TEXT
);
CREATE TABLE GeographicSite_CollectionEvent (
    geo_site_id INTEGER NOT NULL REFERENCES GeographicSite(geo_site_id),
    coll_event_id INTEGER NOT NULL REFERENCES CollectionEvent(coll_event_id),
    PRIMARY KEY (geo_site_id, coll_event_id)
);
CREATE TABLE ArchaeologicalSite (
    site_id INTEGER PRIMARY KEY,
    temporary_num TEXT UNIQUE,
    discipline_cd TEXT,
    site_name TEXT
);
CREATE TABLE ArchaeologicalCollectionEvent (
    event_id INTEGER PRIMARY KEY,
    event_num TEXT UNIQUE,
    discipline_cd TEXT,
    start_date TEXT
);
CREATE TABLE ArchaeologicalSite_Event (
    site_id INTEGER NOT NULL REFERENCES ArchaeologicalSite(site_id),
    event_id INTEGER NOT NULL REFERENCES ArchaeologicalCollectionEvent(event_id),
    PRIMARY KEY (site_id, event_id)
);
CREATE TABLE Item (
    item_id INTEGER PRIMARY KEY,
    catalogue_num TEXT UNIQUE,
    status_cd TEXT,
    area_cd TEXT,
    item_count INTEGER,
    remarks TEXT
);
CREATE TABLE NaturalHistoryItem (
    item_id INTEGER PRIMARY KEY REFERENCES Item(item_id),
    discipline_cd TEXT,
    geo_site_id INTEGER REFERENCES GeographicSite(geo_site_id),
    coll_event_id INTEGER REFERENCES CollectionEvent(coll_event_id),
    habitat TEXT
);
CREATE TABLE HumanHistoryItem (
    item_id INTEGER PRIMARY KEY REFERENCES Item(item_id),
    discipline_cd TEXT,
    object_name TEXT
);
CREATE TABLE InvertebrateItem (
    item_id INTEGER PRIMARY KEY REFERENCES Item(item_id),
    sex TEXT,
    life_stage TEXT
);
CREATE TABLE ArchaeologyItem (
    item_id INTEGER PRIMARY KEY REFERENCES Item(item_id),
    material TEXT
);
CREATE TABLE ModernHistoryItem (item_id INTEGER PRIMARY KEY REFERENCES Item(item_id));
CREATE TABLE Preparation (item_id INTEGER NOT NULL REFERENCES Item(item_id), preparation_type TEXT);
CREATE TABLE ChemicalTreatment (
    item_id INTEGER NOT NULL REFERENCES Item(item_id),
    seq_num INTEGER NOT NULL,
    treatment TEXT,
    PRIMARY KEY (item_id, seq_num)
);
CREATE TABLE Taxonomy (
    taxonomy_id INTEGER PRIMARY KEY,
    item_id INTEGER NOT NULL REFERENCES Item(item_id),
    taxon_id INTEGER REFERENCES Taxon(taxon_id),
    accepted INTEGER,
    cf INTEGER,
    aff INTEGER,
    determination_date TEXT
);
CREATE TABLE FieldMeasurement (item_id INTEGER NOT NULL REFERENCES Item(item_id), measurement TEXT, unit TEXT);
CREATE TABLE OtherNumber (
    item_id INTEGER NOT NULL REFERENCES Item(item_id),
    seq_num INTEGER NOT NULL,
    other_num TEXT,
    PRIMARY KEY (item_id, seq_num)
);
CREATE TABLE ItemLocation (
    item_id INTEGER NOT NULL REFERENCES Item(item_id),
    location_id INTEGER NOT NULL REFERENCES Location(location_id),
    seq_num INTEGER NOT NULL,
    PRIMARY KEY (item_id, seq_num)
);
CREATE TABLE Collector (
    coll_event_id INTEGER NOT NULL REFERENCES CollectionEvent(coll_event_id),
    collector_pid INTEGER REFERENCES Person(person_id),
    collector_oid INTEGER REFERENCES Organization(organization_id),
    seq_num INTEGER NOT NULL,
    PRIMARY KEY (coll_event_id, seq_num)
);
CREATE TABLE Determinavit (
    taxonomy_id INTEGER NOT NULL REFERENCES Taxonomy(taxonomy_id),
    determinavit_pid INTEGER REFERENCES Person(person_id),
    determinavit_oid INTEGER REFERENCES Organization(organization_id),
    seq_num INTEGER NOT NULL,
    PRIMARY KEY (taxonomy_id, seq_num)
);
CREATE TABLE Preparator (
    item_id INTEGER NOT NULL REFERENCES Item(item_id),
    preparator_pid INTEGER REFERENCES Person(person_id),
    preparator_oid INTEGER REFERENCES Organization(organization_id),
    seq_num INTEGER NOT NULL,
    PRIMARY KEY (item_id, seq_num)
);
"#;

/// Fresh in-memory database with the fixture schema
pub async fn fixture_db() -> SqliteDatabase {
    let db = SqliteDatabase::connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite should open");
    seed(&db, FIXTURE_SCHEMA).await;
    db
}

/// Run `;`-separated SQL against the database
pub async fn seed(db: &SqliteDatabase, sql: &str) {
    for statement in sql.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        db.execute(&Statement::new(statement))
            .await
            .unwrap_or_else(|e| panic!("fixture statement failed: {}\n{}", e, statement));
    }
}

/// Count rows of a table, optionally filtered
pub async fn count(db: &SqliteDatabase, table: &str) -> i64 {
    let rows = db
        .fetch_all(&Statement::new(format!("SELECT COUNT(*) FROM {}", table)))
        .await
        .expect("count query should run");
    rows[0][0].as_int().unwrap_or_default()
}
