//! Bulk import of IMM template spreadsheets into the collections database
//!
//! The pipeline has three steps. `prepare` resolves people, organizations,
//! taxa and locations against the database and numbers sites and events.
//! `add-ids` folds the operator's reviewed tabs back into ID columns.
//! `import` writes sites, specimens and person links.

pub mod cli;
pub mod config;
pub mod db;
pub mod dedup;
pub mod discipline;
pub mod import;
pub mod normalize;
pub mod resolve;
pub mod schema;
pub mod session;
pub mod sheet;
pub mod sql;
pub mod value;
