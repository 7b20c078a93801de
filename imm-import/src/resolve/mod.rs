//! Reference resolution: people, organizations, taxa and locations

mod annotate;
mod dictionary;
mod entities;

pub use annotate::{AnnotationReport, Unresolved, annotate_ids};
pub use dictionary::{NEW_MARKER, ReferenceDictionary, Resolution, tab_layout};
pub use entities::{cell_keys, distinct_keys, resolve_entities};

use crate::discipline::Discipline;
use crate::schema::Category;

/// Reference categories prepared for a discipline
pub fn reference_categories(discipline: Discipline) -> &'static [Category] {
    if discipline.is_history() {
        return &[Category::Location];
    }
    match discipline.area() {
        crate::discipline::Area::Natural => &[Category::Person, Category::Organization, Category::Taxon],
        crate::discipline::Area::Human => &[Category::Person],
    }
}
