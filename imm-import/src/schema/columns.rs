//! Column map: header qualifiers classified into categories once per session

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use super::category::{Category, DISCIPLINE_PLACEHOLDER};
use crate::discipline::Discipline;
use crate::sheet::{ColumnHeader, column_letter};

static QUALIFIER_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\[DISCIPLINE\]|[A-Za-z_][A-Za-z0-9_]*)\.[A-Za-z_][A-Za-z0-9_]*$")
        .expect("qualifier pattern is valid")
});

/// Why a column was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MismatchReason {
    /// Labelled column without a qualifier
    MissingQualifier,
    /// Not of the form `Table.column`
    Malformed,
    /// Well-formed but claimed by no category
    Unclaimed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMismatch {
    pub column: usize,
    pub label: String,
    pub qualifier: String,
    pub reason: MismatchReason,
}

/// Template does not match the configured category table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    Columns(Vec<ColumnMismatch>),
    /// A column the operation depends on is absent
    MissingColumn { qualifier: String },
}

impl std::fmt::Display for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaError::Columns(mismatches) => {
                writeln!(
                    f,
                    "Template columns do not match the expected layout ({} column(s)); check the template version:",
                    mismatches.len()
                )?;
                for m in mismatches {
                    let reason = match m.reason {
                        MismatchReason::MissingQualifier => "no qualifier in row 2",
                        MismatchReason::Malformed => "qualifier is not Table.column",
                        MismatchReason::Unclaimed => "qualifier belongs to no known table for this discipline",
                    };
                    writeln!(
                        f,
                        "  column {} '{}' [{}]: {}",
                        column_letter(m.column),
                        m.label,
                        m.qualifier,
                        reason
                    )?;
                }
                Ok(())
            }
            SchemaError::MissingColumn { qualifier } => {
                write!(f, "Template has no column with qualifier '{}'", qualifier)
            }
        }
    }
}

impl std::error::Error for SchemaError {}

/// Category -> sorted column indices, plus resolved qualifiers
#[derive(Debug, Clone)]
pub struct ColumnMap {
    qualifiers: Vec<String>,
    labels: Vec<String>,
    by_category: HashMap<Category, Vec<usize>>,
}

impl ColumnMap {
    /// Classify every header, substituting the discipline item table for `[DISCIPLINE]`
    ///
    /// Fails when any labelled or qualified column cannot be classified.
    pub fn build(headers: &[ColumnHeader], discipline: Discipline) -> Result<Self, SchemaError> {
        let item_table = discipline.item_table();
        let substitute = |s: &str| s.replace(DISCIPLINE_PLACEHOLDER, &item_table);

        let qualifiers: Vec<String> = headers.iter().map(|h| substitute(h.qualifier.trim())).collect();
        let labels: Vec<String> = headers.iter().map(|h| h.label.trim().to_string()).collect();

        let prefixes: Vec<(Category, Vec<String>)> = Category::ALL
            .iter()
            .map(|c| (*c, c.prefixes().iter().map(|p| substitute(p)).collect()))
            .collect();

        let mut by_category: HashMap<Category, Vec<usize>> = HashMap::new();
        let mut mismatches = Vec::new();

        for (col, qualifier) in qualifiers.iter().enumerate() {
            let raw = headers[col].qualifier.trim();
            if qualifier.is_empty() {
                if !labels[col].is_empty() {
                    mismatches.push(mismatch(col, &labels[col], raw, MismatchReason::MissingQualifier));
                }
                continue;
            }
            if !QUALIFIER_PATTERN.is_match(raw) {
                mismatches.push(mismatch(col, &labels[col], raw, MismatchReason::Malformed));
                continue;
            }

            let mut claimed = false;
            for (category, accepted) in &prefixes {
                if accepted.iter().any(|p| qualifier.starts_with(p.as_str())) {
                    by_category.entry(*category).or_default().push(col);
                    claimed = true;
                }
            }
            if !claimed {
                mismatches.push(mismatch(col, &labels[col], raw, MismatchReason::Unclaimed));
            }
        }

        if !mismatches.is_empty() {
            return Err(SchemaError::Columns(mismatches));
        }

        if let Some(ignored) = by_category.get(&Category::HistoryLinks) {
            let names: Vec<&str> = ignored.iter().map(|&col| labels[col].as_str()).collect();
            log::warn!(
                "{} maker/artist/technique/material column(s) will not be imported: {}",
                ignored.len(),
                names.join(", ")
            );
        }

        log::debug!(
            "Classified {} columns into {} categories",
            qualifiers.len(),
            by_category.len()
        );

        Ok(Self {
            qualifiers,
            labels,
            by_category,
        })
    }

    /// Columns of a category in ascending order; empty when none match
    pub fn resolve(&self, category: Category) -> &[usize] {
        self.by_category
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.qualifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.qualifiers.is_empty()
    }

    /// Resolved qualifier of a column
    pub fn qualifier(&self, col: usize) -> &str {
        self.qualifiers.get(col).map(String::as_str).unwrap_or("")
    }

    pub fn label(&self, col: usize) -> &str {
        self.labels.get(col).map(String::as_str).unwrap_or("")
    }

    /// Destination column: the qualifier with its table prefix stripped
    pub fn destination_column(&self, col: usize) -> &str {
        let qualifier = self.qualifier(col);
        match qualifier.find('.') {
            Some(dot) => &qualifier[dot + 1..],
            None => qualifier,
        }
    }

    /// Destination table of a column
    pub fn table(&self, col: usize) -> &str {
        let qualifier = self.qualifier(col);
        qualifier.split('.').next().unwrap_or("")
    }

    pub fn find(&self, qualifier: &str) -> Option<usize> {
        self.qualifiers.iter().position(|q| q == qualifier)
    }

    /// Like [`ColumnMap::find`] but a missing column is a schema error
    pub fn require(&self, qualifier: &str) -> Result<usize, SchemaError> {
        self.find(qualifier).ok_or_else(|| SchemaError::MissingColumn {
            qualifier: qualifier.to_string(),
        })
    }

    /// Categories present in the sheet with their columns, for diagnostics
    pub fn summary(&self) -> Vec<(Category, Vec<usize>)> {
        Category::ALL
            .iter()
            .filter_map(|c| self.by_category.get(c).map(|cols| (*c, cols.clone())))
            .collect()
    }
}

fn mismatch(column: usize, label: &str, qualifier: &str, reason: MismatchReason) -> ColumnMismatch {
    ColumnMismatch {
        column,
        label: label.to_string(),
        qualifier: qualifier.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(qualifiers: &[(&str, &str)]) -> Vec<ColumnHeader> {
        qualifiers.iter().map(|(q, l)| ColumnHeader::new(q, l)).collect()
    }

    #[test]
    fn test_resolve_sorted_and_shared() {
        let map = ColumnMap::build(
            &headers(&[
                ("Item.catalogue_num", "Catalogue Number"),
                ("GeographicSite.collector_site_id", "Collector's Site ID"),
                ("GeoSiteNote.note", "Site Note"),
                ("GeographicSite.site_name", "Site Name"),
            ]),
            Discipline::Inv,
        )
        .unwrap();

        assert_eq!(map.resolve(Category::Item), &[0]);
        assert_eq!(map.resolve(Category::Sites), &[1, 2, 3]);
        assert_eq!(map.resolve(Category::SiteImport), &[1, 3]);
        assert_eq!(map.resolve(Category::GeoSiteNote), &[2]);
        assert!(map.resolve(Category::Organization).is_empty());
    }

    #[test]
    fn test_discipline_placeholder_substituted() {
        let map = ColumnMap::build(
            &headers(&[("[DISCIPLINE].sex", "Sex"), ("InvertebrateItem.life_stage", "Life Stage")]),
            Discipline::Inv,
        )
        .unwrap();
        assert_eq!(map.resolve(Category::DisciplineItem), &[0, 1]);
        assert_eq!(map.qualifier(0), "InvertebrateItem.sex");
        assert_eq!(map.destination_column(0), "sex");
        assert_eq!(map.table(1), "InvertebrateItem");
    }

    #[test]
    fn test_wrong_discipline_is_rejected() {
        let err = ColumnMap::build(&headers(&[("InvertebrateItem.sex", "Sex")]), Discipline::Bot).unwrap_err();
        match err {
            SchemaError::Columns(mismatches) => {
                assert_eq!(mismatches.len(), 1);
                assert_eq!(mismatches[0].reason, MismatchReason::Unclaimed);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_malformed_and_missing_qualifiers() {
        let err = ColumnMap::build(
            &headers(&[("Item catalogue", "Catalogue"), ("", "Notes"), ("", "")]),
            Discipline::Inv,
        )
        .unwrap_err();
        let SchemaError::Columns(mismatches) = err else {
            panic!("expected column mismatches");
        };
        let reasons: Vec<_> = mismatches.iter().map(|m| m.reason.clone()).collect();
        assert_eq!(reasons, vec![MismatchReason::Malformed, MismatchReason::MissingQualifier]);
        assert!(SchemaError::Columns(mismatches).to_string().contains("column A 'Catalogue'"));
    }

    #[test]
    fn test_role_links_and_location_ids() {
        let map = ColumnMap::build(
            &headers(&[
                ("Collector.pid", "Collector ID"),
                ("Preparator.oid", "Preparator Organization ID"),
                ("Location.location_id", "Location ID"),
                ("Location.location_cd", "Location Code"),
            ]),
            Discipline::History,
        )
        .unwrap();
        assert_eq!(map.resolve(Category::PersonLinks), &[0, 1]);
        assert_eq!(map.resolve(Category::ItemLocation), &[2]);
        assert_eq!(map.resolve(Category::Location), &[3]);
    }

    #[test]
    fn test_history_link_columns_are_claimed() {
        let map = ColumnMap::build(
            &headers(&[
                ("Item.catalogue_num", "Catalogue Number"),
                ("MakerOrganization.org_name", "Maker"),
                ("Artist.search_name", "Artist"),
                ("Technique.technique_cd", "Technique"),
                ("Material.material_cd", "Material"),
            ]),
            Discipline::Ethnolg,
        )
        .unwrap();
        assert_eq!(map.resolve(Category::HistoryLinks), &[1, 2, 3, 4]);
        assert!(map.resolve(Category::Person).is_empty());
        assert!(map.resolve(Category::Organization).is_empty());
    }

    #[test]
    fn test_require_missing_column() {
        let map = ColumnMap::build(&headers(&[("Item.catalogue_num", "Catalogue Number")]), Discipline::Inv).unwrap();
        assert_eq!(map.require("Item.catalogue_num"), Ok(0));
        assert!(matches!(
            map.require("CollectionEvent.event_num"),
            Err(SchemaError::MissingColumn { .. })
        ));
    }
}
