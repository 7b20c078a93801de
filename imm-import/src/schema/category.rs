//! Logical column categories and the qualifier prefixes each one accepts

/// Placeholder in qualifiers and prefixes replaced by the discipline item table
pub const DISCIPLINE_PLACEHOLDER: &str = "[DISCIPLINE]";

/// Logical field group of template columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    /// Free-text person names to resolve
    Person,
    /// Free-text organization names to resolve
    Organization,
    /// Scientific names to resolve
    Taxon,
    /// Storage location codes to resolve
    Location,
    /// Site columns compared during site generation (includes site notes)
    Sites,
    /// Site columns written to the site table
    SiteImport,
    Events,
    GeoSiteNote,
    Item,
    NHItem,
    HHItem,
    DisciplineItem,
    Taxonomy,
    Preparation,
    ChemicalTreatment,
    FieldMeasurement,
    OtherNumber,
    ItemLocation,
    /// Resolved person/organization ids per role
    PersonLinks,
    /// Maker, artist, technique and material columns; recognised but not imported
    HistoryLinks,
}

impl Category {
    pub const ALL: [Category; 20] = [
        Category::Person,
        Category::Organization,
        Category::Taxon,
        Category::Location,
        Category::Sites,
        Category::SiteImport,
        Category::Events,
        Category::GeoSiteNote,
        Category::Item,
        Category::NHItem,
        Category::HHItem,
        Category::DisciplineItem,
        Category::Taxonomy,
        Category::Preparation,
        Category::ChemicalTreatment,
        Category::FieldMeasurement,
        Category::OtherNumber,
        Category::ItemLocation,
        Category::PersonLinks,
        Category::HistoryLinks,
    ];

    /// Accepted qualifier prefixes; `[DISCIPLINE]` is substituted per session
    pub fn prefixes(&self) -> &'static [&'static str] {
        match self {
            Category::Person => &["Person.search_name"],
            Category::Organization => &["Organization.org_name"],
            Category::Taxon => &["Taxon.term"],
            Category::Location => &["Location.location_cd"],
            Category::Sites => &["GeographicSite.", "ArchaeologicalSite.", "GeoSiteNote."],
            Category::SiteImport => &["GeographicSite.", "ArchaeologicalSite."],
            Category::Events => &["CollectionEvent.", "ArchaeologicalCollectionEvent."],
            Category::GeoSiteNote => &["GeoSiteNote."],
            Category::Item => &["Item."],
            Category::NHItem => &["NaturalHistoryItem."],
            Category::HHItem => &["HumanHistoryItem."],
            Category::DisciplineItem => &["[DISCIPLINE]."],
            Category::Taxonomy => &["Taxonomy."],
            Category::Preparation => &["Preparation."],
            Category::ChemicalTreatment => &["ChemicalTreatment."],
            Category::FieldMeasurement => &["FieldMeasurement."],
            Category::OtherNumber => &["OtherNumber."],
            Category::ItemLocation => &["Location.location_id"],
            Category::PersonLinks => &["Collector.", "Determinavit.", "Preparator."],
            Category::HistoryLinks => &["MakerOrganization.", "Artist.", "Technique.", "Material."],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Category::Person => "Person",
            Category::Organization => "Organization",
            Category::Taxon => "Taxon",
            Category::Location => "Location",
            Category::Sites => "Sites",
            Category::SiteImport => "SiteImport",
            Category::Events => "Events",
            Category::GeoSiteNote => "GeoSiteNote",
            Category::Item => "Item",
            Category::NHItem => "NHItem",
            Category::HHItem => "HHItem",
            Category::DisciplineItem => "DisciplineItem",
            Category::Taxonomy => "Taxonomy",
            Category::Preparation => "Preparation",
            Category::ChemicalTreatment => "ChemicalTreatment",
            Category::FieldMeasurement => "FieldMeasurement",
            Category::OtherNumber => "OtherNumber",
            Category::ItemLocation => "ItemLocation",
            Category::PersonLinks => "PersonLinks",
            Category::HistoryLinks => "HistoryLinks",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_category_has_prefixes() {
        for category in Category::ALL {
            assert!(!category.prefixes().is_empty(), "{} has no prefixes", category);
        }
    }

    #[test]
    fn test_site_import_excludes_notes() {
        assert!(Category::Sites.prefixes().contains(&"GeoSiteNote."));
        assert!(!Category::SiteImport.prefixes().contains(&"GeoSiteNote."));
    }
}
