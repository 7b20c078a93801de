//! Reference dictionaries and their spreadsheet tab form

use std::collections::BTreeMap;

use crate::schema::Category;
use crate::sheet::{Tab, tabs};
use crate::value::Value;

/// Marker shown for names with no database match
pub const NEW_MARKER: &str = "NEW?";

/// Outcome of looking one name up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Matching ids in database order
    Existing(Vec<i64>),
    New,
}

impl Resolution {
    /// The id when exactly one record matched
    pub fn single_id(&self) -> Option<i64> {
        match self {
            Resolution::Existing(ids) if ids.len() == 1 => Some(ids[0]),
            _ => None,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, Resolution::New)
    }

    /// Cell form: a number for one id, text otherwise
    pub fn to_value(&self) -> Value {
        match self.single_id() {
            Some(id) => Value::Int(id),
            None => Value::from(self.to_string()),
        }
    }

    /// Parse a reviewed tab cell; `None` when it is neither ids nor `NEW?`
    pub fn parse(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(Resolution::New),
            Value::Int(id) => Some(Resolution::Existing(vec![*id])),
            other => {
                let text = other.canonical()?;
                if text.eq_ignore_ascii_case(NEW_MARKER) {
                    return Some(Resolution::New);
                }
                let ids: Option<Vec<i64>> = text.split(',').map(|piece| piece.trim().parse().ok()).collect();
                ids.filter(|ids| !ids.is_empty()).map(Resolution::Existing)
            }
        }
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resolution::Existing(ids) => {
                let ids: Vec<String> = ids.iter().map(i64::to_string).collect();
                write!(f, "{}", ids.join(", "))
            }
            Resolution::New => write!(f, "{}", NEW_MARKER),
        }
    }
}

/// Names of one category mapped to their resolution, in key order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceDictionary {
    pub category: Category,
    entries: BTreeMap<String, Resolution>,
}

/// Tab name and the two column headers used for a category
pub fn tab_layout(category: Category) -> Option<(&'static str, &'static str, &'static str)> {
    match category {
        Category::Person => Some((tabs::PERSON, "Name", "person_id")),
        Category::Organization => Some((tabs::ORGANIZATION, "Organization", "organization_id")),
        Category::Taxon => Some((tabs::TAXON, "Term", "taxon_id")),
        Category::Location => Some((tabs::LOCATION, "Location Code", "location_id")),
        _ => None,
    }
}

impl ReferenceDictionary {
    pub fn new(category: Category) -> Self {
        Self {
            category,
            entries: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, resolution: Resolution) {
        self.entries.insert(key.into(), resolution);
    }

    pub fn get(&self, key: &str) -> Option<&Resolution> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Resolution)> {
        self.entries.iter()
    }

    pub fn new_count(&self) -> usize {
        self.entries.values().filter(|r| r.is_new()).count()
    }

    /// Two-column tab for operator review
    pub fn to_tab(&self) -> Option<Tab> {
        let (name, key_header, id_header) = tab_layout(self.category)?;
        let mut tab = Tab::new(name, vec![key_header.to_string(), id_header.to_string()]);
        tab.rows = self
            .entries
            .iter()
            .map(|(key, resolution)| vec![Value::from(key.as_str()), resolution.to_value()])
            .collect();
        Some(tab)
    }

    /// Read a reviewed tab back; unreadable id cells count as `NEW?`
    pub fn from_tab(category: Category, tab: &Tab) -> Self {
        let mut dictionary = Self::new(category);
        for (idx, row) in tab.rows.iter().enumerate() {
            let Some(key) = row.first().and_then(Value::canonical) else {
                continue;
            };
            let cell = row.get(1).cloned().unwrap_or(Value::Null);
            let resolution = Resolution::parse(&cell).unwrap_or_else(|| {
                log::warn!(
                    "{} tab row {}: '{}' is not an id list, treating '{}' as {}",
                    tab.name,
                    idx + 2,
                    cell,
                    key,
                    NEW_MARKER
                );
                Resolution::New
            });
            dictionary.insert(key, resolution);
        }
        dictionary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_display_and_value() {
        assert_eq!(Resolution::Existing(vec![12, 15]).to_string(), "12, 15");
        assert_eq!(Resolution::New.to_string(), "NEW?");
        assert_eq!(Resolution::Existing(vec![3]).to_value(), Value::Int(3));
        assert_eq!(Resolution::Existing(vec![3, 4]).to_value(), Value::from("3, 4"));
    }

    #[test]
    fn test_resolution_parse() {
        assert_eq!(Resolution::parse(&Value::Int(7)), Some(Resolution::Existing(vec![7])));
        assert_eq!(Resolution::parse(&Value::from("12, 15")), Some(Resolution::Existing(vec![12, 15])));
        assert_eq!(Resolution::parse(&Value::from("new?")), Some(Resolution::New));
        assert_eq!(Resolution::parse(&Value::Null), Some(Resolution::New));
        assert_eq!(Resolution::parse(&Value::from("maybe 4")), None);
    }

    #[test]
    fn test_tab_layout_and_reload() {
        let mut dictionary = ReferenceDictionary::new(Category::Person);
        dictionary.insert("Meg Sugrue", Resolution::Existing(vec![3]));
        dictionary.insert("Dave Stewart", Resolution::New);

        let tab = dictionary.to_tab().unwrap();
        assert_eq!(tab.name, "Person");
        assert_eq!(tab.header, vec!["Name", "person_id"]);
        // Key order
        assert_eq!(tab.rows[0][0], Value::from("Dave Stewart"));

        let reloaded = ReferenceDictionary::from_tab(Category::Person, &tab);
        assert_eq!(reloaded, dictionary);
        assert_eq!(reloaded.new_count(), 1);
    }

    #[test]
    fn test_from_tab_operator_edits() {
        let mut tab = Tab::new("Taxon", vec!["Term".into(), "taxon_id".into()]);
        tab.rows.push(vec![Value::from("Pisaster ochraceus"), Value::from("88")]);
        tab.rows.push(vec![Value::from("Mopalia sp."), Value::from("check")]);
        let dictionary = ReferenceDictionary::from_tab(Category::Taxon, &tab);
        assert_eq!(dictionary.get("Pisaster ochraceus").and_then(Resolution::single_id), Some(88));
        assert_eq!(dictionary.get("Mopalia sp."), Some(&Resolution::New));
    }

    #[test]
    fn test_no_tab_for_site_categories() {
        assert!(ReferenceDictionary::new(Category::Sites).to_tab().is_none());
    }
}
