//! Discipline vocabulary and the natural/human area split

use serde::{Deserialize, Serialize};

/// Museum subject-area code gating which tables and prefixes apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Discipline {
    Bot,
    Ent,
    Geo,
    Her,
    Ich,
    Inv,
    Mam,
    Orn,
    Pal,
    History,
    Archeolg,
    Ethnolg,
}

/// Coarse grouping of disciplines selecting the site/event table family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Area {
    Natural,
    Human,
}

impl Area {
    /// Value stored in `Item.area_cd`
    pub fn code(&self) -> &'static str {
        match self {
            Area::Natural => "natural",
            Area::Human => "human",
        }
    }
}

impl Discipline {
    pub const ALL: [Discipline; 12] = [
        Discipline::Bot,
        Discipline::Ent,
        Discipline::Geo,
        Discipline::Her,
        Discipline::Ich,
        Discipline::Inv,
        Discipline::Mam,
        Discipline::Orn,
        Discipline::Pal,
        Discipline::History,
        Discipline::Archeolg,
        Discipline::Ethnolg,
    ];

    /// Short code stored in `discipline_cd` columns
    pub fn code(&self) -> &'static str {
        match self {
            Discipline::Bot => "bot",
            Discipline::Ent => "ent",
            Discipline::Geo => "geo",
            Discipline::Her => "her",
            Discipline::Ich => "ich",
            Discipline::Inv => "inv",
            Discipline::Mam => "mam",
            Discipline::Orn => "orn",
            Discipline::Pal => "pal",
            Discipline::History => "history",
            Discipline::Archeolg => "archeolg",
            Discipline::Ethnolg => "ethnolg",
        }
    }

    /// Parse a short code
    pub fn from_code(code: &str) -> Option<Self> {
        let code = code.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|d| d.code() == code)
    }

    /// Full display name
    pub fn full_name(&self) -> &'static str {
        match self {
            Discipline::Bot => "Botany",
            Discipline::Ent => "Entomology",
            Discipline::Geo => "Geology",
            Discipline::Her => "Herpetology",
            Discipline::Ich => "Ichthyology",
            Discipline::Inv => "Invertebrate",
            Discipline::Mam => "Mammalogy",
            Discipline::Orn => "Ornithology",
            Discipline::Pal => "Paleontology",
            Discipline::History => "Modern History",
            Discipline::Archeolg => "Archaeology",
            Discipline::Ethnolg => "Ethnology",
        }
    }

    /// Discipline-specific item table, e.g. `InvertebrateItem` or `ModernHistoryItem`
    pub fn item_table(&self) -> String {
        let stem: String = self.full_name().split_whitespace().collect();
        format!("{}Item", stem)
    }

    pub fn area(&self) -> Area {
        match self {
            Discipline::History | Discipline::Archeolg | Discipline::Ethnolg => Area::Human,
            _ => Area::Natural,
        }
    }

    /// Modern history imports items and locations only; no sites, events or person links
    pub fn is_history(&self) -> bool {
        matches!(self, Discipline::History)
    }
}

impl std::fmt::Display for Discipline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}
