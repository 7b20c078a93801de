//! Splitting of delimiter-separated name lists and lookup-key normalization

/// Delimiters separating names inside one cell
pub const DELIMITERS: [char; 5] = [';', ':', '|', '/', '\\'];

/// Result of splitting a cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameParts {
    /// No delimiter present; the original text, untouched
    Single(String),
    /// Trimmed, non-empty pieces in cell order
    Many(Vec<String>),
}

impl NameParts {
    /// Flatten to a list of names, trimming a `Single` and dropping it when blank
    pub fn into_vec(self) -> Vec<String> {
        match self {
            NameParts::Single(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    Vec::new()
                } else {
                    vec![trimmed.to_string()]
                }
            }
            NameParts::Many(parts) => parts,
        }
    }
}

/// Split a multi-value cell into atomic names
///
/// Without any of `; : | / \` the text comes back unchanged as `Single`.
/// Otherwise every delimiter and every comma separates names, except that a
/// segment shaped exactly like `Surname, Given names` stays whole.
pub fn split(text: &str) -> NameParts {
    if !text.contains(DELIMITERS) {
        return NameParts::Single(text.to_string());
    }

    let mut parts = Vec::new();
    for segment in text.split(DELIMITERS) {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        if is_surname_first(segment) {
            parts.push(segment.to_string());
            continue;
        }
        parts.extend(
            segment
                .split(',')
                .map(str::trim)
                .filter(|piece| !piece.is_empty())
                .map(str::to_string),
        );
    }

    NameParts::Many(parts)
}

/// `Last, First` form: a single comma with one word on its left
fn is_surname_first(segment: &str) -> bool {
    let mut halves = segment.splitn(2, ',');
    let (Some(left), Some(right)) = (halves.next(), halves.next()) else {
        return false;
    };
    let left = left.trim();
    !left.is_empty()
        && !left.contains(char::is_whitespace)
        && !right.contains(',')
        && !right.trim().is_empty()
}

/// Lookup key for one atomic name
///
/// `Last, First` becomes `First Last`; any other comma-separated pieces are
/// joined with a single space. Whitespace runs collapse to one space.
pub fn lookup_key(name: &str) -> String {
    let name = name.trim();
    let pieces: Vec<&str> = if is_surname_first(name) {
        name.rsplitn(2, ',').collect()
    } else {
        name.split(',').collect()
    };

    pieces
        .iter()
        .flat_map(|piece| piece.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}
