//! Aircraft identifier comparison.
//!
//! ICAO 24-bit addresses are hex strings and the upstream treats them
//! case-insensitively, so "3C6444" and "3c6444" are the same aircraft.

/// True when the identifier is absent, empty, or whitespace only
pub fn is_blank(id: Option<&str>) -> bool {
    id.is_none_or(|id| id.trim().is_empty())
}

/// Whether two identifiers name the same aircraft.
///
/// Blank identifiers never match anything, including each other.
pub fn same_aircraft(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) if !is_blank(Some(a)) && !is_blank(Some(b)) => a
            .chars()
            .flat_map(char::to_lowercase)
            .eq(b.chars().flat_map(char::to_lowercase)),
        _ => false,
    }
}
