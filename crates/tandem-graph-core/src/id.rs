//! Stable element identifiers.
//!
//! Ids are content-derived: hashing the source identity of an element means
//! re-running a build over an unchanged repository reproduces the exact same
//! id for every element, which is what makes serialized graph bundles
//! byte-for-byte reproducible.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of hex characters kept from the full blake3 digest.
const ID_HEX_LEN: usize = 24;

/// Identifier shared by elements and the nodes of both graphs.
///
/// A requirement node and a code node describing the same element carry the
/// same `ElementId`; the bigraph map between the two graphs is built on that
/// equality.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(pub String);

impl ElementId {
    /// Borrow the id as a plain string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ElementId {
    fn from(value: &str) -> Self {
        ElementId(value.to_string())
    }
}

impl From<String> for ElementId {
    fn from(value: String) -> Self {
        ElementId(value)
    }
}

/// Derive the stable id for an element from its source identity.
///
/// The identity is the tuple (file path, qualified name, line span); the
/// parts are joined with `|` so that no field can bleed into its neighbor,
/// then hashed with blake3 and truncated to a short hex form that stays
/// readable in logs and serialized artifacts.
pub fn derive_element_id(
    file_path: &str,
    qualified_name: &str,
    line_start: u32,
    line_end: u32,
) -> ElementId {
    let key = format!(
        "{}|{}|{}|{}",
        file_path, qualified_name, line_start, line_end
    );
    let digest = blake3::hash(key.as_bytes());
    let hex = digest.to_hex();
    ElementId(hex.as_str()[..ID_HEX_LEN].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_identity_same_id() {
        let a = derive_element_id("src/app.py", "app.to_json", 10, 24);
        let b = derive_element_id("src/app.py", "app.to_json", 10, 24);
        assert_eq!(a, b);
    }

    #[test]
    fn test_any_field_changes_the_id() {
        let base = derive_element_id("src/app.py", "app.to_json", 10, 24);
        assert_ne!(base, derive_element_id("src/lib.py", "app.to_json", 10, 24));
        assert_ne!(base, derive_element_id("src/app.py", "app.to_dict", 10, 24));
        assert_ne!(base, derive_element_id("src/app.py", "app.to_json", 11, 24));
        assert_ne!(base, derive_element_id("src/app.py", "app.to_json", 10, 25));
    }

    #[test]
    fn test_separator_prevents_field_bleed() {
        // "ab" + "c" must not collide with "a" + "bc"
        let a = derive_element_id("ab", "c", 1, 2);
        let b = derive_element_id("a", "bc", 1, 2);
        assert_ne!(a, b);
    }

    #[test]
    fn test_id_is_short_hex() {
        let id = derive_element_id("src/app.py", "app.to_json", 10, 24);
        assert_eq!(id.as_str().len(), 24);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }
}
