//! Code elements and the store that normalizes them.
//!
//! The element store is the single source of truth for everything both
//! graphs are built from: one [`CodeElement`] per module, class, or function
//! that survived parsing. Downstream builders never re-touch the filesystem;
//! they read from here.

use crate::id::{derive_element_id, ElementId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Kinds of source elements the parser boundary can hand over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    /// A file-level module or package.
    Module,
    /// A class, struct, or comparable type definition.
    Class,
    /// A free function or method.
    Function,
}

impl ElementKind {
    /// Get a display label for the element kind.
    pub fn label(&self) -> &'static str {
        match self {
            ElementKind::Module => "module",
            ElementKind::Class => "class",
            ElementKind::Function => "function",
        }
    }
}

impl std::fmt::Display for ElementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One parsed source element, the atom both graphs are built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeElement {
    /// Stable identifier derived from the source identity.
    pub id: ElementId,
    /// Category of the element.
    pub kind: ElementKind,
    /// Fully qualified name, e.g. `app.Serializer.to_json`.
    pub qualified_name: String,
    /// Repository-relative path of the defining file.
    pub file_path: String,
    /// First line of the element's span (1-based, inclusive).
    pub line_start: u32,
    /// Last line of the element's span (inclusive).
    pub line_end: u32,
    /// Raw source text of the span.
    pub raw_source: String,
    /// Leading documentation comment, when the parser found one.
    pub docstring: Option<String>,
}

impl CodeElement {
    /// Create an element, deriving its id from the source identity.
    pub fn new(
        kind: ElementKind,
        qualified_name: impl Into<String>,
        file_path: impl Into<String>,
        line_start: u32,
        line_end: u32,
        raw_source: impl Into<String>,
        docstring: Option<String>,
    ) -> Self {
        let qualified_name = qualified_name.into();
        let file_path = file_path.into();
        let id = derive_element_id(&file_path, &qualified_name, line_start, line_end);
        Self {
            id,
            kind,
            qualified_name,
            file_path,
            line_start,
            line_end,
            raw_source: raw_source.into(),
            docstring,
        }
    }

    /// Number of lines covered by the element's span.
    pub fn span_len(&self) -> u32 {
        self.line_end.saturating_sub(self.line_start) + 1
    }

    /// Whether this element's span strictly encloses `other`'s span.
    ///
    /// Strict means the spans are not identical, so an element never
    /// encloses itself and two clones of the same span never enclose each
    /// other.
    pub fn encloses(&self, other: &CodeElement) -> bool {
        self.file_path == other.file_path
            && self.line_start <= other.line_start
            && other.line_end <= self.line_end
            && (self.line_start, self.line_end) != (other.line_start, other.line_end)
    }

    /// The source identity fields, used to tell an overwrite from a hash
    /// collision when two elements share an id.
    fn identity(&self) -> (&str, &str, u32, u32) {
        (
            &self.file_path,
            &self.qualified_name,
            self.line_start,
            self.line_end,
        )
    }
}

/// Two distinct elements hashed to the same id.
///
/// With content-derived ids this only happens on an actual digest collision,
/// which corrupts every downstream mapping, so it aborts the build instead
/// of being counted and skipped.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("element id {id} derived for two distinct elements ({existing} vs {incoming})")]
pub struct IdCollisionError {
    /// The contested id.
    pub id: ElementId,
    /// Qualified name already stored under the id.
    pub existing: String,
    /// Qualified name of the element that tried to claim it.
    pub incoming: String,
}

/// Normalized, id-keyed collection of all parsed elements.
///
/// Re-inserting an element with an id that is already present overwrites the
/// stored copy in place (last write wins), so feeding the same file twice in
/// one pass is harmless.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<CodeElement>", into = "Vec<CodeElement>")]
pub struct ElementStore {
    elements: Vec<CodeElement>,
    by_id: HashMap<ElementId, usize>,
}

impl ElementStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite an element.
    ///
    /// Returns `true` when the element was new and `false` when it replaced
    /// a stored copy with the same identity. An id claimed by a *different*
    /// identity is a collision and fails.
    pub fn upsert(&mut self, element: CodeElement) -> Result<bool, IdCollisionError> {
        match self.by_id.get(&element.id) {
            Some(&pos) => {
                let existing = &self.elements[pos];
                if existing.identity() != element.identity() {
                    return Err(IdCollisionError {
                        id: element.id.clone(),
                        existing: existing.qualified_name.clone(),
                        incoming: element.qualified_name.clone(),
                    });
                }
                self.elements[pos] = element;
                Ok(false)
            }
            None => {
                self.by_id.insert(element.id.clone(), self.elements.len());
                self.elements.push(element);
                Ok(true)
            }
        }
    }

    /// Look up an element by id.
    pub fn get(&self, id: &ElementId) -> Option<&CodeElement> {
        self.by_id.get(id).map(|&pos| &self.elements[pos])
    }

    /// Whether the store holds the given id.
    pub fn contains(&self, id: &ElementId) -> bool {
        self.by_id.contains_key(id)
    }

    /// Number of stored elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// All elements in storage order.
    pub fn elements(&self) -> &[CodeElement] {
        &self.elements
    }

    /// Ids of all elements in storage order.
    pub fn ids(&self) -> impl Iterator<Item = &ElementId> {
        self.elements.iter().map(|e| &e.id)
    }

    /// Sort elements into the canonical order used by serialized bundles:
    /// by file, then span position, then id.
    pub fn sort_canonical(&mut self) {
        self.elements.sort_by(|a, b| {
            (&a.file_path, a.line_start, a.line_end, &a.id).cmp(&(
                &b.file_path,
                b.line_start,
                b.line_end,
                &b.id,
            ))
        });
        self.by_id = index_of(&self.elements);
    }

    /// Consume the store, yielding the element list.
    pub fn into_elements(self) -> Vec<CodeElement> {
        self.elements
    }
}

fn index_of(elements: &[CodeElement]) -> HashMap<ElementId, usize> {
    elements
        .iter()
        .enumerate()
        .map(|(pos, e)| (e.id.clone(), pos))
        .collect()
}

impl From<Vec<CodeElement>> for ElementStore {
    fn from(elements: Vec<CodeElement>) -> Self {
        let by_id = index_of(&elements);
        Self { elements, by_id }
    }
}

impl From<ElementStore> for Vec<CodeElement> {
    fn from(store: ElementStore) -> Self {
        store.elements
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn function(name: &str, file: &str, start: u32, end: u32) -> CodeElement {
        CodeElement::new(
            ElementKind::Function,
            name,
            file,
            start,
            end,
            format!("def {}(): ...", name),
            None,
        )
    }

    #[test]
    fn test_upsert_then_get() {
        let mut store = ElementStore::new();
        let element = function("app.to_json", "src/app.py", 10, 24);
        let id = element.id.clone();

        assert!(store.upsert(element).unwrap());
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&id).unwrap().qualified_name, "app.to_json");
    }

    #[test]
    fn test_reinsert_overwrites_in_place() {
        let mut store = ElementStore::new();
        let first = function("app.to_json", "src/app.py", 10, 24);
        let mut second = first.clone();
        second.raw_source = "def to_json(): return dumps(self)".to_string();
        let id = first.id.clone();

        assert!(store.upsert(first).unwrap());
        assert!(!store.upsert(second).unwrap());
        assert_eq!(store.len(), 1);
        assert!(store.get(&id).unwrap().raw_source.contains("dumps"));
    }

    #[test]
    fn test_colliding_identity_is_rejected() {
        let mut store = ElementStore::new();
        let a = function("app.to_json", "src/app.py", 10, 24);
        let mut b = function("app.to_dict", "src/app.py", 30, 40);
        // Force the same id onto a different identity.
        b.id = a.id.clone();

        store.upsert(a).unwrap();
        let err = store.upsert(b).unwrap_err();
        assert_eq!(err.existing, "app.to_json");
        assert_eq!(err.incoming, "app.to_dict");
    }

    #[test]
    fn test_canonical_sort_orders_by_file_then_span() {
        let mut store = ElementStore::new();
        store.upsert(function("b.second", "src/b.py", 5, 9)).unwrap();
        store.upsert(function("a.first", "src/a.py", 1, 3)).unwrap();
        store.upsert(function("b.first", "src/b.py", 1, 4)).unwrap();
        store.sort_canonical();

        let names: Vec<&str> = store
            .elements()
            .iter()
            .map(|e| e.qualified_name.as_str())
            .collect();
        assert_eq!(names, vec!["a.first", "b.first", "b.second"]);

        // Index survives the reorder.
        let id = store.elements()[2].id.clone();
        assert_eq!(store.get(&id).unwrap().qualified_name, "b.second");
    }

    #[test]
    fn test_encloses_is_strict() {
        let outer = function("app.Serializer", "src/app.py", 1, 40);
        let inner = function("app.Serializer.to_json", "src/app.py", 10, 24);
        let twin = function("app.copy", "src/app.py", 1, 40);
        let elsewhere = function("lib.helper", "src/lib.py", 1, 40);

        assert!(outer.encloses(&inner));
        assert!(!inner.encloses(&outer));
        assert!(!outer.encloses(&twin));
        assert!(!outer.encloses(&elsewhere));
    }
}
