//! Match records: one extracted or derived occurrence of a pattern match

use crate::tree::Tree;

/// Stable record identifier, unique within a store and never reused
pub type RecordIndex = usize;

/// Where a match came from. Copied unchanged from ancestor to descendant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchSource {
    pub pattern_name: String,
    /// Annotation category the pattern targets
    pub label: String,
    pub source_file: String,
    /// Tree number within `source_file`, counting from 1
    pub relative_tree_number: usize,
    /// Pre-order node number within the tree, counting from 1
    pub node_number: usize,
}

/// A match ready to be seeded into a store (index not yet assigned)
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    pub source: MatchSource,
    pub subtree: Tree,
}

/// One row of the match record store
#[derive(Debug, Clone, PartialEq)]
pub struct MatchRecord {
    pub index: RecordIndex,
    pub source: MatchSource,
    pub subtree: Tree,
    /// Terminal yield of `subtree`
    pub substring: String,
    /// Rule that produced this record; `None` for originals
    pub transformation_name: Option<String>,
    pub ancestor: Option<RecordIndex>,
    /// Root of the derivation chain; equals `index` for originals
    pub origin: RecordIndex,
    pub(crate) descendants: Vec<RecordIndex>,
}

impl MatchRecord {
    /// Create an original (underived) record
    pub fn original(index: RecordIndex, source: MatchSource, subtree: Tree) -> Self {
        let subtree = subtree.normalized();
        let substring = subtree.terminal_yield();
        Self {
            index,
            source,
            subtree,
            substring,
            transformation_name: None,
            ancestor: None,
            origin: index,
            descendants: Vec::new(),
        }
    }

    /// Create a record derived from `ancestor` by the rule `transformation`
    pub fn derived(
        index: RecordIndex,
        ancestor: &MatchRecord,
        transformation: &str,
        subtree: Tree,
    ) -> Self {
        let subtree = subtree.normalized();
        let substring = subtree.terminal_yield();
        Self {
            index,
            source: ancestor.source.clone(),
            subtree,
            substring,
            transformation_name: Some(transformation.to_string()),
            ancestor: Some(ancestor.index),
            // Origins are resolved at creation, so one hop is enough
            origin: ancestor.origin,
            descendants: Vec::new(),
        }
    }

    pub fn is_original(&self) -> bool {
        self.ancestor.is_none()
    }

    /// Indices of records directly derived from this one, in creation order
    pub fn descendants(&self) -> &[RecordIndex] {
        &self.descendants
    }
}
