//! Derivation linker
//!
//! Integrates batches of rewritten trees into a `MatchStore`. Each new
//! record gets the next free index, copies its provenance from its ancestor,
//! resolves its origin in one hop and is appended to its ancestor's
//! descendant list. Rewrites that leave the tree unchanged are discarded.
//!
//! A batch is all-or-nothing with respect to ancestor references: every
//! ancestor is checked before the first record is inserted, so a dangling
//! reference leaves the store exactly as it was.

use log::debug;

use crate::error::{LineageError, Result};
use crate::parser::TreeError;
use crate::record::{MatchRecord, RecordIndex};
use crate::store::MatchStore;
use crate::tree::Tree;

/// A rewritten tree together with the record it was derived from
#[derive(Debug, Clone, PartialEq)]
pub struct Derivation {
    pub ancestor: RecordIndex,
    pub transformation: String,
    pub tree: Tree,
}

impl Derivation {
    pub fn new(ancestor: RecordIndex, transformation: &str, tree: Tree) -> Self {
        Self {
            ancestor,
            transformation: transformation.to_string(),
            tree,
        }
    }

    /// Build a derivation from a labeled-bracket string
    pub fn from_bracket(
        ancestor: RecordIndex,
        transformation: &str,
        text: &str,
    ) -> Result<Self, TreeError> {
        Ok(Self::new(ancestor, transformation, Tree::parse(text)?))
    }
}

/// Outcome of linking one batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkSummary {
    /// Indices of the new records, in batch order
    pub created: Vec<RecordIndex>,
    /// Derivations discarded because the tree did not change
    pub unchanged: usize,
}

/// Link a batch of derivations into the store, in batch order
pub fn link_batch(
    store: &mut MatchStore,
    batch: impl IntoIterator<Item = Derivation>,
) -> Result<LinkSummary> {
    let batch: Vec<Derivation> = batch.into_iter().collect();

    if let Some(dangling) = batch.iter().find(|d| !store.contains(d.ancestor)) {
        return Err(LineageError::DanglingAncestor(dangling.ancestor));
    }

    let mut summary = LinkSummary::default();
    for derivation in batch {
        if let Some(index) = link_one(store, derivation)? {
            summary.created.push(index);
        } else {
            summary.unchanged += 1;
        }
    }

    debug!(
        "linked {} new records ({} unchanged)",
        summary.created.len(),
        summary.unchanged
    );
    Ok(summary)
}

/// Link a single derivation; `None` when the rewrite was a no-op
fn link_one(store: &mut MatchStore, derivation: Derivation) -> Result<Option<RecordIndex>> {
    let tree = derivation.tree.normalized();
    let ancestor = store
        .get(derivation.ancestor)
        .map_err(|_| LineageError::DanglingAncestor(derivation.ancestor))?;

    if ancestor.subtree == tree {
        return Ok(None);
    }

    let index = store.next_index();
    let record = MatchRecord::derived(index, ancestor, &derivation.transformation, tree);
    store.insert(record)?;
    store.push_descendant(derivation.ancestor, index)?;
    Ok(Some(index))
}
