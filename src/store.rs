//! Match record store
//!
//! An append-only table of match records ordered by index, with a hash
//! index for constant-time lookup. Records are only ever appended with an
//! index greater than every index already present, so the table stays sorted.

use rustc_hash::FxHashMap;

use crate::error::{LineageError, Result};
use crate::record::{Extracted, MatchRecord, RecordIndex};

/// Filter over records by pattern name and/or label
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub pattern_name: Option<String>,
    pub label: Option<String>,
}

impl Selection {
    /// Select every record
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_pattern(pattern_name: &str) -> Self {
        Self {
            pattern_name: Some(pattern_name.to_string()),
            label: None,
        }
    }

    pub fn by_label(label: &str) -> Self {
        Self {
            pattern_name: None,
            label: Some(label.to_string()),
        }
    }

    pub fn matches(&self, record: &MatchRecord) -> bool {
        self.pattern_name
            .as_ref()
            .is_none_or(|name| *name == record.source.pattern_name)
            && self
                .label
                .as_ref()
                .is_none_or(|label| *label == record.source.label)
    }
}

/// Store of match records keyed by a stable integer index
#[derive(Debug, Clone, Default)]
pub struct MatchStore {
    /// Records in ascending index order
    records: Vec<MatchRecord>,
    /// Index -> position in `records`
    positions: FxHashMap<RecordIndex, usize>,
}

impl MatchStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store from extraction output, numbering records 0..N-1
    pub fn create_initial(extracted: impl IntoIterator<Item = Extracted>) -> Self {
        let mut store = Self::new();
        for (index, item) in extracted.into_iter().enumerate() {
            store.append(MatchRecord::original(index, item.source, item.subtree));
        }
        store
    }

    /// One past the largest index currently in the store (0 when empty)
    pub fn next_index(&self) -> RecordIndex {
        self.records.last().map_or(0, |record| record.index + 1)
    }

    /// Look up a record by index
    pub fn get(&self, index: RecordIndex) -> Result<&MatchRecord> {
        self.positions
            .get(&index)
            .map(|&pos| &self.records[pos])
            .ok_or(LineageError::NotFound(index))
    }

    fn get_mut(&mut self, index: RecordIndex) -> Result<&mut MatchRecord> {
        match self.positions.get(&index) {
            Some(&pos) => Ok(&mut self.records[pos]),
            None => Err(LineageError::NotFound(index)),
        }
    }

    pub fn contains(&self, index: RecordIndex) -> bool {
        self.positions.contains_key(&index)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in ascending index order
    pub fn iter(&self) -> std::slice::Iter<'_, MatchRecord> {
        self.records.iter()
    }

    pub fn indices(&self) -> impl Iterator<Item = RecordIndex> + '_ {
        self.records.iter().map(|record| record.index)
    }

    /// Records that were extracted rather than derived
    pub fn originals(&self) -> impl Iterator<Item = &MatchRecord> {
        self.records.iter().filter(|record| record.is_original())
    }

    /// Tops of non-trivial derivations: originals with at least one descendant
    pub fn roots(&self) -> Vec<RecordIndex> {
        self.records
            .iter()
            .filter(|record| record.is_original() && !record.descendants.is_empty())
            .map(|record| record.index)
            .collect()
    }

    /// Indices of the records a selection matches, in index order
    pub fn select(&self, selection: &Selection) -> Vec<RecordIndex> {
        self.records
            .iter()
            .filter(|record| selection.matches(record))
            .map(|record| record.index)
            .collect()
    }

    /// Derivation path from `index` back to its origin, inclusive at both ends
    pub fn chain(&self, index: RecordIndex) -> Result<Vec<RecordIndex>> {
        let mut path = vec![index];
        let mut record = self.get(index)?;
        while let Some(ancestor) = record.ancestor {
            record = self
                .get(ancestor)
                .map_err(|_| LineageError::DanglingAncestor(ancestor))?;
            path.push(ancestor);
        }
        Ok(path)
    }

    /// Append a record whose index is known to exceed every existing index
    fn append(&mut self, record: MatchRecord) {
        self.positions.insert(record.index, self.records.len());
        self.records.push(record);
    }

    /// Insert a record, enforcing index uniqueness and monotonicity
    pub(crate) fn insert(&mut self, record: MatchRecord) -> Result<()> {
        if self.contains(record.index) || record.index < self.next_index() {
            return Err(LineageError::DuplicateIndex(record.index));
        }
        self.append(record);
        Ok(())
    }

    /// Register `descendant` as directly derived from `ancestor`
    pub(crate) fn push_descendant(
        &mut self,
        ancestor: RecordIndex,
        descendant: RecordIndex,
    ) -> Result<()> {
        self.get_mut(ancestor)
            .map_err(|_| LineageError::DanglingAncestor(ancestor))?
            .descendants
            .push(descendant);
        Ok(())
    }

    /// Drop every record past the first `len`, unlinking each from its ancestor
    pub(crate) fn truncate(&mut self, len: usize) {
        while self.records.len() > len {
            let Some(record) = self.records.pop() else {
                break;
            };
            self.positions.remove(&record.index);
            let Some(ancestor) = record.ancestor else {
                continue;
            };
            if let Some(&pos) = self.positions.get(&ancestor) {
                self.records[pos]
                    .descendants
                    .retain(|&index| index != record.index);
            }
        }
    }
}

impl<'a> IntoIterator for &'a MatchStore {
    type Item = &'a MatchRecord;
    type IntoIter = std::slice::Iter<'a, MatchRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Check every lineage invariant of a store (test helper)
#[cfg(test)]
pub(crate) fn assert_lineage_consistent(store: &MatchStore) {
    for record in store {
        // original iff no ancestor iff no transformation name
        assert_eq!(record.ancestor.is_none(), record.transformation_name.is_none());
        if record.is_original() {
            assert_eq!(record.origin, record.index);
        } else {
            let chain = store.chain(record.index).unwrap();
            assert_eq!(*chain.last().unwrap(), record.origin);
            assert!(record.ancestor.unwrap() < record.index);
        }

        // descendants are exactly the records naming this one as ancestor
        let expected: Vec<RecordIndex> = store
            .iter()
            .filter(|other| other.ancestor == Some(record.index))
            .map(|other| other.index)
            .collect();
        assert_eq!(record.descendants(), expected.as_slice());
        assert_eq!(record.substring, record.subtree.terminal_yield());
    }
}
