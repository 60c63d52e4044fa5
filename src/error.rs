//! Top-level error type

use thiserror::Error;

use crate::corpus::CorpusError;
use crate::editor::EditorError;
use crate::matcher::MatcherError;
use crate::parser::TreeError;
use crate::record::RecordIndex;
use crate::rules::RuleError;
use crate::wire::WireError;

/// Errors surfaced by the store, linker, driver and wire bridge.
///
/// `NotFound`, `DanglingAncestor`, `DuplicateIndex` and `InconsistentRecord`
/// describe a corrupted record graph and abort the run. `Editor` and
/// `Alignment` come from the external tree editor and are left to the caller
/// to retry or abort. `MalformedTree` is normally absorbed where it occurs.
#[derive(Debug, Error)]
pub enum LineageError {
    #[error("No record with index {0}")]
    NotFound(RecordIndex),

    #[error("Derivation refers to missing ancestor {0}")]
    DanglingAncestor(RecordIndex),

    #[error("Duplicate record index {0}")]
    DuplicateIndex(RecordIndex),

    #[error("Record {0} has an ancestor without a transformation name, or vice versa")]
    InconsistentRecord(RecordIndex),

    #[error(transparent)]
    Editor(#[from] EditorError),

    #[error("Editor returned {actual} trees for {expected} inputs")]
    Alignment { expected: usize, actual: usize },

    #[error(transparent)]
    MalformedTree(#[from] TreeError),

    #[error(transparent)]
    Matcher(#[from] MatcherError),

    #[error(transparent)]
    Rules(#[from] RuleError),

    #[error(transparent)]
    Corpus(#[from] CorpusError),

    #[error(transparent)]
    Wire(#[from] WireError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = LineageError> = std::result::Result<T, E>;
