//! Flat tuple wire format and the merge of transformed tuples
//!
//! Records cross a process boundary as `(index, ancestor,
//! transformation_name, subtree)` tuples, serialized as a JSON array of
//! four-element arrays:
//!
//! ```text
//! [[0, null, null, "(NP (DT the) (NN cat))"], [1, 0, "drop-det", "(NP (NN cat))"]]
//! ```
//!
//! Only these four fields travel. Provenance is re-attached from the original
//! matches, and `origin`/`descendants` are re-derived from `ancestor`.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

use bstr::ByteSlice;
use log::{info, warn};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::error::{LineageError, Result};
use crate::record::{MatchRecord, MatchSource, RecordIndex};
use crate::store::MatchStore;
use crate::tree::Tree;

/// Error in the wire bridge
#[derive(Debug, Error)]
pub enum WireError {
    #[error("Wire error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Wire error: failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Wire error: {program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },
}

type RawTuple = (RecordIndex, Option<RecordIndex>, Option<String>, String);

/// One record on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawTuple", into = "RawTuple")]
pub struct WireTuple {
    pub index: RecordIndex,
    pub ancestor: Option<RecordIndex>,
    pub transformation_name: Option<String>,
    /// Labeled-bracket string
    pub subtree: String,
}

impl From<RawTuple> for WireTuple {
    fn from((index, ancestor, transformation_name, subtree): RawTuple) -> Self {
        Self {
            index,
            ancestor,
            transformation_name,
            subtree,
        }
    }
}

impl From<WireTuple> for RawTuple {
    fn from(tuple: WireTuple) -> Self {
        (
            tuple.index,
            tuple.ancestor,
            tuple.transformation_name,
            tuple.subtree,
        )
    }
}

impl From<&MatchRecord> for WireTuple {
    fn from(record: &MatchRecord) -> Self {
        Self {
            index: record.index,
            ancestor: record.ancestor,
            transformation_name: record.transformation_name.clone(),
            subtree: record.subtree.to_string(),
        }
    }
}

/// A store rebuilt from wire tuples
#[derive(Debug, Clone)]
pub struct Merge {
    pub store: MatchStore,
    /// Indices left out: ill-formed trees, and originals the other side dropped
    pub dropped: Vec<RecordIndex>,
}

impl MatchStore {
    /// Export every record as a wire tuple, in index order
    pub fn to_wire(&self) -> Vec<WireTuple> {
        self.iter().map(WireTuple::from).collect()
    }

    /// Rebuild a store from wire tuples alone; provenance fields stay empty
    pub fn from_wire(tuples: Vec<WireTuple>) -> Result<Merge> {
        rebuild(tuples, |_| Ok(MatchSource::default()))
    }
}

/// Merge tuples coming back from a transformation run onto the original matches.
///
/// Original tuples take their provenance from `originals`; derived tuples copy
/// it from their ancestor. Tuples may arrive in any order. Originals missing
/// from `tuples` were dropped by the other side and are reported as such.
pub fn merge_matches(originals: &MatchStore, tuples: Vec<WireTuple>) -> Result<Merge> {
    let mut merge = rebuild(tuples, |index| {
        originals.get(index).map(|record| record.source.clone())
    })?;

    let already_dropped: FxHashSet<RecordIndex> = merge.dropped.iter().copied().collect();
    let missing: Vec<RecordIndex> = originals
        .originals()
        .map(|record| record.index)
        .filter(|index| !merge.store.contains(*index) && !already_dropped.contains(index))
        .collect();
    if !missing.is_empty() {
        warn!("{} original matches were dropped during transformation", missing.len());
    }
    merge.dropped.extend(missing);
    merge.dropped.sort_unstable();

    Ok(merge)
}

/// Rebuild records in ascending index order so ancestors precede descendants
fn rebuild(
    mut tuples: Vec<WireTuple>,
    provenance: impl Fn(RecordIndex) -> Result<MatchSource>,
) -> Result<Merge> {
    tuples.sort_by_key(|tuple| tuple.index);

    let mut store = MatchStore::new();
    let mut dropped = Vec::new();
    let mut previous: Option<RecordIndex> = None;

    for tuple in tuples {
        let index = tuple.index;
        if previous == Some(index) {
            return Err(LineageError::DuplicateIndex(index));
        }
        previous = Some(index);

        let tree = match Tree::parse(&tuple.subtree) {
            Ok(tree) => tree,
            Err(e) => {
                warn!("dropping record {}: {}", index, e);
                dropped.push(index);
                continue;
            }
        };

        match (tuple.ancestor, tuple.transformation_name) {
            (None, None) => {
                store.insert(MatchRecord::original(index, provenance(index)?, tree))?;
            }
            (Some(ancestor), Some(name)) => {
                let parent = store
                    .get(ancestor)
                    .map_err(|_| LineageError::DanglingAncestor(ancestor))?;
                let record = MatchRecord::derived(index, parent, &name, tree);
                store.insert(record)?;
                store.push_descendant(ancestor, index)?;
            }
            _ => return Err(LineageError::InconsistentRecord(index)),
        }
    }

    Ok(Merge { store, dropped })
}

/// Serialize tuples as JSON
pub fn write_tuples(tuples: &[WireTuple], writer: impl Write) -> Result<()> {
    serde_json::to_writer(writer, tuples).map_err(WireError::from)?;
    Ok(())
}

/// Deserialize tuples from JSON
pub fn read_tuples(reader: impl Read) -> Result<Vec<WireTuple>> {
    Ok(serde_json::from_reader(reader).map_err(WireError::from)?)
}

pub fn save_tuples(tuples: &[WireTuple], path: impl AsRef<Path>) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_tuples(tuples, &mut writer)?;
    writer.flush()?;
    Ok(())
}

pub fn load_tuples(path: impl AsRef<Path>) -> Result<Vec<WireTuple>> {
    read_tuples(BufReader::new(File::open(path)?))
}

/// Runs a companion transformation process over exported tuples.
///
/// The process is invoked as `<program> <tuples-in> <transformations> <tuples-out>`,
/// reads the input tuples, applies the transformation file and writes all
/// surviving input tuples plus new derived tuples to `tuples-out`.
#[derive(Debug, Clone)]
pub struct CompanionTransformer {
    program: PathBuf,
}

impl CompanionTransformer {
    pub fn new(program: impl AsRef<Path>) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
        }
    }

    /// Transform `matches` with the rules in `transformations` and merge the result
    pub fn transform(&self, matches: &MatchStore, transformations: &Path) -> Result<Merge> {
        let input = NamedTempFile::new()?;
        let output = NamedTempFile::new()?;
        save_tuples(&matches.to_wire(), input.path())?;

        let program = self.program.display().to_string();
        info!(
            "running {} on {} records with {}",
            program,
            matches.len(),
            transformations.display()
        );

        let status = Command::new(&self.program)
            .arg(input.path())
            .arg(transformations)
            .arg(output.path())
            .output()
            .map_err(|source| WireError::Spawn {
                program: program.clone(),
                source,
            })?;
        if !status.status.success() {
            return Err(WireError::Failed {
                program,
                status: status.status.to_string(),
                stderr: status.stderr.to_str_lossy().trim().to_string(),
            }
            .into());
        }

        merge_matches(matches, load_tuples(output.path())?)
    }
}

impl Default for CompanionTransformer {
    fn default() -> Self {
        Self::new("transform.py")
    }
}
