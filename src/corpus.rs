//! Tree corpus on disk
//!
//! A corpus is a directory of tree files holding one labeled-bracket tree per
//! line. Files are read in sorted order; gzip-compressed files (`*.gz`) are
//! decompressed transparently. Trees are numbered from 1 across the whole
//! corpus (absolute numbers, as the matcher reports them) and from 1 within
//! each file (relative numbers).

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use bstr::ByteSlice;
use flate2::read::GzDecoder;
use log::debug;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::parser::{TreeError, parse_tree_verbatim};
use crate::tree::Tree;

/// Error while loading a corpus
#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("Corpus error: invalid directory pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Corpus error: failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Error while resolving a match to a subtree
#[derive(Debug, Error)]
pub enum LocateError {
    #[error("No tree number {0} in corpus")]
    UnknownTree(usize),

    #[error("Tree {tree} has no node number {node}")]
    UnknownNode { tree: usize, node: usize },

    #[error(transparent)]
    Tree(#[from] TreeError),
}

/// Where a tree lives within the corpus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeLocation {
    pub file_name: String,
    /// Tree number within the file, counting from 1
    pub relative_tree_number: usize,
}

#[derive(Debug, Clone)]
struct CorpusFile {
    name: String,
    trees: Vec<String>,
}

/// In-memory copy of a directory of tree files
#[derive(Debug, Clone)]
pub struct Corpus {
    dir: PathBuf,
    files: Vec<CorpusFile>,
    /// Absolute tree number - 1 -> (file position, tree position)
    positions: Vec<(usize, usize)>,
}

impl Corpus {
    /// Load every regular file in `dir`, in sorted order
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, CorpusError> {
        let dir = dir.as_ref();
        let pattern = format!("{}/*", glob::Pattern::escape(&dir.to_string_lossy()));
        let mut paths: Vec<PathBuf> = glob::glob(&pattern)?
            .filter_map(Result::ok)
            .filter(|path| path.is_file())
            .collect();
        paths.sort();

        let mut corpus = Self {
            dir: dir.to_path_buf(),
            files: Vec::new(),
            positions: Vec::new(),
        };
        for path in paths {
            let trees = read_trees(&path)?;
            let name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            debug!("{}: {} trees", name, trees.len());
            corpus.push_file(name, trees);
        }
        Ok(corpus)
    }

    /// Build a corpus from in-memory files (name, contents), in the given order
    pub fn from_texts<'a>(
        dir: impl AsRef<Path>,
        files: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Self {
        let mut corpus = Self {
            dir: dir.as_ref().to_path_buf(),
            files: Vec::new(),
            positions: Vec::new(),
        };
        for (name, text) in files {
            corpus.push_file(name.to_string(), split_trees(text.as_bytes()));
        }
        corpus
    }

    fn push_file(&mut self, name: String, trees: Vec<String>) {
        let file_pos = self.files.len();
        self.positions
            .extend((0..trees.len()).map(|tree_pos| (file_pos, tree_pos)));
        self.files.push(CorpusFile { name, trees });
    }

    /// Directory handed to the matcher
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn tree_count(&self) -> usize {
        self.positions.len()
    }

    /// File and relative number of an absolute tree number
    pub fn locate(&self, tree: usize) -> Option<TreeLocation> {
        let &(file_pos, tree_pos) = self.positions.get(tree.checked_sub(1)?)?;
        Some(TreeLocation {
            file_name: self.files[file_pos].name.clone(),
            relative_tree_number: tree_pos + 1,
        })
    }

    /// Map of every absolute tree number to its location
    pub fn tree_info(&self) -> FxHashMap<usize, TreeLocation> {
        (1..=self.tree_count())
            .filter_map(|tree| self.locate(tree).map(|loc| (tree, loc)))
            .collect()
    }

    /// Raw bracket text of an absolute tree number
    pub fn raw_tree(&self, tree: usize) -> Option<&str> {
        let &(file_pos, tree_pos) = self.positions.get(tree.checked_sub(1)?)?;
        Some(&self.files[file_pos].trees[tree_pos])
    }

    /// Subtree rooted at pre-order node `node` of tree `tree`
    pub fn subtree(&self, tree: usize, node: usize) -> Result<Tree, LocateError> {
        let raw = self.raw_tree(tree).ok_or(LocateError::UnknownTree(tree))?;
        // Node numbers refer to the tree as written, so number before normalizing
        let parsed = parse_tree_verbatim(raw)?;
        parsed
            .nth_node(node)
            .cloned()
            .ok_or(LocateError::UnknownNode { tree, node })
    }
}

/// Read a tree file, decompressing `*.gz`
fn read_trees(path: &Path) -> Result<Vec<String>, CorpusError> {
    let read_err = |source| CorpusError::Read {
        path: path.to_path_buf(),
        source,
    };

    let bytes = if path.extension().is_some_and(|ext| ext == "gz") {
        let mut bytes = Vec::new();
        GzDecoder::new(File::open(path).map_err(read_err)?)
            .read_to_end(&mut bytes)
            .map_err(read_err)?;
        bytes
    } else {
        fs::read(path).map_err(read_err)?
    };

    Ok(split_trees(&bytes))
}

/// One tree per non-blank line
fn split_trees(bytes: &[u8]) -> Vec<String> {
    bytes
        .lines()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .map(|line| line.to_str_lossy().into_owned())
        .collect()
}
