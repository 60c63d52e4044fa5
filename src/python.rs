//! Python bindings for treelineage
//!
//! This module provides PyO3-based Python bindings for the Rust core.

use pyo3::exceptions::{PyIOError, PyKeyError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyType;

use crate::config::ToolConfig;
use crate::corpus::Corpus;
use crate::driver::{DriverReport, TransformationDriver};
use crate::error::LineageError;
use crate::extract::{PatternSpec, extract as rust_extract};
use crate::linker::{Derivation, link_batch};
use crate::record::{MatchRecord, RecordIndex};
use crate::report::{derivations_to_string, report as rust_report};
use crate::rules::{read_post_process_rules, read_transformations};
use crate::store::{MatchStore, Selection};
use crate::wire::{WireTuple, load_tuples, merge_matches as rust_merge_matches, save_tuples};

type PyTuple4 = (RecordIndex, Option<RecordIndex>, Option<String>, String);

/// Convert LineageError to Python exception
impl From<LineageError> for PyErr {
    fn from(err: LineageError) -> PyErr {
        match err {
            LineageError::NotFound(_) => PyKeyError::new_err(err.to_string()),
            LineageError::Io(_) => PyIOError::new_err(err.to_string()),
            LineageError::Editor(_)
            | LineageError::Matcher(_)
            | LineageError::Wire(_)
            | LineageError::Alignment { .. } => PyRuntimeError::new_err(err.to_string()),
            _ => PyValueError::new_err(err.to_string()),
        }
    }
}

/// One extracted or derived match.
#[pyclass(name = "Record")]
#[derive(Clone)]
pub struct PyRecord {
    inner: MatchRecord,
}

#[pymethods]
impl PyRecord {
    #[getter]
    fn index(&self) -> RecordIndex {
        self.inner.index
    }

    #[getter]
    fn pattern_name(&self) -> String {
        self.inner.source.pattern_name.clone()
    }

    #[getter]
    fn label(&self) -> String {
        self.inner.source.label.clone()
    }

    #[getter]
    fn source_file(&self) -> String {
        self.inner.source.source_file.clone()
    }

    #[getter]
    fn relative_tree_number(&self) -> usize {
        self.inner.source.relative_tree_number
    }

    #[getter]
    fn node_number(&self) -> usize {
        self.inner.source.node_number
    }

    #[getter]
    fn subtree(&self) -> String {
        self.inner.subtree.to_string()
    }

    #[getter]
    fn substring(&self) -> String {
        self.inner.substring.clone()
    }

    #[getter]
    fn transformation_name(&self) -> Option<String> {
        self.inner.transformation_name.clone()
    }

    #[getter]
    fn ancestor(&self) -> Option<RecordIndex> {
        self.inner.ancestor
    }

    #[getter]
    fn origin(&self) -> RecordIndex {
        self.inner.origin
    }

    #[getter]
    fn descendants(&self) -> Vec<RecordIndex> {
        self.inner.descendants().to_vec()
    }

    fn __repr__(&self) -> String {
        format!(
            "<Record index={} substring='{}' ancestor={:?}>",
            self.inner.index, self.inner.substring, self.inner.ancestor
        )
    }
}

/// Per-rule outcome counts as (rule, created indices, unchanged, dropped)
fn outcome_tuples(report: DriverReport) -> Vec<(String, Vec<RecordIndex>, usize, usize)> {
    report
        .rules
        .into_iter()
        .map(|outcome| (outcome.rule, outcome.created, outcome.unchanged, outcome.dropped))
        .collect()
}

/// A store of match records and their derivations.
///
/// Records are addressed by a stable integer index. Derived records keep a
/// link to the record they were rewritten from.
#[pyclass(name = "MatchStore")]
#[derive(Clone, Default)]
pub struct PyMatchStore {
    inner: MatchStore,
}

#[pymethods]
impl PyMatchStore {
    #[new]
    fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from (index, ancestor, transformation_name, subtree) tuples.
    ///
    /// Returns:
    ///     (MatchStore, list of dropped indices)
    #[classmethod]
    fn from_wire(
        _cls: &Bound<'_, PyType>,
        tuples: Vec<PyTuple4>,
    ) -> PyResult<(PyMatchStore, Vec<RecordIndex>)> {
        let merge = MatchStore::from_wire(tuples.into_iter().map(WireTuple::from).collect())?;
        Ok((PyMatchStore { inner: merge.store }, merge.dropped))
    }

    /// Load a store from a JSON tuple file.
    #[classmethod]
    fn load(_cls: &Bound<'_, PyType>, path: &str) -> PyResult<(PyMatchStore, Vec<RecordIndex>)> {
        let merge = MatchStore::from_wire(load_tuples(path)?)?;
        Ok((PyMatchStore { inner: merge.store }, merge.dropped))
    }

    fn to_wire(&self) -> Vec<PyTuple4> {
        self.inner.to_wire().into_iter().map(PyTuple4::from).collect()
    }

    fn save(&self, path: &str) -> PyResult<()> {
        Ok(save_tuples(&self.inner.to_wire(), path)?)
    }

    fn __len__(&self) -> usize {
        self.inner.len()
    }

    fn __getitem__(&self, index: RecordIndex) -> PyResult<PyRecord> {
        let record = self.inner.get(index)?;
        Ok(PyRecord {
            inner: record.clone(),
        })
    }

    fn __contains__(&self, index: RecordIndex) -> bool {
        self.inner.contains(index)
    }

    fn records(&self) -> Vec<PyRecord> {
        self.inner
            .iter()
            .map(|record| PyRecord {
                inner: record.clone(),
            })
            .collect()
    }

    fn next_index(&self) -> RecordIndex {
        self.inner.next_index()
    }

    fn roots(&self) -> Vec<RecordIndex> {
        self.inner.roots()
    }

    fn chain(&self, index: RecordIndex) -> PyResult<Vec<RecordIndex>> {
        Ok(self.inner.chain(index)?)
    }

    #[pyo3(signature = (pattern_name=None, label=None))]
    fn select(&self, pattern_name: Option<String>, label: Option<String>) -> Vec<RecordIndex> {
        self.inner.select(&Selection { pattern_name, label })
    }

    /// Link (ancestor, transformation_name, tree) triples into the store.
    ///
    /// Returns:
    ///     (list of new indices, number of unchanged rewrites)
    fn link(&mut self, derivations: Vec<(RecordIndex, String, String)>) -> PyResult<(Vec<RecordIndex>, usize)> {
        let batch = derivations
            .iter()
            .map(|(ancestor, name, tree)| Derivation::from_bracket(*ancestor, name, tree))
            .collect::<Result<Vec<_>, _>>()
            .map_err(LineageError::from)?;
        let summary = link_batch(&mut self.inner, batch)?;
        Ok((summary.created, summary.unchanged))
    }

    /// Apply the rules of a transformation file with Tsurgeon.
    ///
    /// Returns:
    ///     list of (rule, created indices, unchanged, dropped)
    #[pyo3(signature = (transform_file, tsurgeon=None, exhaustive=0))]
    fn apply(
        &mut self,
        transform_file: &str,
        tsurgeon: Option<String>,
        exhaustive: usize,
    ) -> PyResult<Vec<(String, Vec<RecordIndex>, usize, usize)>> {
        let rules = read_transformations(transform_file).map_err(LineageError::from)?;
        let editor = tool_config(None, tsurgeon).editor();
        let report = TransformationDriver::new(editor)
            .with_exhaustive(exhaustive)
            .apply(&mut self.inner, &rules)?;
        Ok(outcome_tuples(report))
    }

    /// Apply an INI-style post-processing config with Tsurgeon.
    #[pyo3(signature = (config_file, tsurgeon=None))]
    fn post_process(
        &mut self,
        config_file: &str,
        tsurgeon: Option<String>,
    ) -> PyResult<Vec<(String, Vec<RecordIndex>, usize, usize)>> {
        let config = read_post_process_rules(config_file).map_err(LineageError::from)?;
        let editor = tool_config(None, tsurgeon).editor();
        let report = TransformationDriver::new(editor).post_process(&mut self.inner, &config)?;
        Ok(outcome_tuples(report))
    }

    fn print_derivations(&self) -> PyResult<String> {
        Ok(derivations_to_string(&self.inner)?)
    }

    fn report(&self) -> PyResult<String> {
        let mut buf = Vec::new();
        rust_report(&self.inner, &mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    fn __repr__(&self) -> String {
        format!("<MatchStore len={} roots={}>", self.inner.len(), self.inner.roots().len())
    }
}

fn tool_config(tregex: Option<String>, tsurgeon: Option<String>) -> ToolConfig {
    let mut config = ToolConfig::from_env();
    if let Some(tregex) = tregex {
        config.tregex = tregex.into();
    }
    if let Some(tsurgeon) = tsurgeon {
        config.tsurgeon = tsurgeon.into();
    }
    config
}

/// Extract matches of (name, pattern, label) triples from a corpus directory.
///
/// Args:
///     patterns: list of (name, tregex pattern, label)
///     corpus_dir: directory of bracketed tree files
///     tregex: path to the tregex script (default from environment)
///
/// Returns:
///     (MatchStore, number of skipped matches)
#[pyfunction]
#[pyo3(signature = (patterns, corpus_dir, tregex=None))]
fn extract(
    patterns: Vec<(String, String, String)>,
    corpus_dir: &str,
    tregex: Option<String>,
) -> PyResult<(PyMatchStore, usize)> {
    let specs: Vec<PatternSpec> = patterns
        .iter()
        .map(|(name, pattern, label)| PatternSpec::new(name, pattern, label))
        .collect();
    let corpus = Corpus::from_dir(corpus_dir).map_err(LineageError::from)?;
    let matcher = tool_config(tregex, None).matcher();
    let extraction = rust_extract(&specs, &matcher, &corpus)?;
    Ok((PyMatchStore { inner: extraction.store }, extraction.skipped))
}

/// Merge transformed tuples onto the original matches.
///
/// Returns:
///     (MatchStore, list of dropped indices)
#[pyfunction]
fn merge_matches(
    originals: &PyMatchStore,
    tuples: Vec<PyTuple4>,
) -> PyResult<(PyMatchStore, Vec<RecordIndex>)> {
    let merge = rust_merge_matches(
        &originals.inner,
        tuples.into_iter().map(WireTuple::from).collect(),
    )?;
    Ok((PyMatchStore { inner: merge.store }, merge.dropped))
}

#[pyfunction]
fn __version__() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[pymodule]
fn treelineage(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyRecord>()?;
    m.add_class::<PyMatchStore>()?;

    m.add_function(wrap_pyfunction!(extract, m)?)?;
    m.add_function(wrap_pyfunction!(merge_matches, m)?)?;
    m.add_function(wrap_pyfunction!(__version__, m)?)?;

    Ok(())
}
