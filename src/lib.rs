//! Treelineage: derivation tracking for rewritten tree-pattern matches
//!
//! Extracts subtrees matching tree patterns from a bracketed corpus, rewrites
//! them with tree-surgery rules and records which match each rewrite came
//! from. Core implementation in Rust with Python bindings.

// Trees
pub mod parser; // Labeled-bracket grammar
pub mod tree; // Tree type, normalization and yields

// Lineage
pub mod error;
pub mod linker; // Derivations into new records
pub mod record; // Match records and provenance
pub mod store; // Indexed record table

// Rules and external tools
pub mod config; // Tool paths
pub mod driver; // Rule application through the editor
pub mod editor; // Tree editor trait + Tsurgeon
pub mod matcher; // Pattern matcher trait + Tregex
pub mod rules; // Transformation and post-processing files

// Corpus, output, interchange
pub mod corpus;
pub mod extract; // Matches into an initial store
pub mod report; // Derivation traces
pub mod wire; // Tuple wire format and merging

// Python bindings
#[cfg(feature = "pyo3")]
pub mod python;

// Re-exports for convenience
pub use config::ToolConfig;
pub use corpus::Corpus;
pub use driver::{DriverReport, RuleOutcome, TransformationDriver};
pub use editor::{EditorError, TreeEditor, TsurgeonEditor};
pub use error::{LineageError, Result};
pub use extract::{Extraction, PatternSpec, extract};
pub use linker::{Derivation, LinkSummary, link_batch};
pub use matcher::{PatternMatcher, TreeMatch, TregexMatcher};
pub use parser::{TreeError, parse_tree};
pub use record::{MatchRecord, MatchSource, RecordIndex};
pub use report::{print_derivations, report};
pub use rules::{PostProcessRules, Rule, read_post_process_rules, read_transformations};
pub use store::{MatchStore, Selection};
pub use tree::Tree;
pub use wire::{CompanionTransformer, Merge, WireTuple, merge_matches};
