//! Extraction: seed a match store from tree-pattern matches
//!
//! The extraction pipeline:
//! 1. Run the matcher once per pattern over the corpus directory
//! 2. Resolve each (tree, node) pair to its file, relative tree number and subtree
//! 3. Number the resulting records in pattern order, then match order

use log::{info, warn};

use crate::corpus::Corpus;
use crate::error::Result;
use crate::matcher::PatternMatcher;
use crate::record::{Extracted, MatchSource};
use crate::store::MatchStore;

/// A named tree pattern and the annotation label it targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternSpec {
    pub name: String,
    pub pattern: String,
    pub label: String,
}

impl PatternSpec {
    pub fn new(name: &str, pattern: &str, label: &str) -> Self {
        Self {
            name: name.to_string(),
            pattern: pattern.to_string(),
            label: label.to_string(),
        }
    }
}

/// Result of an extraction run
#[derive(Debug, Clone)]
pub struct Extraction {
    pub store: MatchStore,
    /// Matches that could not be resolved to a well-formed subtree
    pub skipped: usize,
}

/// Collect the subtrees matching each pattern into a fresh store
pub fn extract(
    patterns: &[PatternSpec],
    matcher: &impl PatternMatcher,
    corpus: &Corpus,
) -> Result<Extraction> {
    let mut extracted = Vec::new();
    let mut skipped = 0;

    for spec in patterns {
        let matches = matcher.find(&spec.pattern, corpus.dir())?;
        info!("pattern {}: {} matches", spec.name, matches.len());

        for found in matches {
            let location = corpus.locate(found.tree);
            let subtree = corpus.subtree(found.tree, found.node);
            let (Some(location), Ok(subtree)) = (location, subtree) else {
                warn!(
                    "pattern {}: skipping unresolvable match {}:{}",
                    spec.name, found.tree, found.node
                );
                skipped += 1;
                continue;
            };

            extracted.push(Extracted {
                source: MatchSource {
                    pattern_name: spec.name.clone(),
                    label: spec.label.clone(),
                    source_file: location.file_name,
                    relative_tree_number: location.relative_tree_number,
                    node_number: found.node,
                },
                subtree,
            });
        }
    }

    Ok(Extraction {
        store: MatchStore::create_initial(extracted),
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LineageError;
    use crate::matcher::{MatcherError, TreeMatch};
    use std::path::Path;

    const TREES: &str = "(S (NP (DT the) (NN price)) (VP (VBD increased)))\n\
                         (S (NP (NNS sales)) (VP (VBD fell)))\n";

    fn corpus() -> Corpus {
        Corpus::from_texts("parses", [("a.mrg", TREES), ("b.mrg", "(S (NP (NN x)) (VP (VB y))\n")])
    }

    fn fake_matcher(pattern: &str, _: &Path) -> Result<Vec<TreeMatch>, MatcherError> {
        Ok(match pattern {
            // NP in both trees of a.mrg
            "NP" => vec![TreeMatch { tree: 1, node: 2 }, TreeMatch { tree: 2, node: 2 }],
            // VP of the first tree, then junk: unknown tree, unknown node, ill-formed tree
            "VP" => vec![
                TreeMatch { tree: 1, node: 7 },
                TreeMatch { tree: 9, node: 1 },
                TreeMatch { tree: 2, node: 40 },
                TreeMatch { tree: 3, node: 1 },
            ],
            _ => Vec::new(),
        })
    }

    #[test]
    fn test_extract_orders_by_pattern_then_match() {
        let patterns = vec![
            PatternSpec::new("p1", "NP", "increase"),
            PatternSpec::new("p2", "VP", "change"),
        ];
        let extraction = extract(&patterns, &fake_matcher, &corpus()).unwrap();
        let store = extraction.store;

        assert_eq!(store.len(), 3);
        assert_eq!(extraction.skipped, 3);

        let first = store.get(0).unwrap();
        assert_eq!(first.substring, "the price");
        assert_eq!(first.source.pattern_name, "p1");
        assert_eq!(first.source.label, "increase");
        assert_eq!(first.source.source_file, "a.mrg");
        assert_eq!(first.source.relative_tree_number, 1);
        assert_eq!(first.source.node_number, 2);

        assert_eq!(store.get(1).unwrap().substring, "sales");
        assert_eq!(store.get(1).unwrap().source.relative_tree_number, 2);

        let third = store.get(2).unwrap();
        assert_eq!(third.source.pattern_name, "p2");
        assert_eq!(third.substring, "increased");
        assert!(store.iter().all(|r| r.is_original()));
    }

    #[test]
    fn test_matcher_failure_propagates() {
        let failing = |_: &str, _: &Path| -> Result<Vec<TreeMatch>, MatcherError> {
            Err(MatcherError::Failed {
                program: "tregex.sh".to_string(),
                status: "exit status: 1".to_string(),
                stderr: "bad pattern".to_string(),
            })
        };
        let result = extract(&[PatternSpec::new("p1", "NP <", "x")], &failing, &corpus());
        assert!(matches!(result, Err(LineageError::Matcher(_))));
    }
}
