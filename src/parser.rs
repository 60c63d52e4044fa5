//! Labeled-bracket tree parser
//!
//! Parses Penn Treebank style bracket strings into `Tree` values using a pest grammar.

use pest::Parser;
use pest::iterators::Pair;
use pest_derive::Parser;
use thiserror::Error;

use crate::tree::Tree;

#[derive(Parser)]
#[grammar = "bracket.pest"]
struct BracketParser;

/// Error type for ill-formed trees
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("Malformed tree: {0}")]
    Syntax(String),

    #[error("Malformed tree: empty input")]
    Empty,
}

impl From<pest::error::Error<Rule>> for TreeError {
    fn from(err: pest::error::Error<Rule>) -> Self {
        TreeError::Syntax(err.to_string())
    }
}

/// Parse a labeled-bracket string into a normalized tree
pub fn parse_tree(input: &str) -> Result<Tree, TreeError> {
    parse_tree_verbatim(input).map(Tree::normalized)
}

/// Parse a labeled-bracket string without normalizing it
pub fn parse_tree_verbatim(input: &str) -> Result<Tree, TreeError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(TreeError::Empty);
    }

    let mut pairs = BracketParser::parse(Rule::tree, input)?;

    let Some(tree_pair) = pairs.next() else {
        return Err(TreeError::Empty);
    };
    let Some(root) = tree_pair
        .into_inner()
        .find(|pair| pair.as_rule() == Rule::node)
    else {
        return Err(TreeError::Empty);
    };

    Ok(build_node(root))
}

/// Build a node from a `node` pair: optional label followed by children
fn build_node(pair: Pair<Rule>) -> Tree {
    let mut label = String::new();
    let mut children = Vec::new();

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::label => label = inner.as_str().to_string(),
            Rule::leaf => children.push(Tree::Leaf(inner.as_str().to_string())),
            Rule::node => children.push(build_node(inner)),
            _ => {}
        }
    }

    Tree::Node { label, children }
}
