//! Labeled-bracket constituency trees
//!
//! Trees are always held in normalized form so that two renderings of the
//! same constituent compare equal no matter which tool produced them.

use std::fmt;
use std::str::FromStr;

use crate::parser::{TreeError, parse_tree};

/// A constituency tree: a phrasal/preterminal node or a terminal word
///
/// Traversals recurse once per level, so inputs are assumed to be sentence-depth trees.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tree {
    Leaf(String),
    /// An unlabeled node (e.g. the outer wrapper of `( (S ...))`) has an
    /// empty label.
    Node { label: String, children: Vec<Tree> },
}

/// Penn Treebank escapes for bracket characters inside terminals
const BRACKET_ESCAPES: [(&str, &str); 6] = [
    ("-LRB-", "("),
    ("-RRB-", ")"),
    ("-LSB-", "["),
    ("-RSB-", "]"),
    ("-LCB-", "{"),
    ("-RCB-", "}"),
];

impl Tree {
    /// Parse a labeled-bracket string into a normalized tree
    pub fn parse(text: &str) -> Result<Self, TreeError> {
        parse_tree(text)
    }

    /// Create a leaf
    pub fn leaf(word: &str) -> Self {
        Tree::Leaf(word.to_string())
    }

    /// Create a node with the given label and children
    pub fn node(label: &str, children: Vec<Tree>) -> Self {
        Tree::Node {
            label: label.to_string(),
            children,
        }
    }

    /// Label of a node; `None` for leaves
    pub fn label(&self) -> Option<&str> {
        match self {
            Tree::Leaf(_) => None,
            Tree::Node { label, .. } => Some(label),
        }
    }

    pub fn children(&self) -> &[Tree] {
        match self {
            Tree::Leaf(_) => &[],
            Tree::Node { children, .. } => children,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Tree::Leaf(_))
    }

    /// Canonical form used for every stored tree and every comparison.
    ///
    /// Strips unlabeled single-child wrappers at the root and collapses unary
    /// chains of nodes sharing a label, so `(NP (NP x))` becomes `(NP x)`.
    pub fn normalized(self) -> Self {
        let mut tree = self.collapse_unary();
        while let Tree::Node { label, children } = &mut tree {
            if !label.is_empty() || children.len() != 1 || children[0].is_leaf() {
                break;
            }
            let inner = children.swap_remove(0);
            tree = inner;
        }
        tree
    }

    fn collapse_unary(self) -> Self {
        match self {
            Tree::Leaf(word) => Tree::Leaf(word),
            Tree::Node { label, children } => {
                let mut children: Vec<Tree> =
                    children.into_iter().map(Tree::collapse_unary).collect();
                if children.len() == 1
                    && !label.is_empty()
                    && children[0].label() == Some(label.as_str())
                {
                    return children.swap_remove(0);
                }
                Tree::Node { label, children }
            }
        }
    }

    /// Terminal words in left-to-right order, as they appear in the tree
    pub fn leaves(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Tree::Leaf(word) => out.push(word),
            Tree::Node { children, .. } => {
                for child in children {
                    child.collect_leaves(out);
                }
            }
        }
    }

    /// Space-separated terminal yield with bracket escapes undone
    pub fn terminal_yield(&self) -> String {
        self.leaves()
            .into_iter()
            .map(unescape_brackets)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Total number of nodes, leaves included
    pub fn node_count(&self) -> usize {
        1 + self.children().iter().map(Tree::node_count).sum::<usize>()
    }

    /// The `number`-th node in pre-order, counting from 1 and including
    /// leaves. This is the node numbering reported by the external matcher.
    pub fn nth_node(&self, number: usize) -> Option<&Tree> {
        let mut remaining = number;
        let mut stack = vec![self];
        while let Some(tree) = stack.pop() {
            remaining = remaining.checked_sub(1)?;
            if remaining == 0 {
                return Some(tree);
            }
            stack.extend(tree.children().iter().rev());
        }
        None
    }
}

/// Undo Penn Treebank bracket escaping in a single terminal
pub fn unescape_brackets(word: &str) -> &str {
    BRACKET_ESCAPES
        .iter()
        .find(|(escaped, _)| *escaped == word)
        .map(|(_, plain)| *plain)
        .unwrap_or(word)
}

impl fmt::Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tree::Leaf(word) => f.write_str(word),
            Tree::Node { label, children } => {
                write!(f, "({}", label)?;
                for child in children {
                    write!(f, " {}", child)?;
                }
                f.write_str(")")
            }
        }
    }
}

impl FromStr for Tree {
    type Err = TreeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_tree(s)
    }
}
