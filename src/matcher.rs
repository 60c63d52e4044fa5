//! Pattern matcher interface and the Tregex subprocess implementation

use std::path::{Path, PathBuf};
use std::process::Command;

use atoi::FromRadix10Checked;
use bstr::ByteSlice;
use log::{debug, info};
use memchr::memchr;
use thiserror::Error;

/// One match reported by the matcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TreeMatch {
    /// Absolute tree number across the corpus, counting from 1
    pub tree: usize,
    /// Pre-order node number within the tree, counting from 1
    pub node: usize,
}

/// Failure of the external pattern matcher
#[derive(Debug, Error)]
pub enum MatcherError {
    #[error("Matcher error: failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Matcher error: {program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },
}

/// Finds the nodes matching a tree pattern in a directory of tree files
pub trait PatternMatcher {
    fn find(&self, pattern: &str, corpus_dir: &Path) -> Result<Vec<TreeMatch>, MatcherError>;
}

impl<F> PatternMatcher for F
where
    F: Fn(&str, &Path) -> Result<Vec<TreeMatch>, MatcherError>,
{
    fn find(&self, pattern: &str, corpus_dir: &Path) -> Result<Vec<TreeMatch>, MatcherError> {
        self(pattern, corpus_dir)
    }
}

/// Runs the Tregex command-line tool (`tregex.sh`), which prints one
/// `tree:node` pair per match when called with `-x`
#[derive(Debug, Clone)]
pub struct TregexMatcher {
    program: PathBuf,
}

impl TregexMatcher {
    pub fn new(program: impl AsRef<Path>) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
        }
    }
}

impl Default for TregexMatcher {
    fn default() -> Self {
        Self::new("tregex.sh")
    }
}

impl PatternMatcher for TregexMatcher {
    fn find(&self, pattern: &str, corpus_dir: &Path) -> Result<Vec<TreeMatch>, MatcherError> {
        let program = self.program.display().to_string();
        info!("running {} on {}", program, corpus_dir.display());

        let output = Command::new(&self.program)
            .arg("-x")
            .arg(pattern)
            .arg(corpus_dir)
            .output()
            .map_err(|source| MatcherError::Spawn {
                program: program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(MatcherError::Failed {
                program,
                status: output.status.to_string(),
                stderr: output.stderr.to_str_lossy().trim().to_string(),
            });
        }

        let matches = parse_matches(&output.stdout);
        debug!("{} matches for {}", matches.len(), pattern);
        Ok(matches)
    }
}

/// Parse `tree:node` lines; anything else (headers, blank lines) is ignored
pub fn parse_matches(output: &[u8]) -> Vec<TreeMatch> {
    output
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            let colon = memchr(b':', line)?;
            let tree = parse_number(&line[..colon])?;
            let node = parse_number(&line[colon + 1..])?;
            Some(TreeMatch { tree, node })
        })
        .collect()
}

/// Parse a whole byte slice as a decimal number; `None` on overflow
fn parse_number(bytes: &[u8]) -> Option<usize> {
    let (value, used) = usize::from_radix_10_checked(bytes);
    if used == 0 || used != bytes.len() {
        return None;
    }
    value
}
