//! Tree editor interface and the Tsurgeon subprocess implementation
//!
//! The editor rewrites a batch of labeled-bracket trees with one
//! pattern/script pair and returns the results in input order. It is called
//! once per rule over the whole batch.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use bstr::ByteSlice;
use log::{debug, info};
use tempfile::NamedTempFile;
use thiserror::Error;

/// Failure of the external tree editor
#[derive(Debug, Error)]
pub enum EditorError {
    #[error("Editor error: failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Editor error: {program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("Editor error: could not stage input trees: {0}")]
    Staging(#[source] std::io::Error),

    #[error("Editor error: {0}")]
    Output(String),
}

/// Rewrites trees matching `pattern` with `script`.
///
/// Implementations return exactly one output tree per input tree, in input
/// order. An output entry may be ill-formed; callers treat such entries as
/// dropped rather than failing the batch.
pub trait TreeEditor {
    fn edit(&self, trees: &[String], pattern: &str, script: &str)
    -> Result<Vec<String>, EditorError>;
}

impl<F> TreeEditor for F
where
    F: Fn(&[String], &str, &str) -> Result<Vec<String>, EditorError>,
{
    fn edit(
        &self,
        trees: &[String],
        pattern: &str,
        script: &str,
    ) -> Result<Vec<String>, EditorError> {
        self(trees, pattern, script)
    }
}

/// Runs the Tsurgeon command-line tool (`tsurgeon.sh`)
#[derive(Debug, Clone)]
pub struct TsurgeonEditor {
    program: PathBuf,
}

impl TsurgeonEditor {
    pub fn new(program: impl AsRef<Path>) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl Default for TsurgeonEditor {
    fn default() -> Self {
        Self::new("tsurgeon.sh")
    }
}

impl TreeEditor for TsurgeonEditor {
    fn edit(
        &self,
        trees: &[String],
        pattern: &str,
        script: &str,
    ) -> Result<Vec<String>, EditorError> {
        if trees.is_empty() {
            return Ok(Vec::new());
        }

        // One tree per line
        let mut tree_file = NamedTempFile::new().map_err(EditorError::Staging)?;
        tree_file
            .write_all(trees.join("\n").as_bytes())
            .and_then(|_| tree_file.flush())
            .map_err(EditorError::Staging)?;

        let program = self.program.display().to_string();
        info!("running {} over {} trees", program, trees.len());
        debug!("pattern: {}, script: {}", pattern, script);

        let output = Command::new(&self.program)
            .arg("-s")
            .arg("-treeFile")
            .arg(tree_file.path())
            .arg("-po")
            .arg(pattern)
            .arg(script)
            .output()
            .map_err(|source| EditorError::Spawn {
                program: program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(EditorError::Failed {
                program,
                status: output.status.to_string(),
                stderr: output.stderr.to_str_lossy().trim().to_string(),
            });
        }

        split_output(&output.stdout)
    }
}

/// Split editor stdout into one string per tree.
///
/// Surrounding whitespace is trimmed first, so an empty output still yields
/// a single (empty, hence ill-formed) entry.
fn split_output(stdout: &[u8]) -> Result<Vec<String>, EditorError> {
    let text = stdout
        .trim()
        .to_str()
        .map_err(|e| EditorError::Output(format!("output is not valid UTF-8: {}", e)))?;
    Ok(text
        .split('\n')
        .map(|line| line.trim_end_matches('\r').to_string())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_output() {
        let out = split_output(b"(NP (NN cat))\r\n(NP (NN dog))\n\n").unwrap();
        assert_eq!(out, vec!["(NP (NN cat))", "(NP (NN dog))"]);
    }

    #[test]
    fn test_split_empty_output() {
        assert_eq!(split_output(b"  \n").unwrap(), vec![String::new()]);
    }

    #[test]
    fn test_split_invalid_utf8() {
        assert!(matches!(
            split_output(b"(NP (NN \xff))"),
            Err(EditorError::Output(_))
        ));
    }

    #[test]
    fn test_closure_editor() {
        let upper = |trees: &[String], _: &str, _: &str| -> Result<Vec<String>, EditorError> {
            Ok(trees.iter().map(|t| t.to_uppercase()).collect())
        };
        let out = upper.edit(&["(np (nn cat))".to_string()], "NP", "noop").unwrap();
        assert_eq!(out, vec!["(NP (NN CAT))"]);
    }

    #[test]
    fn test_empty_batch_skips_process() {
        let editor = TsurgeonEditor::new("/nonexistent/tsurgeon.sh");
        assert!(editor.edit(&[], "NP", "prune x").unwrap().is_empty());
    }

    #[cfg(unix)]
    mod subprocess {
        use super::*;
        use std::fs;
        use std::os::unix::fs::PermissionsExt;
        use tempfile::TempDir;

        fn script(dir: &TempDir, body: &str) -> PathBuf {
            let path = dir.path().join("tsurgeon.sh");
            fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        #[test]
        fn test_echoes_tree_file() {
            let dir = tempfile::tempdir().unwrap();
            // $3 is the tree file: -s -treeFile FILE -po PATTERN SCRIPT
            let editor = TsurgeonEditor::new(script(&dir, "cat \"$3\""));
            let trees = vec!["(NP (NN cat))".to_string(), "(VP (VB go))".to_string()];

            assert_eq!(editor.edit(&trees, "NP", "prune x").unwrap(), trees);
        }

        #[test]
        fn test_nonzero_exit() {
            let dir = tempfile::tempdir().unwrap();
            let editor = TsurgeonEditor::new(script(&dir, "echo boom >&2; exit 3"));
            let result = editor.edit(&["(NP (NN cat))".to_string()], "NP", "prune x");

            match result {
                Err(EditorError::Failed { stderr, .. }) => assert_eq!(stderr, "boom"),
                other => panic!("Expected Failed, got {:?}", other),
            }
        }

        #[test]
        fn test_missing_program() {
            let editor = TsurgeonEditor::new("/nonexistent/tsurgeon.sh");
            let result = editor.edit(&["(NP (NN cat))".to_string()], "NP", "prune x");
            assert!(matches!(result, Err(EditorError::Spawn { .. })));
        }
    }
}
