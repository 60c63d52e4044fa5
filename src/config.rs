//! Locations of the external tools
//!
//! Defaults assume the Stanford Tregex/Tsurgeon wrapper scripts and the
//! companion transformer are on `PATH`. Each can be overridden from the
//! environment:
//!
//! - `TREELINEAGE_TREGEX`
//! - `TREELINEAGE_TSURGEON`
//! - `TREELINEAGE_COMPANION`

use std::ffi::OsString;
use std::path::PathBuf;

use crate::editor::TsurgeonEditor;
use crate::matcher::TregexMatcher;
use crate::wire::CompanionTransformer;

pub const TREGEX_VAR: &str = "TREELINEAGE_TREGEX";
pub const TSURGEON_VAR: &str = "TREELINEAGE_TSURGEON";
pub const COMPANION_VAR: &str = "TREELINEAGE_COMPANION";

/// Executable paths for the matcher, editor and companion transformer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolConfig {
    pub tregex: PathBuf,
    pub tsurgeon: PathBuf,
    pub companion: PathBuf,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            tregex: PathBuf::from("tregex.sh"),
            tsurgeon: PathBuf::from("tsurgeon.sh"),
            companion: PathBuf::from("transform.py"),
        }
    }
}

impl ToolConfig {
    /// Defaults overridden by the `TREELINEAGE_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var_os(key))
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    /// Empty values are ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<OsString>) -> Self {
        let mut config = Self::default();
        let overrides = [
            (TREGEX_VAR, &mut config.tregex),
            (TSURGEON_VAR, &mut config.tsurgeon),
            (COMPANION_VAR, &mut config.companion),
        ];
        for (key, slot) in overrides {
            if let Some(value) = lookup(key).filter(|value| !value.is_empty()) {
                *slot = PathBuf::from(value);
            }
        }
        config
    }

    pub fn matcher(&self) -> TregexMatcher {
        TregexMatcher::new(&self.tregex)
    }

    pub fn editor(&self) -> TsurgeonEditor {
        TsurgeonEditor::new(&self.tsurgeon)
    }

    pub fn companion(&self) -> CompanionTransformer {
        CompanionTransformer::new(&self.companion)
    }
}
