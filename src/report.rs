//! Plain-text derivation reports
//!
//! `print_derivations` renders each derivation tree depth-first:
//!
//! ```text
//! ------------------------------------------------------------------------------
//! 1 : increase ( 0 )
//! ------------------------------------------------------------------------------
//!  the cat
//!      === drop-det ===>
//!          cat
//!
//! ```

use std::io::Write;

use crate::error::Result;
use crate::record::MatchRecord;
use crate::store::MatchStore;

const RULE_WIDTH: usize = 78;
const INDENT_STEP: usize = 4;

/// Print every non-trivial derivation, one block per root
pub fn print_derivations<W: Write>(store: &MatchStore, out: &mut W) -> Result<()> {
    let separator = "-".repeat(RULE_WIDTH);
    for (n, index) in store.roots().into_iter().enumerate() {
        let root = store.get(index)?;
        writeln!(out, "{}", separator)?;
        writeln!(out, "{} : {} ( {} )", n + 1, root.source.label, root.index)?;
        writeln!(out, "{}", separator)?;
        print_steps(store, root, 0, out)?;
        writeln!(out)?;
    }
    Ok(())
}

fn print_steps<W: Write>(
    store: &MatchStore,
    record: &MatchRecord,
    indent: usize,
    out: &mut W,
) -> Result<()> {
    writeln!(out, "{:indent$} {}", "", record.substring)?;
    for &index in record.descendants() {
        let descendant = store.get(index)?;
        let name = descendant.transformation_name.as_deref().unwrap_or_default();
        writeln!(out, "{:width$} === {} ===>", "", name, width = indent + INDENT_STEP)?;
        print_steps(store, descendant, indent + 2 * INDENT_STEP, out)?;
    }
    Ok(())
}

/// `print_derivations` into a string
pub fn derivations_to_string(store: &MatchStore) -> Result<String> {
    let mut buf = Vec::new();
    print_derivations(store, &mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Flat listing of every derived record next to its direct ancestor
pub fn report<W: Write>(store: &MatchStore, out: &mut W) -> Result<()> {
    for record in store.iter() {
        let (Some(ancestor), Some(name)) = (record.ancestor, &record.transformation_name) else {
            continue;
        };
        let ancestor = store.get(ancestor)?;
        writeln!(out, "{} :", name)?;
        writeln!(out, "{} : {}", ancestor.index, ancestor.substring)?;
        writeln!(out, "==>")?;
        writeln!(out, "{} : {}", record.index, record.substring)?;
        writeln!(out)?;
    }
    Ok(())
}
