//! Transformation driver
//!
//! Applies an ordered list of rewrite rules to the records of a store. Each
//! rule is one editor call over the whole input batch; the results are paired
//! back with their inputs by position and handed to the linker.

use log::{debug, info, warn};

use crate::editor::TreeEditor;
use crate::error::{LineageError, Result};
use crate::linker::{Derivation, link_batch};
use crate::record::RecordIndex;
use crate::rules::{PostProcessRules, Rule};
use crate::store::{MatchStore, Selection};
use crate::tree::Tree;

/// What one rule did to the store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleOutcome {
    pub rule: String,
    /// New records, in creation order
    pub created: Vec<RecordIndex>,
    /// Rewrites identical to their input
    pub unchanged: usize,
    /// Editor outputs that were not well-formed trees
    pub dropped: usize,
    /// Editor calls made for this rule
    pub rounds: usize,
}

/// Per-rule outcomes of a driver run, in application order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriverReport {
    pub rules: Vec<RuleOutcome>,
}

impl DriverReport {
    pub fn created(&self) -> usize {
        self.rules.iter().map(|outcome| outcome.created.len()).sum()
    }

    pub fn dropped(&self) -> usize {
        self.rules.iter().map(|outcome| outcome.dropped).sum()
    }
}

/// Drives rule application through a `TreeEditor`
#[derive(Debug, Clone)]
pub struct TransformationDriver<E> {
    editor: E,
    /// Extra rounds a rule may run on its own output
    exhaustive_rounds: usize,
}

impl<E: TreeEditor> TransformationDriver<E> {
    pub fn new(editor: E) -> Self {
        Self {
            editor,
            exhaustive_rounds: 0,
        }
    }

    /// Re-apply each rule to the records it just created, for up to
    /// `max_rounds` extra rounds or until a round creates nothing
    pub fn with_exhaustive(mut self, max_rounds: usize) -> Self {
        self.exhaustive_rounds = max_rounds;
        self
    }

    pub fn editor(&self) -> &E {
        &self.editor
    }

    /// Apply `rules` in order to every record in the store
    pub fn apply(&self, store: &mut MatchStore, rules: &[Rule]) -> Result<DriverReport> {
        self.apply_selected(store, rules, &Selection::all())
    }

    /// Apply `rules` in order to the records `selection` matches.
    ///
    /// The input of each rule is taken just before it runs, so later rules see
    /// the records earlier rules created.
    pub fn apply_selected(
        &self,
        store: &mut MatchStore,
        rules: &[Rule],
        selection: &Selection,
    ) -> Result<DriverReport> {
        let mut report = DriverReport::default();
        for rule in rules {
            let inputs = store.select(selection);
            let outcome = self.apply_rule(store, rule, inputs)?;
            info!(
                "rule {}: {} created, {} unchanged, {} dropped",
                outcome.rule,
                outcome.created.len(),
                outcome.unchanged,
                outcome.dropped
            );
            report.rules.push(outcome);
        }
        Ok(report)
    }

    /// Apply each target's rules to the records its pattern produced
    pub fn post_process(
        &self,
        store: &mut MatchStore,
        config: &PostProcessRules,
    ) -> Result<DriverReport> {
        let mut report = DriverReport::default();
        for (target, rules) in config.iter() {
            debug!("post-processing {} with {} rules", target, rules.len());
            let target_report = self.apply_selected(store, rules, &Selection::by_pattern(target))?;
            report.rules.extend(target_report.rules);
        }
        Ok(report)
    }

    /// Run one rule to completion. On error every record the rule created
    /// is removed again, so a failed rule leaves the store as it found it.
    fn apply_rule(
        &self,
        store: &mut MatchStore,
        rule: &Rule,
        inputs: Vec<RecordIndex>,
    ) -> Result<RuleOutcome> {
        let mut outcome = RuleOutcome {
            rule: rule.name.clone(),
            ..Default::default()
        };

        let checkpoint = store.len();
        if let Err(e) = self.run_rounds(store, rule, inputs, &mut outcome) {
            warn!(
                "rule {}: failed after {} rounds, discarding {} records",
                rule.name,
                outcome.rounds,
                store.len() - checkpoint
            );
            store.truncate(checkpoint);
            return Err(e);
        }

        Ok(outcome)
    }

    fn run_rounds(
        &self,
        store: &mut MatchStore,
        rule: &Rule,
        inputs: Vec<RecordIndex>,
        outcome: &mut RuleOutcome,
    ) -> Result<()> {
        let mut batch = inputs;
        while !batch.is_empty() && outcome.rounds <= self.exhaustive_rounds {
            let (created, unchanged, dropped) = self.run_round(store, rule, &batch)?;
            outcome.rounds += 1;
            outcome.unchanged += unchanged;
            outcome.dropped += dropped;
            outcome.created.extend_from_slice(&created);
            batch = created;
        }
        Ok(())
    }

    /// One editor call over `batch`, linked into the store.
    /// Returns (created, unchanged, dropped).
    fn run_round(
        &self,
        store: &mut MatchStore,
        rule: &Rule,
        batch: &[RecordIndex],
    ) -> Result<(Vec<RecordIndex>, usize, usize)> {
        let trees = batch
            .iter()
            .map(|&index| store.get(index).map(|record| record.subtree.to_string()))
            .collect::<Result<Vec<_>>>()?;

        let outputs = self.editor.edit(&trees, &rule.pattern, &rule.script)?;
        if outputs.len() != trees.len() {
            return Err(LineageError::Alignment {
                expected: trees.len(),
                actual: outputs.len(),
            });
        }

        let mut derivations = Vec::with_capacity(outputs.len());
        let mut dropped = 0;
        for (&ancestor, output) in batch.iter().zip(&outputs) {
            match Tree::parse(output) {
                Ok(tree) => derivations.push(Derivation::new(ancestor, &rule.name, tree)),
                Err(e) => {
                    warn!("rule {}: dropping output for record {}: {}", rule.name, ancestor, e);
                    dropped += 1;
                }
            }
        }

        let summary = link_batch(store, derivations)?;
        Ok((summary.created, summary.unchanged, dropped))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::EditorError;
    use crate::record::{Extracted, MatchSource};
    use crate::rules::parse_post_process_rules;
    use crate::store::assert_lineage_consistent;
    use std::cell::Cell;

    /// Treats the pattern as a substring and the script as its replacement,
    /// rewriting the first occurrence only
    #[derive(Default)]
    struct ReplaceEditor {
        calls: Cell<usize>,
    }

    impl TreeEditor for ReplaceEditor {
        fn edit(
            &self,
            trees: &[String],
            pattern: &str,
            script: &str,
        ) -> Result<Vec<String>, EditorError> {
            self.calls.set(self.calls.get() + 1);
            Ok(trees
                .iter()
                .map(|tree| tree.replacen(pattern, script, 1))
                .collect())
        }
    }

    /// Like `ReplaceEditor`, but call number `failing_call` (from 1) fails
    struct FailingEditor {
        failing_call: usize,
        inner: ReplaceEditor,
    }

    impl FailingEditor {
        fn on_call(failing_call: usize) -> Self {
            Self {
                failing_call,
                inner: ReplaceEditor::default(),
            }
        }
    }

    impl TreeEditor for FailingEditor {
        fn edit(
            &self,
            trees: &[String],
            pattern: &str,
            script: &str,
        ) -> Result<Vec<String>, EditorError> {
            if self.inner.calls.get() + 1 == self.failing_call {
                self.inner.calls.set(self.failing_call);
                return Err(EditorError::Output("tsurgeon crashed".to_string()));
            }
            self.inner.edit(trees, pattern, script)
        }
    }

    fn store_with(records: &[(&str, &str, &str)]) -> MatchStore {
        MatchStore::create_initial(records.iter().map(|&(pattern, label, tree)| Extracted {
            source: MatchSource {
                pattern_name: pattern.to_string(),
                label: label.to_string(),
                ..Default::default()
            },
            subtree: Tree::parse(tree).unwrap(),
        }))
    }

    fn drop_det() -> Rule {
        Rule::new("drop-det", "(DT the) ", "")
    }

    #[test]
    fn test_apply_single_rule() {
        let mut store = store_with(&[
            ("p1", "increase", "(NP (DT the) (NN cat))"),
            ("p1", "increase", "(NP (NNS dogs))"),
        ]);
        let driver = TransformationDriver::new(ReplaceEditor::default());
        let report = driver.apply(&mut store, &[drop_det()]).unwrap();

        assert_eq!(
            report.rules,
            vec![RuleOutcome {
                rule: "drop-det".to_string(),
                created: vec![2],
                unchanged: 1,
                dropped: 0,
                rounds: 1,
            }]
        );
        let record = store.get(2).unwrap();
        assert_eq!(record.ancestor, Some(0));
        assert_eq!(record.origin, 0);
        assert_eq!(record.substring, "cat");
        assert_eq!(store.get(0).unwrap().descendants(), &[2]);
        assert_eq!(driver.editor().calls.get(), 1);
    }

    #[test]
    fn test_later_rules_see_earlier_outputs() {
        let mut store = store_with(&[("p1", "increase", "(NP (DT the) (NN cat))")]);
        let rules = [drop_det(), Rule::new("plural", "(NN cat)", "(NNS cats)")];
        let report = TransformationDriver::new(ReplaceEditor::default())
            .apply(&mut store, &rules)
            .unwrap();

        assert_eq!(report.rules[0].created, vec![1]);
        assert_eq!(report.rules[1].created, vec![2, 3]);
        assert_eq!(report.created(), 3);

        assert_eq!(store.get(2).unwrap().ancestor, Some(0));
        assert_eq!(store.get(2).unwrap().substring, "the cats");
        let chained = store.get(3).unwrap();
        assert_eq!(chained.ancestor, Some(1));
        assert_eq!(chained.origin, 0);
        assert_eq!(chained.substring, "cats");
        assert_eq!(store.get(0).unwrap().descendants(), &[1, 2]);
        assert_lineage_consistent(&store);
    }

    #[test]
    fn test_rule_not_reapplied_to_own_output() {
        let mut store = store_with(&[("p1", "x", "(NP (JJ big) (JJ big) (NN cat))")]);
        let strip = Rule::new("strip-adj", "(JJ big) ", "");
        let report = TransformationDriver::new(ReplaceEditor::default())
            .apply(&mut store, &[strip])
            .unwrap();

        assert_eq!(report.rules[0].created, vec![1]);
        assert_eq!(report.rules[0].rounds, 1);
        assert_eq!(store.get(1).unwrap().substring, "big cat");
    }

    #[test]
    fn test_exhaustive_rounds_until_fixpoint() {
        let mut store = store_with(&[("p1", "x", "(NP (JJ big) (JJ big) (NN cat))")]);
        let strip = Rule::new("strip-adj", "(JJ big) ", "");
        let driver = TransformationDriver::new(ReplaceEditor::default()).with_exhaustive(5);
        let report = driver.apply(&mut store, &[strip]).unwrap();

        let outcome = &report.rules[0];
        assert_eq!(outcome.created, vec![1, 2]);
        assert_eq!(outcome.rounds, 3);
        assert_eq!(outcome.unchanged, 1);
        assert_eq!(store.chain(2).unwrap(), vec![2, 1, 0]);
        assert_eq!(store.get(2).unwrap().substring, "cat");
    }

    #[test]
    fn test_exhaustive_rounds_are_bounded() {
        let mut store = store_with(&[("p1", "x", "(NP (NN cat))")]);
        let grow = Rule::new("grow", "(NN cat)", "(NN cat) (NN cat)");
        let driver = TransformationDriver::new(ReplaceEditor::default()).with_exhaustive(2);
        let report = driver.apply(&mut store, &[grow]).unwrap();

        assert_eq!(report.rules[0].rounds, 3);
        assert_eq!(report.rules[0].created, vec![1, 2, 3]);
        assert_eq!(driver.editor().calls.get(), 3);
    }

    #[test]
    fn test_alignment_error_leaves_store_unchanged() {
        fn short(trees: &[String], _: &str, _: &str) -> Result<Vec<String>, EditorError> {
            Ok(trees.iter().skip(1).cloned().collect())
        }
        let mut store = store_with(&[
            ("p1", "x", "(NP (DT the) (NN cat))"),
            ("p1", "x", "(NP (DT the) (NN dog))"),
        ]);
        let result = TransformationDriver::new(short).apply(&mut store, &[drop_det()]);

        assert!(matches!(
            result,
            Err(LineageError::Alignment {
                expected: 2,
                actual: 1
            })
        ));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_alignment_error_on_extra_output() {
        fn doubled(trees: &[String], _: &str, _: &str) -> Result<Vec<String>, EditorError> {
            Ok(trees.iter().flat_map(|t| [t.clone(), t.clone()]).collect())
        }
        let mut store = store_with(&[("p1", "x", "(NP (DT the) (NN cat))")]);
        let result = TransformationDriver::new(doubled).apply(&mut store, &[drop_det()]);

        assert!(matches!(
            result,
            Err(LineageError::Alignment {
                expected: 1,
                actual: 2
            })
        ));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_failed_exhaustive_round_discards_earlier_rounds() {
        let mut store = store_with(&[("p1", "x", "(NP (DT the) (NN cat))")]);
        let driver = TransformationDriver::new(FailingEditor::on_call(2)).with_exhaustive(3);
        let result = driver.apply(&mut store, &[drop_det()]);

        assert!(matches!(result, Err(LineageError::Editor(_))));
        assert_eq!(driver.editor().inner.calls.get(), 2);
        assert_eq!(store.len(), 1);
        assert_eq!(store.next_index(), 1);
        assert!(store.get(0).unwrap().descendants().is_empty());
        assert_lineage_consistent(&store);
    }

    #[test]
    fn test_failed_rule_keeps_earlier_rules() {
        let mut store = store_with(&[("p1", "x", "(NP (DT the) (NN cat))")]);
        let rules = [drop_det(), Rule::new("plural", "(NN cat)", "(NNS cats)")];
        let result = TransformationDriver::new(FailingEditor::on_call(2)).apply(&mut store, &rules);

        assert!(matches!(result, Err(LineageError::Editor(_))));
        assert_eq!(store.len(), 2);
        let kept = store.get(1).unwrap();
        assert_eq!(kept.transformation_name.as_deref(), Some("drop-det"));
        assert_eq!(store.get(0).unwrap().descendants(), &[1]);
        assert!(store.iter().all(|r| r.transformation_name.as_deref() != Some("plural")));
        assert_lineage_consistent(&store);
    }

    #[test]
    fn test_editor_error_propagates() {
        fn broken(_: &[String], _: &str, _: &str) -> Result<Vec<String>, EditorError> {
            Err(EditorError::Output("invalid UTF-8".to_string()))
        }
        let mut store = store_with(&[("p1", "x", "(NP (DT the) (NN cat))")]);
        let result = TransformationDriver::new(broken).apply(&mut store, &[drop_det()]);

        assert!(matches!(result, Err(LineageError::Editor(_))));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_malformed_output_is_dropped() {
        fn half_broken(trees: &[String], _: &str, _: &str) -> Result<Vec<String>, EditorError> {
            Ok(trees
                .iter()
                .enumerate()
                .map(|(i, _)| match i {
                    0 => "(NP (NN cat)".to_string(),
                    _ => "(NP (NN dog))".to_string(),
                })
                .collect())
        }
        let mut store = store_with(&[
            ("p1", "x", "(NP (DT the) (NN cat))"),
            ("p1", "x", "(NP (DT the) (NN dog))"),
        ]);
        let report = TransformationDriver::new(half_broken)
            .apply(&mut store, &[drop_det()])
            .unwrap();

        assert_eq!(report.dropped(), 1);
        assert_eq!(report.rules[0].created, vec![2]);
        assert_eq!(store.get(2).unwrap().ancestor, Some(1));
    }

    #[test]
    fn test_apply_selected() {
        let mut store = store_with(&[
            ("p1", "increase", "(NP (DT the) (NN cat))"),
            ("p2", "decrease", "(NP (DT the) (NN dog))"),
        ]);
        let report = TransformationDriver::new(ReplaceEditor::default())
            .apply_selected(&mut store, &[drop_det()], &Selection::by_label("decrease"))
            .unwrap();

        assert_eq!(report.rules[0].created, vec![2]);
        assert_eq!(store.get(2).unwrap().ancestor, Some(1));
        assert!(store.get(0).unwrap().descendants().is_empty());
    }

    #[test]
    fn test_empty_selection_skips_editor() {
        let mut store = store_with(&[("p1", "x", "(NP (DT the) (NN cat))")]);
        let driver = TransformationDriver::new(ReplaceEditor::default());
        let report = driver
            .apply_selected(&mut store, &[drop_det()], &Selection::by_pattern("p9"))
            .unwrap();

        assert_eq!(report.rules[0].rounds, 0);
        assert_eq!(driver.editor().calls.get(), 0);
    }

    #[test]
    fn test_post_process_by_target() {
        let mut store = store_with(&[
            ("p1", "increase", "(NP (DT the) (NN dog))"),
            ("p2", "increase", "(NP (DT the) (NN dog))"),
        ]);
        let config = parse_post_process_rules(
            "[drop-det]\ntargets = p1\npattern = (DT the)\nscript = (DT a)\n\n\
             [plural]\ntargets = p1, p2\npattern = (NN dog)\nscript = (NNS dogs)\n",
        )
        .unwrap();
        let report = TransformationDriver::new(ReplaceEditor::default())
            .post_process(&mut store, &config)
            .unwrap();

        let names: Vec<&str> = report.rules.iter().map(|o| o.rule.as_str()).collect();
        assert_eq!(names, vec!["drop-det", "plural", "plural"]);

        // p1: 0 -> 2 (a dog), then plural over 0 and 2
        assert_eq!(report.rules[0].created, vec![2]);
        assert_eq!(report.rules[1].created, vec![3, 4]);
        assert_eq!(store.get(4).unwrap().substring, "a dogs");
        assert_eq!(store.get(4).unwrap().origin, 0);
        // p2 only sees its own record
        assert_eq!(report.rules[2].created, vec![5]);
        assert_eq!(store.get(5).unwrap().ancestor, Some(1));
        assert_eq!(store.get(5).unwrap().source.pattern_name, "p2");
        assert_lineage_consistent(&store);
    }
}
