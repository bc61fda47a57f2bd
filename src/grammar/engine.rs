use crate::grammar::rule::ProductionRule;
use crate::grammar::symbol::START_SYMBOL;
use crate::utils::hash::grammar_fingerprint;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// A saved grammar: the 4-tuple (terminals, non-terminals, start symbol, rules).
///
/// Only `GrammarBuilder` creates one, so every `Grammar` satisfies the
/// alphabet and rule invariants. It is never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grammar {
    terminals: Vec<char>,
    non_terminals: Vec<char>,
    start_symbol: char,
    rules: Vec<ProductionRule>,
}

impl Grammar {
    pub(crate) fn from_parts(
        terminals: Vec<char>,
        non_terminals: Vec<char>,
        rules: Vec<ProductionRule>,
    ) -> Self {
        Grammar {
            terminals,
            non_terminals,
            start_symbol: START_SYMBOL,
            rules,
        }
    }

    pub fn terminals(&self) -> &[char] {
        &self.terminals
    }

    pub fn non_terminals(&self) -> &[char] {
        &self.non_terminals
    }

    pub fn start_symbol(&self) -> char {
        self.start_symbol
    }

    pub fn rules(&self) -> &[ProductionRule] {
        &self.rules
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Look up a rule by its 1-based ordinal.
    pub fn rule(&self, ordinal: usize) -> Option<&ProductionRule> {
        ordinal.checked_sub(1).and_then(|i| self.rules.get(i))
    }

    pub fn is_non_terminal(&self, ch: char) -> bool {
        self.non_terminals.contains(&ch)
    }

    /// Structural identity of the rule set, used to key persisted history.
    pub fn id(&self) -> String {
        grammar_fingerprint(&self.rules)
    }
}

/// Errors raised while stepping through a derivation. None of them alters the
/// step history.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DerivationError {
    #[error("rule {ordinal} cannot be applied: '{left}' does not occur in \"{result}\"")]
    RuleNotApplicable {
        ordinal: usize,
        left: char,
        result: String,
    },
    #[error("nothing to undo: the derivation is at its initial step")]
    NothingToUndo,
    #[error("the grammar has no rule {0}")]
    RuleOutOfRange(usize),
    #[error("step {0} of the stored derivation does not follow from the step before it")]
    InconsistentHistory(usize),
}

/// One entry of a derivation: the sentential form and the rule that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivationStep {
    pub result: String,
    /// 1-based ordinal of the applied rule; absent on the initial step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_index: Option<usize>,
}

impl DerivationStep {
    pub fn initial(start_symbol: char) -> Self {
        DerivationStep {
            result: start_symbol.to_string(),
            rule_index: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivationState {
    /// The current form still contains a non-terminal.
    InProgress,
    /// The current form is a word of the language.
    Completed,
}

/// A rule as offered to the user for the current sentential form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleAvailability<'g> {
    /// 1-based position of the rule in the grammar.
    pub ordinal: usize,
    pub rule: &'g ProductionRule,
    pub available: bool,
}

pub fn is_rule_available(rule: &ProductionRule, result: &str) -> bool {
    result.contains(rule.left)
}

/// All rules of `grammar`, those applicable to `result` first. Relative order
/// inside each group is the grammar's order.
pub fn available_rules<'g>(grammar: &'g Grammar, result: &str) -> Vec<RuleAvailability<'g>> {
    let (mut available, unavailable): (Vec<_>, Vec<_>) = grammar
        .rules()
        .iter()
        .enumerate()
        .map(|(i, rule)| RuleAvailability {
            ordinal: i + 1,
            rule,
            available: is_rule_available(rule, result),
        })
        .partition(|entry| entry.available);
    available.extend(unavailable);
    available
}

/// Rewrite the leftmost occurrence of `rule.left` in `current`.
///
/// Returns `None` if the left-hand symbol does not occur.
pub fn rewrite_leftmost(current: &str, rule: &ProductionRule) -> Option<String> {
    let pos = current.find(rule.left)?;
    let tail = pos + rule.left.len_utf8();
    let replacement = rule.replacement();

    let mut rewritten = String::with_capacity(current.len() - rule.left.len_utf8() + replacement.len());
    rewritten.push_str(&current[..pos]);
    rewritten.push_str(replacement);
    rewritten.push_str(&current[tail..]);
    Some(rewritten)
}

/// Apply `rule`, found at 0-based `rule_index` in the grammar, to `current`
/// and produce the resulting step.
pub fn apply_rule(
    current: &str,
    rule: &ProductionRule,
    rule_index: usize,
) -> Result<DerivationStep, DerivationError> {
    let ordinal = rule_index + 1;
    let result = rewrite_leftmost(current, rule).ok_or_else(|| DerivationError::RuleNotApplicable {
        ordinal,
        left: rule.left,
        result: current.to_string(),
    })?;
    Ok(DerivationStep {
        result,
        rule_index: Some(ordinal),
    })
}

/// True iff `result` contains no non-terminal of `grammar`.
pub fn is_completed(grammar: &Grammar, result: &str) -> bool {
    !result.chars().any(|ch| grammar.is_non_terminal(ch))
}

pub fn state_of(grammar: &Grammar, result: &str) -> DerivationState {
    if is_completed(grammar, result) {
        DerivationState::Completed
    } else {
        DerivationState::InProgress
    }
}

/// The in-progress rewrite history, from the start symbol to the current form.
///
/// Never empty: the first step is always the bare start symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Derivation {
    steps: Vec<DerivationStep>,
}

impl Derivation {
    pub fn new(start_symbol: char) -> Self {
        Derivation {
            steps: vec![DerivationStep::initial(start_symbol)],
        }
    }

    /// Rebuild a derivation from stored steps, checking that every step
    /// follows from the previous one under `grammar`.
    pub fn replay(grammar: &Grammar, steps: Vec<DerivationStep>) -> Result<Self, DerivationError> {
        let initial = DerivationStep::initial(grammar.start_symbol());
        if steps.first() != Some(&initial) {
            return Err(DerivationError::InconsistentHistory(0));
        }

        for (i, pair) in steps.windows(2).enumerate() {
            let (prev, next) = (&pair[0], &pair[1]);
            let rule = next
                .rule_index
                .and_then(|ordinal| grammar.rule(ordinal))
                .ok_or(DerivationError::InconsistentHistory(i + 1))?;
            if rewrite_leftmost(&prev.result, rule).as_deref() != Some(next.result.as_str()) {
                return Err(DerivationError::InconsistentHistory(i + 1));
            }
        }

        Ok(Derivation { steps })
    }

    pub fn steps(&self) -> &[DerivationStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn last(&self) -> &DerivationStep {
        // Non-empty by construction.
        &self.steps[self.steps.len() - 1]
    }

    pub fn current(&self) -> &str {
        &self.last().result
    }

    pub fn state(&self, grammar: &Grammar) -> DerivationState {
        state_of(grammar, self.current())
    }

    pub fn available_rules<'g>(&self, grammar: &'g Grammar) -> Vec<RuleAvailability<'g>> {
        available_rules(grammar, self.current())
    }

    /// Apply the rule at 0-based `rule_index` and append the resulting step.
    pub fn apply(&mut self, grammar: &Grammar, rule_index: usize) -> Result<&DerivationStep, DerivationError> {
        let rule = grammar
            .rules()
            .get(rule_index)
            .ok_or(DerivationError::RuleOutOfRange(rule_index + 1))?;
        let step = apply_rule(self.current(), rule, rule_index)?;
        log::debug!("Applied rule {} ({}): {} => {}", rule_index + 1, rule, self.current(), step.result);
        self.steps.push(step);
        Ok(self.last())
    }

    /// Drop the last step. The initial step can never be removed.
    pub fn undo(&mut self) -> Result<DerivationStep, DerivationError> {
        if self.steps.len() <= 1 {
            return Err(DerivationError::NothingToUndo);
        }
        self.steps.pop().ok_or(DerivationError::NothingToUndo)
    }

    /// Back to the lone start symbol.
    pub fn reset(&mut self) {
        self.steps.truncate(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::builder::GrammarBuilder;

    // terminals [а], non-terminals [S, A], rules [S -> аA, A -> а, A -> ъ]
    fn sample_grammar() -> Grammar {
        let mut builder = GrammarBuilder::new();
        builder.add_terminal("а").unwrap();
        builder.add_terminal("ъ").unwrap();
        builder.add_non_terminal("A").unwrap();
        builder.add_rule("S", "аA").unwrap();
        builder.add_rule("A", "а").unwrap();
        builder.add_rule("A", "ъ").unwrap();
        builder.build().unwrap()
    }

    #[test]
    fn test_leftmost_only_rewrite() {
        let rule = ProductionRule::new('A', "аA");
        assert_eq!(rewrite_leftmost("AA", &rule).as_deref(), Some("аAA"));
        assert_eq!(rewrite_leftmost("бAбA", &rule).as_deref(), Some("баAбA"));
    }

    #[test]
    fn test_epsilon_collapse() {
        let rule = ProductionRule::new('A', "ъ");
        assert_eq!(rewrite_leftmost("бAв", &rule).as_deref(), Some("бв"));
    }

    #[test]
    fn test_apply_rule_not_applicable() {
        let rule = ProductionRule::new('B', "б");
        let err = apply_rule("аA", &rule, 4).unwrap_err();
        assert_eq!(
            err,
            DerivationError::RuleNotApplicable { ordinal: 5, left: 'B', result: "аA".to_string() }
        );
    }

    #[test]
    fn test_available_rules_partition_keeps_order() {
        let grammar = sample_grammar();

        let at_start: Vec<(usize, bool)> = available_rules(&grammar, "S")
            .iter()
            .map(|r| (r.ordinal, r.available))
            .collect();
        assert_eq!(at_start, vec![(1, true), (2, false), (3, false)]);

        let later: Vec<(usize, bool)> = available_rules(&grammar, "аA")
            .iter()
            .map(|r| (r.ordinal, r.available))
            .collect();
        assert_eq!(later, vec![(2, true), (3, true), (1, false)]);
    }

    #[test]
    fn test_is_completed_depends_only_on_result() {
        let grammar = sample_grammar();
        assert!(!is_completed(&grammar, "S"));
        assert!(!is_completed(&grammar, "аA"));
        assert!(is_completed(&grammar, "а"));
        assert!(is_completed(&grammar, ""));
        // 'B' is not a non-terminal of this grammar.
        assert!(is_completed(&grammar, "аB"));
    }

    #[test]
    fn test_end_to_end_derivation() {
        let grammar = sample_grammar();
        let mut derivation = Derivation::new(grammar.start_symbol());
        assert_eq!(derivation.state(&grammar), DerivationState::InProgress);

        let step = derivation.apply(&grammar, 0).unwrap().clone();
        assert_eq!(step, DerivationStep { result: "аA".into(), rule_index: Some(1) });

        let step = derivation.apply(&grammar, 2).unwrap().clone();
        assert_eq!(step, DerivationStep { result: "а".into(), rule_index: Some(3) });
        assert_eq!(derivation.state(&grammar), DerivationState::Completed);
        assert_eq!(derivation.len(), 3);
    }

    #[test]
    fn test_rejected_apply_leaves_history_unchanged() {
        let grammar = sample_grammar();
        let mut derivation = Derivation::new('S');
        let before = derivation.clone();

        assert!(matches!(derivation.apply(&grammar, 1), Err(DerivationError::RuleNotApplicable { .. })));
        assert_eq!(derivation.apply(&grammar, 7).unwrap_err(), DerivationError::RuleOutOfRange(8));
        assert_eq!(derivation, before);
    }

    #[test]
    fn test_undo_restores_previous_step_and_availability() {
        let grammar = sample_grammar();
        let mut derivation = Derivation::new('S');
        derivation.apply(&grammar, 0).unwrap();
        let after_first = derivation.clone();
        derivation.apply(&grammar, 1).unwrap();
        assert_eq!(derivation.state(&grammar), DerivationState::Completed);

        let removed = derivation.undo().unwrap();
        assert_eq!(removed.result, "аа");
        assert_eq!(derivation, after_first);
        assert_eq!(derivation.state(&grammar), DerivationState::InProgress);
        assert_eq!(derivation.available_rules(&grammar), available_rules(&grammar, "аA"));
    }

    #[test]
    fn test_undo_on_initial_step() {
        let mut derivation = Derivation::new('S');
        assert_eq!(derivation.undo().unwrap_err(), DerivationError::NothingToUndo);
        assert_eq!(derivation.len(), 1);
    }

    #[test]
    fn test_reset_returns_to_start() {
        let grammar = sample_grammar();
        let mut derivation = Derivation::new('S');
        derivation.apply(&grammar, 0).unwrap();
        derivation.apply(&grammar, 1).unwrap();
        derivation.reset();
        assert_eq!(derivation.steps(), &[DerivationStep::initial('S')]);
    }

    #[test]
    fn test_replay_accepts_consistent_steps() {
        let grammar = sample_grammar();
        let mut derivation = Derivation::new('S');
        derivation.apply(&grammar, 0).unwrap();
        derivation.apply(&grammar, 2).unwrap();

        let replayed = Derivation::replay(&grammar, derivation.steps().to_vec()).unwrap();
        assert_eq!(replayed, derivation);
    }

    #[test]
    fn test_replay_rejects_broken_chain() {
        let grammar = sample_grammar();
        let steps = vec![
            DerivationStep::initial('S'),
            DerivationStep { result: "аA".into(), rule_index: Some(1) },
            DerivationStep { result: "ааа".into(), rule_index: Some(2) },
        ];
        assert_eq!(
            Derivation::replay(&grammar, steps).unwrap_err(),
            DerivationError::InconsistentHistory(2)
        );
        assert_eq!(
            Derivation::replay(&grammar, vec![]).unwrap_err(),
            DerivationError::InconsistentHistory(0)
        );
    }

    #[test]
    fn test_stuck_grammar_offers_nothing() {
        let mut builder = GrammarBuilder::new();
        builder.add_terminal("б").unwrap();
        builder.add_non_terminal("B").unwrap();
        builder.add_rule("B", "б").unwrap();
        let grammar = builder.build().unwrap();

        let derivation = Derivation::new('S');
        assert!(derivation.available_rules(&grammar).iter().all(|r| !r.available));
        assert_eq!(derivation.state(&grammar), DerivationState::InProgress);
    }
}
