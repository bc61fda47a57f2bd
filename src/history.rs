use crate::grammar::engine::{Derivation, DerivationError, DerivationState, DerivationStep, Grammar};
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use uuid::Uuid;

/// A completed derivation, frozen the moment its last form held no
/// non-terminal. Never mutated afterwards.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SavedDerivation {
    /// Unique identifier for this entry.
    pub id: String,
    /// The full chain, from the start symbol to the final word.
    pub steps: Vec<DerivationStep>,
    /// When the derivation completed.
    pub timestamp: DateTime<Utc>,
    pub final_word: String,
}

impl SavedDerivation {
    /// Freezes a completed chain under a fresh id.
    pub fn freeze(steps: &[DerivationStep]) -> Self {
        SavedDerivation {
            id: Uuid::new_v4().to_string(),
            steps: steps.to_vec(),
            timestamp: Utc::now(),
            final_word: steps.last().map(|s| s.result.clone()).unwrap_or_default(),
        }
    }

    /// Two entries are the same derivation iff their step chains are equal,
    /// whatever their ids or timestamps.
    pub fn same_chain(&self, steps: &[DerivationStep]) -> bool {
        self.steps == steps
    }
}

/// The serialized history blob kept in `settings.derivationSnapshot`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HistorySnapshot {
    pub derivation_steps: Vec<DerivationStep>,
    #[serde(default)]
    pub saved_derivations: Vec<SavedDerivation>,
    #[serde(default)]
    pub is_completed: bool,
    pub grammar_id: String,
}

impl HistorySnapshot {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(blob: &str) -> serde_json::Result<Self> {
        serde_json::from_str(blob)
    }
}

/// What happened to a chain offered to the store on completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionRecord {
    /// Stored as a new entry with this id.
    Added(String),
    /// An identical chain was already stored under this id.
    Duplicate(String),
}

impl CompletionRecord {
    pub fn id(&self) -> &str {
        match self {
            CompletionRecord::Added(id) | CompletionRecord::Duplicate(id) => id,
        }
    }
}

/// Result of one successful rule application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub step: DerivationStep,
    pub state: DerivationState,
    /// Set only on the step that completed the derivation.
    pub completion: Option<CompletionRecord>,
}

/// The in-progress derivation and the completed derivations for one grammar.
///
/// Keyed by the grammar's fingerprint: history restored for a different rule
/// set is discarded.
#[derive(Debug, Clone)]
pub struct DerivationHistory {
    grammar_id: String,
    derivation: Derivation,
    saved: Vec<SavedDerivation>,
    // Entry recorded by the latest completion, until undo/reset.
    staged: Option<String>,
}

impl DerivationHistory {
    pub fn new(grammar: &Grammar) -> Self {
        DerivationHistory {
            grammar_id: grammar.id(),
            derivation: Derivation::new(grammar.start_symbol()),
            saved: Vec::new(),
            staged: None,
        }
    }

    /// Restores persisted history for `grammar`. A snapshot written for another
    /// rule set, or whose steps do not replay under this grammar, yields a
    /// fresh in-progress derivation.
    pub fn restore(grammar: &Grammar, snapshot: Option<HistorySnapshot>) -> Self {
        let mut history = Self::new(grammar);
        let Some(snapshot) = snapshot else {
            return history;
        };

        if snapshot.grammar_id != history.grammar_id {
            log::info!(
                "Discarding stale derivation history (stored grammar {}, active grammar {})",
                snapshot.grammar_id,
                history.grammar_id
            );
            return history;
        }

        for entry in snapshot.saved_derivations {
            history.add_completed(entry);
        }

        match Derivation::replay(grammar, snapshot.derivation_steps) {
            Ok(derivation) => history.derivation = derivation,
            Err(e) => log::warn!("Stored derivation ignored: {}", e),
        }
        if history.state(grammar) == DerivationState::Completed {
            let steps = history.derivation.steps();
            history.staged = history
                .saved
                .iter()
                .find(|entry| entry.same_chain(steps))
                .map(|entry| entry.id.clone());
        }

        log::debug!(
            "Restored derivation at step {} with {} completed derivations",
            history.derivation.len(),
            history.saved.len()
        );
        history
    }

    pub fn snapshot(&self, grammar: &Grammar) -> HistorySnapshot {
        HistorySnapshot {
            derivation_steps: self.derivation.steps().to_vec(),
            saved_derivations: self.saved.clone(),
            is_completed: self.state(grammar) == DerivationState::Completed,
            grammar_id: self.grammar_id.clone(),
        }
    }

    pub fn grammar_id(&self) -> &str {
        &self.grammar_id
    }

    pub fn derivation(&self) -> &Derivation {
        &self.derivation
    }

    pub fn saved(&self) -> &[SavedDerivation] {
        &self.saved
    }

    /// The entry recorded by the completion that produced the current form.
    pub fn staged(&self) -> Option<&SavedDerivation> {
        let id = self.staged.as_deref()?;
        self.saved.iter().find(|entry| entry.id == id)
    }

    pub fn state(&self, grammar: &Grammar) -> DerivationState {
        self.derivation.state(grammar)
    }

    /// Applies the rule at 0-based `rule_index`. When this step completes the
    /// derivation, the chain is offered to the completed collection, once.
    pub fn apply(&mut self, grammar: &Grammar, rule_index: usize) -> Result<StepOutcome, DerivationError> {
        let before = self.state(grammar);
        let step = self.derivation.apply(grammar, rule_index)?.clone();
        let state = self.state(grammar);

        let completion = if before == DerivationState::InProgress && state == DerivationState::Completed {
            let entry = SavedDerivation::freeze(self.derivation.steps());
            let record = self.add_completed(entry);
            log::info!("Derivation completed: \"{}\" ({} steps)", step.result, self.derivation.len());
            self.staged = Some(record.id().to_string());
            Some(record)
        } else {
            None
        };

        Ok(StepOutcome { step, state, completion })
    }

    /// Drops the last step. The derivation is in progress afterwards.
    pub fn undo(&mut self) -> Result<DerivationStep, DerivationError> {
        let removed = self.derivation.undo()?;
        self.staged = None;
        log::debug!("Undid step producing \"{}\"", removed.result);
        Ok(removed)
    }

    /// Starts a new derivation from the start symbol.
    pub fn reset(&mut self) {
        self.derivation.reset();
        self.staged = None;
    }

    /// Same as `reset` for the in-progress derivation; the completed
    /// collection survives. Callers drop the persisted blob themselves.
    pub fn clear(&mut self) {
        log::info!("Clearing in-progress derivation");
        self.reset();
    }

    /// Adds a completed derivation unless one with identical steps exists.
    pub fn add_completed(&mut self, entry: SavedDerivation) -> CompletionRecord {
        if let Some(existing) = self.saved.iter().find(|saved| saved.same_chain(&entry.steps)) {
            log::debug!("Derivation of \"{}\" already saved as {}", entry.final_word, existing.id);
            return CompletionRecord::Duplicate(existing.id.clone());
        }
        let id = entry.id.clone();
        self.saved.push(entry);
        CompletionRecord::Added(id)
    }

    /// Removes a completed derivation. Returns false if no entry has this id.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.saved.len();
        self.saved.retain(|entry| entry.id != id);
        if self.staged.as_deref() == Some(id) {
            self.staged = None;
        }
        self.saved.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::builder::GrammarBuilder;

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
    fn test_completion_saves_chain() {
        let grammar = sample_grammar();
        let mut history = DerivationHistory::new(&grammar);

        let first = history.apply(&grammar, 0).unwrap();
        assert_eq!(first.state, DerivationState::InProgress);
        assert!(first.completion.is_none());

        let last = history.apply(&grammar, 2).unwrap();
        assert_eq!(last.state, DerivationState::Completed);
        assert!(matches!(last.completion, Some(CompletionRecord::Added(_))));

        assert_eq!(history.saved().len(), 1);
        let saved = &history.saved()[0];
        assert_eq!(saved.final_word, "а");
        let chain: Vec<&str> = saved.steps.iter().map(|s| s.result.as_str()).collect();
        assert_eq!(chain, vec!["S", "аA", "а"]);
        assert_eq!(history.staged().map(|s| s.id.as_str()), last.completion.as_ref().map(|c| c.id()));
    }

    #[test]
    fn test_identical_chain_saved_once() {
        let grammar = sample_grammar();
        let mut history = DerivationHistory::new(&grammar);

        history.apply(&grammar, 0).unwrap();
        history.apply(&grammar, 1).unwrap();
        history.reset();
        history.apply(&grammar, 0).unwrap();
        let again = history.apply(&grammar, 1).unwrap();

        assert!(matches!(again.completion, Some(CompletionRecord::Duplicate(_))));
        assert_eq!(history.saved().len(), 1);
    }

    #[test]
    fn test_different_paths_to_same_word_both_kept() {
        let mut builder = GrammarBuilder::new();
        builder.add_terminal("а").unwrap();
        builder.add_non_terminal("A").unwrap();
        builder.add_non_terminal("B").unwrap();
        builder.add_rule("S", "A").unwrap();
        builder.add_rule("S", "B").unwrap();
        builder.add_rule("A", "а").unwrap();
        builder.add_rule("B", "а").unwrap();
        let grammar = builder.build().unwrap();

        let mut history = DerivationHistory::new(&grammar);
        history.apply(&grammar, 0).unwrap();
        history.apply(&grammar, 2).unwrap();
        history.reset();
        history.apply(&grammar, 1).unwrap();
        history.apply(&grammar, 3).unwrap();

        let words: Vec<&str> = history.saved().iter().map(|s| s.final_word.as_str()).collect();
        assert_eq!(words, vec!["а", "а"]);
    }

    #[test]
    fn test_undo_after_completion_returns_to_progress() {
        let grammar = sample_grammar();
        let mut history = DerivationHistory::new(&grammar);
        history.apply(&grammar, 0).unwrap();
        history.apply(&grammar, 1).unwrap();

        history.undo().unwrap();
        assert_eq!(history.state(&grammar), DerivationState::InProgress);
        assert!(history.staged().is_none());
        // The saved entry stays.
        assert_eq!(history.saved().len(), 1);
    }

    #[test]
    fn test_rejected_undo_keeps_history() {
        let grammar = sample_grammar();
        let mut history = DerivationHistory::new(&grammar);
        assert_eq!(history.undo().unwrap_err(), DerivationError::NothingToUndo);
        assert_eq!(history.derivation().len(), 1);
    }

    #[test]
    fn test_remove_and_clear() {
        let grammar = sample_grammar();
        let mut history = DerivationHistory::new(&grammar);
        history.apply(&grammar, 0).unwrap();
        history.apply(&grammar, 1).unwrap();
        let id = history.saved()[0].id.clone();

        history.clear();
        assert_eq!(history.derivation().current(), "S");
        assert_eq!(history.saved().len(), 1);

        assert!(!history.remove("missing"));
        assert!(history.remove(&id));
        assert!(history.saved().is_empty());
    }

    #[test]
    fn test_snapshot_round_trip() {
        let grammar = sample_grammar();
        let mut history = DerivationHistory::new(&grammar);
        history.apply(&grammar, 0).unwrap();
        history.apply(&grammar, 2).unwrap();

        let blob = history.snapshot(&grammar).to_json().unwrap();
        assert!(blob.contains("\"derivationSteps\""));
        assert!(blob.contains("\"grammarId\""));
        assert!(blob.contains("\"isCompleted\":true"));

        let restored = DerivationHistory::restore(&grammar, Some(HistorySnapshot::from_json(&blob).unwrap()));
        assert_eq!(restored.derivation(), history.derivation());
        assert_eq!(restored.saved(), history.saved());
        assert_eq!(restored.staged(), history.staged());
    }

    #[test]
    fn test_stale_snapshot_discarded() {
        let grammar = sample_grammar();
        let mut history = DerivationHistory::new(&grammar);
        history.apply(&grammar, 0).unwrap();
        let mut snapshot = history.snapshot(&grammar);
        snapshot.grammar_id = "0000000000000000".to_string();

        let restored = DerivationHistory::restore(&grammar, Some(snapshot));
        assert_eq!(restored.derivation().steps(), &[DerivationStep::initial('S')]);
        assert!(restored.saved().is_empty());
    }

    #[test]
    fn test_inconsistent_steps_reset_derivation() {
        let grammar = sample_grammar();
        let snapshot = HistorySnapshot {
            derivation_steps: vec![
                DerivationStep::initial('S'),
                DerivationStep { result: "ббб".into(), rule_index: Some(1) },
            ],
            saved_derivations: Vec::new(),
            is_completed: false,
            grammar_id: grammar.id(),
        };
        let restored = DerivationHistory::restore(&grammar, Some(snapshot));
        assert_eq!(restored.derivation().current(), "S");
    }
}
