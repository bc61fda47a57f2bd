// End-to-end tests for grammar authoring, derivation and history persistence

use chomsky::grammar::builder::MAX_RULES;
use chomsky::grammar::engine::DerivationState;
use chomsky::history::CompletionRecord;
use chomsky::io::snapshot::UserData;
use chomsky::io::store::{MemorySnapshotStore, SnapshotStore, StoreOutcome};
use chomsky::{
    Command, Controller, ControllerEvent, DerivationError, DerivationHistory, DerivationStep, Grammar,
    GrammarBuilder, GrammarError, HistorySnapshot, Session,
};
use std::time::Duration;

fn user() -> UserData {
    UserData::new("Петров", "Пётр", "Петрович", "ПИ-1").unwrap()
}

// S -> аA, A -> а, A -> ъ
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
fn test_end_to_end_derivation() {
    let grammar = sample_grammar();
    let mut history = DerivationHistory::new(&grammar);

    let outcome = history.apply(&grammar, 0).unwrap();
    assert_eq!(outcome.step.result, "аA");
    assert_eq!(outcome.state, DerivationState::InProgress);
    assert!(outcome.completion.is_none());

    let outcome = history.apply(&grammar, 2).unwrap();
    assert_eq!(outcome.step.result, "а");
    assert_eq!(outcome.state, DerivationState::Completed);
    assert!(matches!(outcome.completion, Some(CompletionRecord::Added(_))));

    assert_eq!(history.saved().len(), 1);
    let saved = &history.saved()[0];
    assert_eq!(saved.final_word, "а");
    assert_eq!(
        saved.steps,
        vec![
            DerivationStep { result: "S".to_string(), rule_index: None },
            DerivationStep { result: "аA".to_string(), rule_index: Some(1) },
            DerivationStep { result: "а".to_string(), rule_index: Some(3) },
        ]
    );
}

#[test]
fn test_leftmost_rewrite_and_epsilon_collapse() {
    let mut builder = GrammarBuilder::new();
    builder.add_terminal("а").unwrap();
    builder.add_terminal("б").unwrap();
    builder.add_terminal("ъ").unwrap();
    builder.add_non_terminal("A").unwrap();
    builder.add_rule("S", "AA").unwrap();
    builder.add_rule("A", "аA").unwrap();
    builder.add_rule("A", "ъ").unwrap();
    builder.add_rule("S", "бAб").unwrap();
    let grammar = builder.build().unwrap();

    let mut history = DerivationHistory::new(&grammar);
    history.apply(&grammar, 0).unwrap();
    assert_eq!(history.apply(&grammar, 1).unwrap().step.result, "аAA");

    let mut other = DerivationHistory::new(&grammar);
    other.apply(&grammar, 3).unwrap();
    let outcome = other.apply(&grammar, 2).unwrap();
    assert_eq!(outcome.step.result, "бб");
    assert_eq!(outcome.state, DerivationState::Completed);
}

#[test]
fn test_undo_restores_previous_availability() {
    let grammar = sample_grammar();
    let mut history = DerivationHistory::new(&grammar);
    let before: Vec<bool> = history.derivation().available_rules(&grammar).iter().map(|r| r.available).collect();

    history.apply(&grammar, 0).unwrap();
    history.undo().unwrap();

    assert_eq!(history.derivation().len(), 1);
    let after: Vec<bool> = history.derivation().available_rules(&grammar).iter().map(|r| r.available).collect();
    assert_eq!(before, after);
    assert_eq!(history.undo(), Err(DerivationError::NothingToUndo));
}

#[test]
fn test_same_chain_saved_once() {
    let grammar = sample_grammar();
    let mut history = DerivationHistory::new(&grammar);
    history.apply(&grammar, 0).unwrap();
    history.apply(&grammar, 1).unwrap();
    history.reset();
    history.apply(&grammar, 0).unwrap();
    let outcome = history.apply(&grammar, 1).unwrap();

    assert!(matches!(outcome.completion, Some(CompletionRecord::Duplicate(_))));
    assert_eq!(history.saved().len(), 1);
}

#[test]
fn test_rule_limit() {
    let mut builder = GrammarBuilder::new().with_notice_window(Duration::ZERO);
    builder.add_terminal("а").unwrap();
    let mut added = 0;
    let mut right = String::new();
    while added < MAX_RULES {
        right.push('а');
        builder.add_rule("S", &right).unwrap();
        added += 1;
    }
    right.push('а');
    assert_eq!(builder.add_rule("S", &right), Err(GrammarError::RuleLimitExceeded));
    assert_eq!(builder.rules().len(), MAX_RULES);
}

#[test]
fn test_trivial_rule_rejected() {
    let mut builder = GrammarBuilder::new();
    builder.add_non_terminal("A").unwrap();
    assert_eq!(builder.add_rule("A", "A"), Err(GrammarError::TrivialRule('A')));
    assert!(builder.rules().is_empty());
}

#[test]
fn test_stale_snapshot_discarded() {
    let grammar = sample_grammar();
    let mut history = DerivationHistory::new(&grammar);
    history.apply(&grammar, 0).unwrap();
    let mut snapshot = history.snapshot(&grammar);
    snapshot.grammar_id = "0000000000000000".to_string();

    let blob = snapshot.to_json().unwrap();
    let restored = DerivationHistory::restore(&grammar, Some(HistorySnapshot::from_json(&blob).unwrap()));
    assert_eq!(restored.derivation().steps(), &[DerivationStep::initial('S')]);
    assert!(restored.saved().is_empty());
}

#[test]
fn test_session_survives_store_round_trip() {
    let mut session = Session::new(user());
    session.set_grammar(sample_grammar());
    let mut controller = Controller::new(session, MemorySnapshotStore::default());
    let commands = controller.commands();

    controller.press_key('1');
    controller.press_key('2');
    controller.press_key('1'); // no S left; ignored
    commands.send(Command::Save).unwrap();
    assert_eq!(controller.pump(), vec![ControllerEvent::Saved]);

    let mut store = controller.store().clone();
    let document = match store.load() {
        StoreOutcome::Success(document) => document,
        other => panic!("expected a document, got {:?}", other),
    };
    let reopened = Session::open(document).unwrap();
    let history = reopened.history().unwrap();
    assert_eq!(history.derivation().current(), "аа");
    assert_eq!(history.saved().len(), 1);
    assert_eq!(history.saved()[0].final_word, "аа");
}

#[test]
fn test_clear_removes_persisted_progress() {
    let mut session = Session::new(user());
    session.set_grammar(sample_grammar());
    let mut controller = Controller::new(session, MemorySnapshotStore::default());
    controller.press_key('1');
    controller.commands().send(Command::Save).unwrap();
    controller.pump();
    assert!(controller.store().document().unwrap().history_blob().is_some());

    assert_eq!(controller.clear(), ControllerEvent::Saved);
    assert!(controller.store().document().unwrap().history_blob().is_none());
    assert_eq!(controller.session().history().unwrap().derivation().current(), "S");
}
