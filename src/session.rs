//! The application controller's explicit state: the loaded document, the
//! active grammar and its derivation history, plus the command channel the
//! host uses to request saves and loads.

use crate::grammar::engine::{is_rule_available, DerivationError, DerivationStep, Grammar, RuleAvailability};
use crate::grammar::ordinal::ordinal_for_rules;
use crate::history::{CompletionRecord, DerivationHistory, StepOutcome};
use crate::io::snapshot::{SnapshotDocument, SnapshotError, UserData};
use crate::io::store::{SnapshotStore, StoreOutcome};
use crate::utils::export::export_derivations;
use crate::utils::io::format_from_extension;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("no grammar has been defined yet")]
    NoGrammar,
    #[error(transparent)]
    Derivation(#[from] DerivationError),
}

#[derive(Debug, Clone)]
struct ActiveGrammar {
    grammar: Grammar,
    history: DerivationHistory,
}

/// Everything one user works on: the document, and the grammar with its
/// history once a grammar exists. Owned by the controller; the engine itself
/// only ever sees the values passed to it.
#[derive(Debug, Clone)]
pub struct Session {
    document: SnapshotDocument,
    active: Option<ActiveGrammar>,
}

impl Session {
    pub fn new(user: UserData) -> Self {
        Session {
            document: SnapshotDocument::new(user),
            active: None,
        }
    }

    /// Opens a loaded document, restoring its history if it still matches the
    /// stored grammar.
    pub fn open(document: SnapshotDocument) -> Result<Self, SnapshotError> {
        let active = document.load_grammar()?.map(|grammar| {
            let history = DerivationHistory::restore(&grammar, document.history());
            ActiveGrammar { grammar, history }
        });
        Ok(Session { document, active })
    }

    pub fn user(&self) -> &UserData {
        &self.document.user
    }

    pub fn document(&self) -> &SnapshotDocument {
        &self.document
    }

    pub fn grammar(&self) -> Option<&Grammar> {
        self.active.as_ref().map(|active| &active.grammar)
    }

    pub fn history(&self) -> Option<&DerivationHistory> {
        self.active.as_ref().map(|active| &active.history)
    }

    /// Installs a new grammar. History survives only if the rule set is
    /// structurally unchanged.
    pub fn set_grammar(&mut self, grammar: Grammar) {
        self.document.set_grammar(&grammar);
        let history = match self.active.take() {
            Some(active) if active.history.grammar_id() == grammar.id() => active.history,
            _ => {
                self.document.set_history(None);
                DerivationHistory::new(&grammar)
            }
        };
        log::info!("Active grammar {} with {} rules", grammar.id(), grammar.rule_count());
        self.active = Some(ActiveGrammar { grammar, history });
    }

    /// Rules for the current form, available ones first.
    pub fn available_rules(&self) -> Vec<RuleAvailability<'_>> {
        match &self.active {
            Some(active) => active.history.derivation().available_rules(&active.grammar),
            None => Vec::new(),
        }
    }

    /// Applies the rule with 1-based `ordinal`.
    pub fn apply(&mut self, ordinal: usize) -> Result<StepOutcome, SessionError> {
        let active = self.active.as_mut().ok_or(SessionError::NoGrammar)?;
        let index = ordinal
            .checked_sub(1)
            .ok_or(DerivationError::RuleOutOfRange(ordinal))?;
        Ok(active.history.apply(&active.grammar, index)?)
    }

    /// Keyboard shortcut: applies the selected rule if it exists and is
    /// available. Anything else is ignored.
    pub fn press_key(&mut self, key: char) -> Option<StepOutcome> {
        let active = self.active.as_ref()?;
        let ordinal = ordinal_for_rules(key, active.grammar.rule_count())?;
        let rule = active.grammar.rule(ordinal)?;
        if !is_rule_available(rule, active.history.derivation().current()) {
            log::debug!("Key '{}' selects unavailable rule {}; ignored", key, ordinal);
            return None;
        }
        self.apply(ordinal).ok()
    }

    pub fn undo(&mut self) -> Result<DerivationStep, SessionError> {
        let active = self.active.as_mut().ok_or(SessionError::NoGrammar)?;
        Ok(active.history.undo()?)
    }

    pub fn reset(&mut self) {
        if let Some(active) = self.active.as_mut() {
            active.history.reset();
        }
    }

    /// Resets the in-progress derivation and drops it from the persisted blob.
    /// Completed derivations are kept there; with none left the blob goes.
    pub fn clear(&mut self) -> Result<(), SnapshotError> {
        let keep_saved = match self.active.as_mut() {
            Some(active) => {
                active.history.clear();
                !active.history.saved().is_empty()
            }
            None => false,
        };
        if keep_saved {
            self.persist()
        } else {
            self.document.set_history(None);
            Ok(())
        }
    }

    pub fn remove_saved(&mut self, id: &str) -> bool {
        self.active
            .as_mut()
            .map_or(false, |active| active.history.remove(id))
    }

    /// Writes the current history into the document's settings.
    pub fn persist(&mut self) -> Result<(), SnapshotError> {
        if let Some(active) = &self.active {
            let blob = active.history.snapshot(&active.grammar).to_json()?;
            self.document.set_history(Some(blob));
        }
        Ok(())
    }
}

/// Requests arriving from the host (menus, key bindings, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Save,
    Load,
    Export(PathBuf),
    Quit,
}

/// What the controller did with a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    Saved,
    Loaded,
    Exported(PathBuf),
    Cancelled,
    Failed(String),
    QuitRequested,
}

/// Owns the session and the store, and serves commands from a single channel
/// created for the controller's whole lifetime.
pub struct Controller<S: SnapshotStore> {
    session: Session,
    store: S,
    autosave: bool,
    sender: Sender<Command>,
    receiver: Receiver<Command>,
    running: bool,
}

impl<S: SnapshotStore> Controller<S> {
    pub fn new(session: Session, store: S) -> Self {
        let (sender, receiver) = unbounded();
        Controller {
            session,
            store,
            autosave: false,
            sender,
            receiver,
            running: true,
        }
    }

    /// Saves after every newly recorded completed derivation.
    pub fn with_autosave(mut self, autosave: bool) -> Self {
        self.autosave = autosave;
        self
    }

    /// A handle the host uses to send commands.
    pub fn commands(&self) -> Sender<Command> {
        self.sender.clone()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Handles every queued command, in order.
    pub fn pump(&mut self) -> Vec<ControllerEvent> {
        let pending: Vec<Command> = self.receiver.try_iter().collect();
        pending.into_iter().map(|command| self.handle(command)).collect()
    }

    /// Forwards a key press to the session, autosaving on a new completion.
    pub fn press_key(&mut self, key: char) -> Option<StepOutcome> {
        let outcome = self.session.press_key(key)?;
        if self.autosave && matches!(outcome.completion, Some(CompletionRecord::Added(_))) {
            if let ControllerEvent::Failed(message) = self.save() {
                log::warn!("Autosave failed: {}", message);
            }
        }
        Some(outcome)
    }

    /// Clears the in-progress derivation and removes it from storage.
    pub fn clear(&mut self) -> ControllerEvent {
        if let Err(e) = self.session.clear() {
            return ControllerEvent::Failed(e.to_string());
        }
        match self.store.save(self.session.document()) {
            StoreOutcome::Success(()) => ControllerEvent::Saved,
            StoreOutcome::Cancelled => ControllerEvent::Cancelled,
            StoreOutcome::Failed(message) => ControllerEvent::Failed(message),
        }
    }

    fn handle(&mut self, command: Command) -> ControllerEvent {
        log::debug!("Handling command {:?}", command);
        match command {
            Command::Save => self.save(),
            Command::Load => self.load(),
            Command::Export(path) => self.export(path),
            Command::Quit => {
                self.running = false;
                ControllerEvent::QuitRequested
            }
        }
    }

    fn save(&mut self) -> ControllerEvent {
        if let Err(e) = self.session.persist() {
            return ControllerEvent::Failed(e.to_string());
        }
        match self.store.save(self.session.document()) {
            StoreOutcome::Success(()) => ControllerEvent::Saved,
            StoreOutcome::Cancelled => ControllerEvent::Cancelled,
            StoreOutcome::Failed(message) => ControllerEvent::Failed(message),
        }
    }

    // A rejected document leaves the current session untouched.
    fn load(&mut self) -> ControllerEvent {
        match self.store.load() {
            StoreOutcome::Success(document) => match Session::open(document) {
                Ok(session) => {
                    self.session = session;
                    ControllerEvent::Loaded
                }
                Err(e) => ControllerEvent::Failed(e.to_string()),
            },
            StoreOutcome::Cancelled => ControllerEvent::Cancelled,
            StoreOutcome::Failed(message) => ControllerEvent::Failed(message),
        }
    }

    fn export(&mut self, path: PathBuf) -> ControllerEvent {
        let (Some(grammar), Some(history)) = (self.session.grammar(), self.session.history()) else {
            return ControllerEvent::Failed(SessionError::NoGrammar.to_string());
        };
        let result = format_from_extension(&path)
            .and_then(|format| export_derivations(grammar, history.saved(), &path, format));
        match result {
            Ok(()) => ControllerEvent::Exported(path),
            Err(e) => ControllerEvent::Failed(format!("{:#}", e)),
        }
    }
}
