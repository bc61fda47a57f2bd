use crate::grammar::engine::Grammar;
use crate::grammar::rule::ProductionRule;
use crate::grammar::symbol::{is_non_terminal, is_terminal, single_char, SymbolType, BLANK, START_SYMBOL};
use crate::notification::{Notice, DEFAULT_NOTICE_WINDOW};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Maximum number of production rules in one grammar.
pub const MAX_RULES: usize = 99;

/// Grammar authoring violations. A rejected edit never changes the candidate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrammarError {
    #[error("'{input}' is not a valid {expected}")]
    InvalidSymbol { input: String, expected: SymbolType },
    #[error("symbol '{0}' is already defined")]
    DuplicateSymbol(char),
    #[error("the start symbol '{0}' cannot be removed")]
    ProtectedSymbol(char),
    #[error("symbol '{0}' is not defined")]
    SymbolNotFound(char),
    #[error("symbol '{0}' is used by an existing rule")]
    SymbolInUse(char),
    #[error("left-hand side '{0}' must be a single defined non-terminal")]
    InvalidRuleLeft(String),
    #[error("right-hand side '{0}' contains an undefined symbol or is empty")]
    InvalidRuleRight(String),
    #[error("rule {0} -> {0} rewrites a symbol into itself")]
    TrivialRule(char),
    #[error("rule {0} already exists")]
    DuplicateRule(ProductionRule),
    #[error("a grammar holds at most {} rules", MAX_RULES)]
    RuleLimitExceeded,
    #[error("there is no rule {0}")]
    RuleNotFound(usize),
    #[error("grammar is incomplete: {0}")]
    Incomplete(&'static str),
}

/// Incrementally builds and validates a `Grammar` from author input.
///
/// The candidate always contains the start symbol `S`. Every edit is checked
/// against the alphabet and rule invariants before it is applied; the last
/// rejected edit is kept as a transient notice which blocks `build` until it
/// expires or is dismissed.
#[derive(Debug, Clone)]
pub struct GrammarBuilder {
    terminals: Vec<char>,
    non_terminals: Vec<char>,
    rules: Vec<ProductionRule>,
    // Last authoring error, cleared by the next accepted edit.
    pending: Option<Notice<GrammarError>>,
    notice_window: Duration,
}

impl Default for GrammarBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GrammarBuilder {
    /// Creates an empty candidate holding only the start symbol.
    pub fn new() -> Self {
        GrammarBuilder {
            terminals: Vec::new(),
            non_terminals: vec![START_SYMBOL],
            rules: Vec::new(),
            pending: None,
            notice_window: DEFAULT_NOTICE_WINDOW,
        }
    }

    /// Sets how long a rejected edit keeps the candidate invalid.
    pub fn with_notice_window(mut self, window: Duration) -> Self {
        self.notice_window = window;
        self
    }

    /// Starts a new candidate from an existing grammar, e.g. to edit it.
    pub fn from_grammar(grammar: &Grammar) -> Self {
        GrammarBuilder {
            terminals: grammar.terminals().to_vec(),
            non_terminals: grammar.non_terminals().to_vec(),
            rules: grammar.rules().to_vec(),
            ..Self::new()
        }
    }

    pub fn terminals(&self) -> &[char] {
        &self.terminals
    }

    pub fn non_terminals(&self) -> &[char] {
        &self.non_terminals
    }

    pub fn rules(&self) -> &[ProductionRule] {
        &self.rules
    }

    pub fn add_terminal(&mut self, input: &str) -> Result<(), GrammarError> {
        let outcome = Self::parse_symbol(input, SymbolType::Terminal).and_then(|ch| {
            if self.terminals.contains(&ch) {
                return Err(GrammarError::DuplicateSymbol(ch));
            }
            self.terminals.push(ch);
            Ok(())
        });
        self.track(outcome)
    }

    pub fn add_non_terminal(&mut self, input: &str) -> Result<(), GrammarError> {
        let outcome = Self::parse_symbol(input, SymbolType::NonTerminal).and_then(|ch| {
            if self.non_terminals.contains(&ch) {
                return Err(GrammarError::DuplicateSymbol(ch));
            }
            self.non_terminals.push(ch);
            Ok(())
        });
        self.track(outcome)
    }

    /// Removes a terminal that no rule refers to.
    pub fn remove_terminal(&mut self, symbol: char) -> Result<(), GrammarError> {
        let outcome = self.checked_removal(symbol, &self.terminals).map(|pos| {
            self.terminals.remove(pos);
        });
        self.track(outcome)
    }

    /// Removes a non-terminal that no rule refers to. `S` is protected.
    pub fn remove_non_terminal(&mut self, symbol: char) -> Result<(), GrammarError> {
        let outcome = if symbol == START_SYMBOL {
            Err(GrammarError::ProtectedSymbol(symbol))
        } else {
            self.checked_removal(symbol, &self.non_terminals).map(|pos| {
                self.non_terminals.remove(pos);
            })
        };
        self.track(outcome)
    }

    /// Adds the rule `left -> right`. Spaces in `right` are literal blanks;
    /// a lone `ъ` denotes the empty string.
    pub fn add_rule(&mut self, left: &str, right: &str) -> Result<(), GrammarError> {
        let outcome = self.check_rule(left, right).map(|rule| {
            log::debug!("Adding rule {}: {}", self.rules.len() + 1, rule);
            self.rules.push(rule);
        });
        self.track(outcome)
    }

    /// Removes the rule with the given 1-based ordinal. Later rules shift down.
    pub fn remove_rule(&mut self, ordinal: usize) -> Result<ProductionRule, GrammarError> {
        let outcome = match ordinal.checked_sub(1) {
            Some(i) if i < self.rules.len() => Ok(self.rules.remove(i)),
            _ => Err(GrammarError::RuleNotFound(ordinal)),
        };
        self.track(outcome)
    }

    /// Drops everything back to the initial candidate.
    pub fn clear(&mut self) {
        self.terminals.clear();
        self.non_terminals = vec![START_SYMBOL];
        self.rules.clear();
        self.pending = None;
    }

    /// The last authoring error, while its display window is still open.
    pub fn pending_error(&self) -> Option<&GrammarError> {
        self.pending_error_at(Instant::now())
    }

    pub fn pending_error_at(&self, now: Instant) -> Option<&GrammarError> {
        self.pending
            .as_ref()
            .and_then(|notice| notice.active(now, self.notice_window))
    }

    /// Clears the pending error immediately.
    pub fn dismiss(&mut self) {
        self.pending = None;
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Instant::now())
    }

    /// Save gate: both alphabets non-empty, the start symbol present, at least
    /// one rule, and no live authoring error.
    pub fn is_valid_at(&self, now: Instant) -> bool {
        self.missing_part().is_none() && self.pending_error_at(now).is_none()
    }

    /// Freezes the candidate into an immutable `Grammar`.
    pub fn build(&self) -> Result<Grammar, GrammarError> {
        if let Some(missing) = self.missing_part() {
            return Err(GrammarError::Incomplete(missing));
        }
        if let Some(err) = self.pending_error() {
            return Err(err.clone());
        }
        Ok(Grammar::from_parts(
            self.terminals.clone(),
            self.non_terminals.clone(),
            self.rules.clone(),
        ))
    }

    fn missing_part(&self) -> Option<&'static str> {
        if self.terminals.is_empty() {
            Some("no terminals defined")
        } else if self.non_terminals.is_empty() {
            Some("no non-terminals defined")
        } else if !self.non_terminals.contains(&START_SYMBOL) {
            Some("start symbol missing")
        } else if self.rules.is_empty() {
            Some("no rules defined")
        } else {
            None
        }
    }

    fn parse_symbol(input: &str, expected: SymbolType) -> Result<char, GrammarError> {
        let valid: fn(char) -> bool = match expected {
            SymbolType::Terminal => is_terminal,
            SymbolType::NonTerminal => is_non_terminal,
            SymbolType::Blank => |ch| ch == BLANK,
        };
        single_char(input)
            .filter(|&ch| valid(ch))
            .ok_or_else(|| GrammarError::InvalidSymbol {
                input: input.to_string(),
                expected,
            })
    }

    fn checked_removal(&self, symbol: char, alphabet: &[char]) -> Result<usize, GrammarError> {
        let pos = alphabet
            .iter()
            .position(|&ch| ch == symbol)
            .ok_or(GrammarError::SymbolNotFound(symbol))?;
        if self.rules.iter().any(|rule| rule.mentions(symbol)) {
            return Err(GrammarError::SymbolInUse(symbol));
        }
        Ok(pos)
    }

    fn check_rule(&self, left: &str, right: &str) -> Result<ProductionRule, GrammarError> {
        let left_symbol = single_char(left)
            .filter(|ch| self.non_terminals.contains(ch))
            .ok_or_else(|| GrammarError::InvalidRuleLeft(left.to_string()))?;

        let right_ok = !right.is_empty()
            && right
                .chars()
                .filter(|&ch| ch != BLANK)
                .all(|ch| self.terminals.contains(&ch) || self.non_terminals.contains(&ch));
        if !right_ok {
            return Err(GrammarError::InvalidRuleRight(right.to_string()));
        }

        let rule = ProductionRule::new(left_symbol, right);
        if rule.is_trivial() {
            return Err(GrammarError::TrivialRule(left_symbol));
        }
        if self.rules.contains(&rule) {
            return Err(GrammarError::DuplicateRule(rule));
        }
        if self.rules.len() >= MAX_RULES {
            return Err(GrammarError::RuleLimitExceeded);
        }
        Ok(rule)
    }

    fn track<T>(&mut self, outcome: Result<T, GrammarError>) -> Result<T, GrammarError> {
        match &outcome {
            Ok(_) => self.pending = None,
            Err(err) => {
                log::warn!("Rejected grammar edit: {}", err);
                self.pending = Some(Notice::new(err.clone()));
            }
        }
        outcome
    }
}
