use std::fmt;

/// The reserved terminal standing for the empty string.
pub const EPSILON: char = 'ъ';

/// How epsilon is shown to the user. Never stored.
pub const EPSILON_DISPLAY: char = 'ε';

/// The fixed start symbol of every grammar.
pub const START_SYMBOL: char = 'S';

/// A literal blank allowed inside right-hand sides and derived words.
pub const BLANK: char = ' ';

/// Every symbol of a grammar is exactly one `char`. Sentential forms are
/// therefore sequences of `char`s, and a rewrite always replaces one `char`.
/// Multi-character symbols are rejected when the grammar is authored.
#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub enum SymbolType {
    /// Lowercase Cyrillic letter (а–я), `ъ` included.
    Terminal,
    /// Uppercase Latin letter (A–Z).
    NonTerminal,
    /// The space character; carried through derivations as-is.
    Blank,
}

impl SymbolType {
    /// Classify a character, or `None` if it cannot appear in a grammar at all.
    pub fn of(ch: char) -> Option<Self> {
        if is_terminal(ch) {
            Some(SymbolType::Terminal)
        } else if is_non_terminal(ch) {
            Some(SymbolType::NonTerminal)
        } else if ch == BLANK {
            Some(SymbolType::Blank)
        } else {
            None
        }
    }
}

impl fmt::Display for SymbolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SymbolType::Terminal => "terminal",
            SymbolType::NonTerminal => "non-terminal",
            SymbolType::Blank => "blank",
        };
        write!(f, "{}", name)
    }
}

/// True iff `ch` is a lowercase Cyrillic letter а–я. `ё` lies outside the range.
pub fn is_terminal(ch: char) -> bool {
    ('а'..='я').contains(&ch)
}

/// True iff `ch` is an uppercase Latin letter A–Z.
pub fn is_non_terminal(ch: char) -> bool {
    ch.is_ascii_uppercase()
}

pub fn is_epsilon(ch: char) -> bool {
    ch == EPSILON
}

/// Extract the single character of `input`, or `None` if it has zero or
/// several characters.
pub fn single_char(input: &str) -> Option<char> {
    let mut chars = input.chars();
    match (chars.next(), chars.next()) {
        (Some(ch), None) => Some(ch),
        _ => None,
    }
}
