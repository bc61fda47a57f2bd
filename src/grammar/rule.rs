use crate::grammar::symbol::{is_epsilon, single_char};
use std::fmt;

/// Represents a production rule `left -> right` of the grammar.
///
/// `left` is a single non-terminal. `right` is a sequence of one-character
/// symbols; the lone symbol `ъ` stands for the empty string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProductionRule {
    pub left: char,
    pub right: String,
}

impl ProductionRule {
    pub fn new(left: char, right: impl Into<String>) -> Self {
        ProductionRule {
            left,
            right: right.into(),
        }
    }

    /// An epsilon rule rewrites its left-hand side into nothing.
    pub fn is_epsilon(&self) -> bool {
        single_char(&self.right).map_or(false, is_epsilon)
    }

    /// The text substituted for `left` when the rule is applied.
    pub fn replacement(&self) -> &str {
        if self.is_epsilon() {
            ""
        } else {
            &self.right
        }
    }

    /// A rule is trivial when it rewrites a symbol into itself.
    pub fn is_trivial(&self) -> bool {
        single_char(&self.right) == Some(self.left)
    }

    /// True if `symbol` appears anywhere in the rule.
    pub fn mentions(&self, symbol: char) -> bool {
        self.left == symbol || self.right.contains(symbol)
    }
}

// Raw form, used in logs. User-facing text goes through `io::display`.
impl fmt::Display for ProductionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.left, self.right)
    }
}
