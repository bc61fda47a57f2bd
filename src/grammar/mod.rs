pub mod rule;
pub mod symbol;
pub mod engine;
pub mod builder;
pub mod ordinal;

// Export core types for anyone importing the grammar module
pub use crate::grammar::rule::ProductionRule;
pub use crate::grammar::symbol::{SymbolType, EPSILON, START_SYMBOL};
pub use crate::grammar::engine::{Derivation, DerivationError, DerivationState, DerivationStep, Grammar};
pub use crate::grammar::builder::{GrammarBuilder, GrammarError, MAX_RULES};
