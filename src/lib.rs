// Declare the library modules
pub mod config;
pub mod grammar;
pub mod history;
pub mod io;
pub mod notification;
pub mod session;
pub mod utils;

// Re-export key types for easier access
pub use grammar::{Derivation, DerivationError, DerivationStep, Grammar, GrammarBuilder, GrammarError, ProductionRule};
pub use history::{DerivationHistory, HistorySnapshot, SavedDerivation};
pub use session::{Command, Controller, ControllerEvent, Session, SessionError};
