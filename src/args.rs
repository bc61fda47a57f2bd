use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Chomsky: build words of a formal grammar step by step.
///
/// Define a grammar (terminals, non-terminals, start symbol S and production
/// rules), then derive words by repeatedly rewriting the leftmost occurrence
/// of a rule's left-hand side until no non-terminal remains.
#[derive(Parser, Debug)]
#[command(author = "Chomsky Team", version, about, long_about = None)]
pub struct Cli {
    /// Snapshot document holding the user, the grammar and derivation history.
    #[arg(short, long, global = true, default_value = "chomsky.json")]
    pub snapshot: PathBuf,

    /// How long a rejected grammar edit keeps the grammar unsaveable (ms).
    ///
    /// With 0 a rejected edit is only reported; the remaining edits are saved.
    #[arg(long, global = true, default_value_t = 3000)]
    pub notice_ms: u64,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a new snapshot document for a user
    Init(InitArgs),

    /// Author the grammar stored in the snapshot
    Grammar(GrammarArgs),

    /// Print the grammar, the current derivation and completed words
    Show,

    /// Derive words interactively, reading one key or command per line
    Derive {
        /// Save the snapshot after every newly completed word
        #[arg(long, action = clap::ArgAction::SetTrue)]
        autosave: bool,
    },

    /// Write completed derivations to a JSON or text file
    Export {
        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        /// Output format (json, text); derived from the extension if omitted
        #[arg(long)]
        format: Option<String>,
    },
}

#[derive(Args, Debug)]
pub struct InitArgs {
    #[arg(long)]
    pub last_name: String,
    #[arg(long)]
    pub first_name: String,
    #[arg(long)]
    pub patronymic: String,
    #[arg(long)]
    pub group: String,
    /// Overwrite an existing snapshot
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct GrammarArgs {
    /// Terminal to add (lowercase Cyrillic letter; ъ is the empty string)
    #[arg(short = 't', long = "terminal")]
    pub terminals: Vec<String>,

    /// Non-terminal to add (uppercase Latin letter)
    #[arg(short = 'n', long = "non-terminal")]
    pub non_terminals: Vec<String>,

    /// Rule to add, written LEFT=RIGHT (e.g. S=аA, A=ъ)
    #[arg(short = 'r', long = "rule")]
    pub rules: Vec<String>,

    /// Rule ordinal to remove (1-based, before additions)
    #[arg(long = "remove-rule")]
    pub remove_rules: Vec<usize>,

    /// Terminal to remove
    #[arg(long = "remove-terminal")]
    pub remove_terminals: Vec<String>,

    /// Non-terminal to remove
    #[arg(long = "remove-non-terminal")]
    pub remove_non_terminals: Vec<String>,

    /// Start from an empty grammar instead of the stored one
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub fresh: bool,
}
