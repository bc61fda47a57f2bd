use crate::grammar::builder::{GrammarBuilder, GrammarError};
use crate::grammar::engine::Grammar;
use crate::grammar::symbol::START_SYMBOL;
use crate::history::HistorySnapshot;
use serde::{Serialize, Deserialize};
use std::time::Duration;
use thiserror::Error;

/// Version written into every document; loads accept the same major version.
pub const SNAPSHOT_VERSION: &str = "1.0.0";

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("invalid snapshot format: {0}")]
    InvalidFormat(String),
    #[error("snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for SnapshotError {
    fn from(e: serde_json::Error) -> Self {
        SnapshotError::InvalidFormat(e.to_string())
    }
}

/// Identity of the person working on the grammar. Opaque to the engine.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    pub last_name: String,
    pub first_name: String,
    pub patronymic: String,
    pub group: String,
}

impl UserData {
    /// Trims every field; all four must be non-empty.
    pub fn new(last_name: &str, first_name: &str, patronymic: &str, group: &str) -> Result<Self, SnapshotError> {
        let user = UserData {
            last_name: last_name.trim().to_string(),
            first_name: first_name.trim().to_string(),
            patronymic: patronymic.trim().to_string(),
            group: group.trim().to_string(),
        };
        user.check()?;
        Ok(user)
    }

    fn check(&self) -> Result<(), SnapshotError> {
        let fields = [
            ("lastName", &self.last_name),
            ("firstName", &self.first_name),
            ("patronymic", &self.patronymic),
            ("group", &self.group),
        ];
        match fields.iter().find(|(_, value)| value.trim().is_empty()) {
            Some((name, _)) => Err(SnapshotError::InvalidFormat(format!("user.{} is empty", name))),
            None => Ok(()),
        }
    }

    pub fn short_name(&self) -> String {
        format!("{} {}", self.last_name, self.first_name)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RuleDocument {
    pub left: String,
    pub right: String,
}

/// The grammar as stored on disk: symbols are one-character strings.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GrammarDocument {
    pub terminals: Vec<String>,
    pub non_terminals: Vec<String>,
    pub start_symbol: String,
    pub rules: Vec<RuleDocument>,
}

impl From<&Grammar> for GrammarDocument {
    fn from(grammar: &Grammar) -> Self {
        GrammarDocument {
            terminals: grammar.terminals().iter().map(|ch| ch.to_string()).collect(),
            non_terminals: grammar.non_terminals().iter().map(|ch| ch.to_string()).collect(),
            start_symbol: grammar.start_symbol().to_string(),
            rules: grammar
                .rules()
                .iter()
                .map(|rule| RuleDocument {
                    left: rule.left.to_string(),
                    right: rule.right.clone(),
                })
                .collect(),
        }
    }
}

impl GrammarDocument {
    /// Re-validates the stored grammar. `S` is always added to the
    /// non-terminals and the start symbol is forced to `S`, whatever the
    /// document says.
    pub fn to_grammar(&self) -> Result<Grammar, GrammarError> {
        let mut builder = GrammarBuilder::new().with_notice_window(Duration::ZERO);
        for terminal in &self.terminals {
            builder.add_terminal(terminal)?;
        }
        let start = START_SYMBOL.to_string();
        for non_terminal in self.non_terminals.iter().filter(|nt| **nt != start) {
            builder.add_non_terminal(non_terminal)?;
        }
        for rule in &self.rules {
            builder.add_rule(&rule.left, &rule.right)?;
        }
        builder.build()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Serialized `HistorySnapshot`; opaque to everything but the history store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derivation_snapshot: Option<String>,
}

/// The persisted document exchanged with the save/load collaborator.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SnapshotDocument {
    pub user: UserData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grammar: Option<GrammarDocument>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<Settings>,
    pub version: String,
}

// Wire shape before validation: required fields may be missing here.
#[derive(Deserialize)]
struct RawDocument {
    user: Option<UserData>,
    grammar: Option<GrammarDocument>,
    settings: Option<Settings>,
    version: Option<String>,
}

fn major(version: &str) -> Option<&str> {
    version.split('.').next().filter(|part| !part.is_empty())
}

pub fn is_supported_version(version: &str) -> bool {
    major(version).is_some() && major(version) == major(SNAPSHOT_VERSION)
}

impl SnapshotDocument {
    pub fn new(user: UserData) -> Self {
        SnapshotDocument {
            user,
            grammar: None,
            settings: None,
            version: SNAPSHOT_VERSION.to_string(),
        }
    }

    /// Parses and validates a document. Nothing is returned unless `version`
    /// is supported and `user` is present and complete.
    pub fn parse(text: &str) -> Result<Self, SnapshotError> {
        let raw: RawDocument = serde_json::from_str(text)?;

        let version = raw
            .version
            .ok_or_else(|| SnapshotError::InvalidFormat("missing version".to_string()))?;
        if !is_supported_version(&version) {
            return Err(SnapshotError::InvalidFormat(format!(
                "unsupported version {} (expected {})",
                version, SNAPSHOT_VERSION
            )));
        }
        let user = raw
            .user
            .ok_or_else(|| SnapshotError::InvalidFormat("missing user".to_string()))?;
        user.check()?;

        let document = SnapshotDocument {
            user,
            grammar: raw.grammar,
            settings: raw.settings,
            version,
        };
        // Reject a broken grammar now rather than on first use.
        document.load_grammar()?;
        Ok(document)
    }

    pub fn to_json_pretty(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load_grammar(&self) -> Result<Option<Grammar>, SnapshotError> {
        self.grammar
            .as_ref()
            .map(|doc| {
                doc.to_grammar()
                    .map_err(|e| SnapshotError::InvalidFormat(format!("grammar: {}", e)))
            })
            .transpose()
    }

    /// Replaces the stored grammar. History belonging to the old grammar is
    /// left in place; it is recognised as stale on the next restore.
    pub fn set_grammar(&mut self, grammar: &Grammar) {
        self.grammar = Some(GrammarDocument::from(grammar));
    }

    pub fn history_blob(&self) -> Option<&str> {
        self.settings.as_ref()?.derivation_snapshot.as_deref()
    }

    /// The stored history, if present and readable. An unreadable blob is
    /// treated like a missing one.
    pub fn history(&self) -> Option<HistorySnapshot> {
        let blob = self.history_blob()?;
        match HistorySnapshot::from_json(blob) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                log::warn!("Ignoring unreadable derivation snapshot: {}", e);
                None
            }
        }
    }

    pub fn set_history(&mut self, blob: Option<String>) {
        self.settings.get_or_insert_with(Settings::default).derivation_snapshot = blob;
    }
}
