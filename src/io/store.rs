use crate::io::snapshot::{SnapshotDocument, SnapshotError};
use std::fs;
use std::path::{Path, PathBuf};

/// Outcome of a save or load request. Failures carry the collaborator's
/// message verbatim; nothing is retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOutcome<T> {
    Success(T),
    Cancelled,
    Failed(String),
}

impl<T> StoreOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, StoreOutcome::Success(_))
    }
}

impl<T> From<Result<T, SnapshotError>> for StoreOutcome<T> {
    fn from(result: Result<T, SnapshotError>) -> Self {
        match result {
            Ok(value) => StoreOutcome::Success(value),
            Err(e) => StoreOutcome::Failed(e.to_string()),
        }
    }
}

/// Durable storage for the snapshot document.
pub trait SnapshotStore {
    fn save(&mut self, document: &SnapshotDocument) -> StoreOutcome<()>;
    fn load(&mut self) -> StoreOutcome<SnapshotDocument>;
}

/// Stores the document as pretty-printed JSON in a single file.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileSnapshotStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, document: &SnapshotDocument) -> Result<(), SnapshotError> {
        let text = document.to_json_pretty()?;
        fs::write(&self.path, text)?;
        log::info!("Saved snapshot to {}", self.path.display());
        Ok(())
    }

    fn read(&self) -> Result<SnapshotDocument, SnapshotError> {
        let text = fs::read_to_string(&self.path)?;
        let document = SnapshotDocument::parse(&text)?;
        log::info!("Loaded snapshot from {}", self.path.display());
        Ok(document)
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn save(&mut self, document: &SnapshotDocument) -> StoreOutcome<()> {
        self.write(document).into()
    }

    fn load(&mut self) -> StoreOutcome<SnapshotDocument> {
        self.read().into()
    }
}

/// In-memory store. An empty store answers `load` with `Cancelled`, the way a
/// dismissed open dialog would.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotStore {
    document: Option<SnapshotDocument>,
    fail_with: Option<String>,
}

impl MemorySnapshotStore {
    /// Makes every following request fail with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        MemorySnapshotStore {
            document: None,
            fail_with: Some(message.into()),
        }
    }

    pub fn document(&self) -> Option<&SnapshotDocument> {
        self.document.as_ref()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn save(&mut self, document: &SnapshotDocument) -> StoreOutcome<()> {
        if let Some(message) = &self.fail_with {
            return StoreOutcome::Failed(message.clone());
        }
        self.document = Some(document.clone());
        StoreOutcome::Success(())
    }

    fn load(&mut self) -> StoreOutcome<SnapshotDocument> {
        if let Some(message) = &self.fail_with {
            return StoreOutcome::Failed(message.clone());
        }
        match &self.document {
            Some(document) => StoreOutcome::Success(document.clone()),
            None => StoreOutcome::Cancelled,
        }
    }
}
