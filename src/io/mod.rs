pub mod display;
pub mod snapshot;
pub mod store;

pub use crate::io::snapshot::{GrammarDocument, SnapshotDocument, SnapshotError, UserData, SNAPSHOT_VERSION};
pub use crate::io::store::{FileSnapshotStore, MemorySnapshotStore, SnapshotStore, StoreOutcome};
