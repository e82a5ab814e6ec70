//! Injectable persistence for the cleanup registry.
//!
//! The registry itself owns the bookkeeping; these stores only load and save
//! the serialized document. Tests inject [`InMemoryRegistryStore`];
//! production uses [`JsonFileRegistryStore`], which survives a page-reload
//! equivalent of the process.

use super::{RegistryDocument, RegistryError};
use std::path::PathBuf;
use std::sync::Mutex;

/// Load/save seam for the registry document
pub trait RegistryStore: Send + Sync {
    /// Load the persisted document (empty when nothing was saved yet)
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the backing storage cannot be read.
    fn load(&self) -> Result<RegistryDocument, RegistryError>;

    /// Persist the document
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the backing storage cannot be
    /// written.
    fn save(&self, document: &RegistryDocument) -> Result<(), RegistryError>;
}

/// Volatile store for tests and registry-less embeddings
#[derive(Debug, Default)]
pub struct InMemoryRegistryStore {
    document: Mutex<RegistryDocument>,
}

impl InMemoryRegistryStore {
    /// Create an empty in-memory store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl RegistryStore for InMemoryRegistryStore {
    #[allow(clippy::unwrap_used)] // Mutex poison is unrecoverable
    fn load(&self) -> Result<RegistryDocument, RegistryError> {
        Ok(self.document.lock().unwrap().clone())
    }

    #[allow(clippy::unwrap_used)] // Mutex poison is unrecoverable
    fn save(&self, document: &RegistryDocument) -> Result<(), RegistryError> {
        *self.document.lock().unwrap() = document.clone();
        Ok(())
    }
}

/// File-backed store: one JSON document, written atomically
///
/// A corrupt file is treated as empty rather than erroring — a damaged
/// cleanup record must never block the page from loading.
#[derive(Debug, Clone)]
pub struct JsonFileRegistryStore {
    path: PathBuf,
}

impl JsonFileRegistryStore {
    /// Create a store backed by the given path
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RegistryStore for JsonFileRegistryStore {
    fn load(&self) -> Result<RegistryDocument, RegistryError> {
        if !self.path.exists() {
            return Ok(RegistryDocument::default());
        }

        let raw = std::fs::read_to_string(&self.path)?;
        match serde_json::from_str(&raw) {
            Ok(document) => Ok(document),
            Err(error) => {
                tracing::warn!(
                    path = %self.path.display(),
                    %error,
                    "Registry file unreadable, starting empty"
                );
                Ok(RegistryDocument::default())
            },
        }
    }

    fn save(&self, document: &RegistryDocument) -> Result<(), RegistryError> {
        let serialized = serde_json::to_string_pretty(document)?;

        // Write-then-rename so a crash mid-save never truncates the record
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, serialized)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BusId, ClientId, SeatId, SeatLock, TripKey};
    use chrono::{TimeZone, Utc};

    fn sample_document() -> RegistryDocument {
        let Some(date) = chrono::NaiveDate::from_ymd_opt(2025, 2, 1) else {
            return RegistryDocument::default();
        };
        let Some(acquired_at) = Utc.with_ymd_and_hms(2025, 2, 1, 8, 0, 0).single() else {
            return RegistryDocument::default();
        };

        RegistryDocument {
            held: vec![SeatLock {
                trip: TripKey::new(BusId::new("bus-1"), date, "08:30"),
                seat: SeatId::new("12"),
                client_id: ClientId::new(),
                acquired_at,
            }],
            outbox: Vec::new(),
        }
    }

    #[test]
    fn in_memory_round_trip() {
        let store = InMemoryRegistryStore::new();
        let document = sample_document();

        let Ok(()) = store.save(&document) else {
            return;
        };
        let Ok(loaded) = store.load() else {
            return;
        };
        assert_eq!(loaded, document);
    }

    #[test]
    fn file_store_round_trip() {
        let Ok(dir) = tempfile::tempdir() else {
            return;
        };
        let store = JsonFileRegistryStore::new(dir.path().join("registry.json"));
        let document = sample_document();

        let Ok(()) = store.save(&document) else {
            return;
        };
        let Ok(loaded) = store.load() else {
            return;
        };
        assert_eq!(loaded, document);
    }

    #[test]
    fn missing_file_loads_empty() {
        let Ok(dir) = tempfile::tempdir() else {
            return;
        };
        let store = JsonFileRegistryStore::new(dir.path().join("absent.json"));
        let Ok(loaded) = store.load() else {
            return;
        };
        assert!(loaded.held.is_empty());
        assert!(loaded.outbox.is_empty());
    }

    #[test]
    fn corrupt_file_loads_empty_instead_of_failing() {
        let Ok(dir) = tempfile::tempdir() else {
            return;
        };
        let path = dir.path().join("registry.json");
        let Ok(()) = std::fs::write(&path, "{not json") else {
            return;
        };

        let store = JsonFileRegistryStore::new(path);
        let Ok(loaded) = store.load() else {
            return;
        };
        assert!(loaded.held.is_empty());
    }
}
