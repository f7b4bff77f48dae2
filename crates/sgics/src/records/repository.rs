use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Identifier assigned by a repository on insert.
pub type RecordId = u64;

/// A stored entity with a numeric identity and optional natural key.
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Resource name used in logs and error payloads.
    const RESOURCE: &'static str;

    fn id(&self) -> RecordId;

    fn set_id(&mut self, id: RecordId);

    /// Key that must be unique across the repository (compared case-insensitively).
    fn unique_key(&self) -> Option<String> {
        None
    }

    /// Intrinsic field validation, run before every write through the CRUD routes.
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

/// Field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Check a required text field is not blank.
pub fn require_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::new(field, "must not be blank"))
    } else {
        Ok(())
    }
}

/// Storage abstraction so services and routes can be exercised in isolation.
pub trait Repository<T: Record>: Send + Sync {
    fn insert(&self, record: T) -> Result<T, RepositoryError>;
    fn update(&self, record: T) -> Result<T, RepositoryError>;
    fn fetch(&self, id: RecordId) -> Result<Option<T>, RepositoryError>;
    fn list(&self) -> Result<Vec<T>, RepositoryError>;
    fn delete(&self, id: RecordId) -> Result<T, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists: {0}")]
    Conflict(String),
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Process-local repository backed by an ordered map.
pub struct InMemoryRepository<T> {
    records: Arc<Mutex<BTreeMap<RecordId, T>>>,
    sequence: Arc<AtomicU64>,
}

impl<T> Default for InMemoryRepository<T> {
    fn default() -> Self {
        Self {
            records: Arc::new(Mutex::new(BTreeMap::new())),
            sequence: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl<T> Clone for InMemoryRepository<T> {
    fn clone(&self) -> Self {
        Self {
            records: Arc::clone(&self.records),
            sequence: Arc::clone(&self.sequence),
        }
    }
}

impl<T: Record> InMemoryRepository<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<RecordId, T>>, RepositoryError> {
        self.records
            .lock()
            .map_err(|_| RepositoryError::Unavailable(format!("{} store poisoned", T::RESOURCE)))
    }

    fn ensure_unique(
        records: &BTreeMap<RecordId, T>,
        candidate: &T,
    ) -> Result<(), RepositoryError> {
        let Some(key) = candidate.unique_key() else {
            return Ok(());
        };
        let key = key.to_lowercase();
        let clash = records.values().any(|existing| {
            existing.id() != candidate.id()
                && existing
                    .unique_key()
                    .is_some_and(|other| other.to_lowercase() == key)
        });

        if clash {
            Err(RepositoryError::Conflict(format!(
                "{} with key '{}'",
                T::RESOURCE,
                key
            )))
        } else {
            Ok(())
        }
    }
}

impl<T: Record> Repository<T> for InMemoryRepository<T> {
    fn insert(&self, mut record: T) -> Result<T, RepositoryError> {
        let mut guard = self.lock()?;
        record.set_id(0);
        Self::ensure_unique(&guard, &record)?;
        let id = self.sequence.fetch_add(1, Ordering::Relaxed);
        record.set_id(id);
        guard.insert(id, record.clone());
        Ok(record)
    }

    fn update(&self, record: T) -> Result<T, RepositoryError> {
        let mut guard = self.lock()?;
        if !guard.contains_key(&record.id()) {
            return Err(RepositoryError::NotFound);
        }
        Self::ensure_unique(&guard, &record)?;
        guard.insert(record.id(), record.clone());
        Ok(record)
    }

    fn fetch(&self, id: RecordId) -> Result<Option<T>, RepositoryError> {
        let guard = self.lock()?;
        Ok(guard.get(&id).cloned())
    }

    fn list(&self) -> Result<Vec<T>, RepositoryError> {
        let guard = self.lock()?;
        Ok(guard.values().cloned().collect())
    }

    fn delete(&self, id: RecordId) -> Result<T, RepositoryError> {
        let mut guard = self.lock()?;
        guard.remove(&id).ok_or(RepositoryError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Badge {
        id: RecordId,
        code: String,
    }

    impl Record for Badge {
        const RESOURCE: &'static str = "badge";

        fn id(&self) -> RecordId {
            self.id
        }

        fn set_id(&mut self, id: RecordId) {
            self.id = id;
        }

        fn unique_key(&self) -> Option<String> {
            Some(self.code.clone())
        }
    }

    fn badge(code: &str) -> Badge {
        Badge {
            id: 99,
            code: code.to_string(),
        }
    }

    #[test]
    fn insert_assigns_sequential_ids() {
        let repository = InMemoryRepository::new();
        let first = repository.insert(badge("A")).expect("insert");
        let second = repository.insert(badge("B")).expect("insert");
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(repository.list().expect("list").len(), 2);
    }

    #[test]
    fn insert_rejects_duplicate_keys_ignoring_case() {
        let repository = InMemoryRepository::new();
        repository.insert(badge("wood")).expect("insert");
        match repository.insert(badge("WOOD")) {
            Err(RepositoryError::Conflict(_)) => {}
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn update_keeps_own_key_but_rejects_clashes() {
        let repository = InMemoryRepository::new();
        let mut first = repository.insert(badge("A")).expect("insert");
        repository.insert(badge("B")).expect("insert");

        first.code = "a".to_string();
        repository.update(first.clone()).expect("same key allowed");

        first.code = "b".to_string();
        assert!(matches!(
            repository.update(first),
            Err(RepositoryError::Conflict(_))
        ));
    }

    #[test]
    fn update_and_delete_missing_records_fail() {
        let repository: InMemoryRepository<Badge> = InMemoryRepository::new();
        let mut ghost = badge("ghost");
        ghost.id = 7;
        assert!(matches!(
            repository.update(ghost),
            Err(RepositoryError::NotFound)
        ));
        assert!(matches!(
            repository.delete(7),
            Err(RepositoryError::NotFound)
        ));
    }

    #[test]
    fn clones_share_storage() {
        let repository = InMemoryRepository::new();
        let clone = repository.clone();
        let stored = repository.insert(badge("A")).expect("insert");
        assert_eq!(clone.fetch(stored.id).expect("fetch"), Some(stored));
    }
}
