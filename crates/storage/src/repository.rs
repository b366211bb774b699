use async_trait::async_trait;
use academy_core::model::ProgressState;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Fixed key the progress record is stored under.
pub const PROGRESS_KEY: &str = "api-academy-progress";

const LAST_VISITED: &str = "lastVisited";

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Persisted shape of the progress aggregate.
///
/// On disk this is a single JSON object: the `ProgressState` fields plus a
/// `lastVisited` timestamp refreshed on every save.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressRecord {
    pub state: ProgressState,
    pub last_visited: Option<DateTime<Utc>>,
}

impl ProgressRecord {
    #[must_use]
    pub fn new(state: ProgressState, last_visited: DateTime<Utc>) -> Self {
        Self {
            state,
            last_visited: Some(last_visited),
        }
    }

    /// Serialize to the stored JSON payload.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the state cannot be encoded.
    pub fn to_json(&self) -> Result<String, StorageError> {
        let mut value = serde_json::to_value(&self.state)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let Value::Object(doc) = &mut value else {
            return Err(StorageError::Serialization(
                "progress state is not a JSON object".into(),
            ));
        };
        match self.last_visited {
            Some(at) => doc.insert(LAST_VISITED.into(), Value::String(at.to_rfc3339())),
            None => doc.remove(LAST_VISITED),
        };
        serde_json::to_string(&value).map_err(|e| StorageError::Serialization(e.to_string()))
    }

    /// Parse a stored payload. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` for malformed payloads.
    pub fn from_json(payload: &str) -> Result<Self, StorageError> {
        let mut value: Value =
            serde_json::from_str(payload).map_err(|e| StorageError::Serialization(e.to_string()))?;
        let Value::Object(doc) = &mut value else {
            return Err(StorageError::Serialization(
                "stored progress is not a JSON object".into(),
            ));
        };
        let last_visited = doc
            .remove(LAST_VISITED)
            .and_then(|v| v.as_str().and_then(|s| DateTime::parse_from_rfc3339(s).ok()))
            .map(|at| at.with_timezone(&Utc));
        let state =
            serde_json::from_value(value).map_err(|e| StorageError::Serialization(e.to_string()))?;
        Ok(Self {
            state,
            last_visited,
        })
    }
}

/// Durable storage for the single progress record.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Fetch the stored record, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend is unreachable or the payload is
    /// malformed.
    async fn load(&self) -> Result<Option<ProgressRecord>, StorageError>;

    /// Persist or replace the record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn save(&self, record: &ProgressRecord) -> Result<(), StorageError>;

    /// Remove the record. Removing a missing record is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend is unreachable.
    async fn clear(&self) -> Result<(), StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
///
/// Stores the serialized payload so round-trips go through the same JSON
/// layout as the durable backends.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    records: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Store a raw payload, bypassing serialization.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn put_raw(&self, payload: impl Into<String>) -> Result<(), StorageError> {
        let mut guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(PROGRESS_KEY.to_string(), payload.into());
        Ok(())
    }

    /// The raw stored payload, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn raw(&self) -> Result<Option<String>, StorageError> {
        let guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(PROGRESS_KEY).cloned())
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn load(&self) -> Result<Option<ProgressRecord>, StorageError> {
        self.raw()?
            .map(|payload| ProgressRecord::from_json(&payload))
            .transpose()
    }

    async fn save(&self, record: &ProgressRecord) -> Result<(), StorageError> {
        self.put_raw(record.to_json()?)
    }

    async fn clear(&self) -> Result<(), StorageError> {
        let mut guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.remove(PROGRESS_KEY);
        Ok(())
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub progress: Arc<dyn ProgressRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let progress: Arc<dyn ProgressRepository> = Arc::new(InMemoryRepository::new());
        Self { progress }
    }
}
