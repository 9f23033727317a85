//! Test repositories: `EventRepository` implementations for tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use postwall_core::error::DomainError;
use postwall_core::repository::{EventRepository, NO_VERSION, StoredEvent, assign_versions};
use uuid::Uuid;

/// An in-memory event store with the real optimistic-concurrency rules:
/// versions are assigned by the store, gapless per aggregate, and a batch is
/// rejected whole when the expected version is stale.
#[derive(Debug, Default)]
pub struct InMemoryEventRepository {
    log: Mutex<Vec<StoredEvent>>,
}

impl InMemoryEventRepository {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every stored event in append order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn all_events(&self) -> Vec<StoredEvent> {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventRepository for InMemoryEventRepository {
    async fn load_events(&self, aggregate_id: Uuid) -> Result<Vec<StoredEvent>, DomainError> {
        Ok(self
            .log
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .cloned()
            .collect())
    }

    async fn append_events(
        &self,
        aggregate_id: Uuid,
        expected_version: i64,
        events: &[StoredEvent],
    ) -> Result<Vec<StoredEvent>, DomainError> {
        if events.is_empty() {
            return Ok(Vec::new());
        }
        let mut log = self.log.lock().unwrap();
        let actual = log
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .map(|e| e.version)
            .max()
            .unwrap_or(NO_VERSION);
        if actual != expected_version {
            return Err(DomainError::ConcurrencyConflict {
                aggregate_id,
                expected: expected_version,
                actual,
            });
        }
        let committed = assign_versions(expected_version, events);
        log.extend(committed.iter().cloned());
        Ok(committed)
    }

    async fn list_aggregate_ids(&self) -> Result<Vec<Uuid>, DomainError> {
        let mut ids: Vec<Uuid> = Vec::new();
        for event in self.log.lock().unwrap().iter() {
            if !ids.contains(&event.aggregate_id) {
                ids.push(event.aggregate_id);
            }
        }
        Ok(ids)
    }
}

/// An event repository that records all `append_events` calls. Returns the
/// configured history from every `load_events` call and always accepts
/// appends, assigning versions after the expected version.
#[derive(Debug)]
pub struct RecordingEventRepository {
    load_result: Vec<StoredEvent>,
    appended: Mutex<Vec<(Uuid, i64, Vec<StoredEvent>)>>,
}

impl RecordingEventRepository {
    /// Create a new recording repository that will return `history` from
    /// every `load_events` call.
    #[must_use]
    pub fn new(history: Vec<StoredEvent>) -> Self {
        Self {
            load_result: history,
            appended: Mutex::new(Vec::new()),
        }
    }

    /// Returns a snapshot of all events that were appended, as
    /// `(aggregate_id, expected_version, events)`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn appended_events(&self) -> Vec<(Uuid, i64, Vec<StoredEvent>)> {
        self.appended.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventRepository for RecordingEventRepository {
    async fn load_events(&self, _aggregate_id: Uuid) -> Result<Vec<StoredEvent>, DomainError> {
        Ok(self.load_result.clone())
    }

    async fn append_events(
        &self,
        aggregate_id: Uuid,
        expected_version: i64,
        events: &[StoredEvent],
    ) -> Result<Vec<StoredEvent>, DomainError> {
        self.appended
            .lock()
            .unwrap()
            .push((aggregate_id, expected_version, events.to_vec()));
        Ok(assign_versions(expected_version, events))
    }

    async fn list_aggregate_ids(&self) -> Result<Vec<Uuid>, DomainError> {
        let mut ids: Vec<Uuid> = Vec::new();
        for event in &self.load_result {
            if !ids.contains(&event.aggregate_id) {
                ids.push(event.aggregate_id);
            }
        }
        Ok(ids)
    }
}

/// An event repository that always returns an empty event list and silently
/// accepts appends. Useful for testing "aggregate not found" scenarios and
/// creation commands.
#[derive(Debug)]
pub struct EmptyEventRepository;

#[async_trait]
impl EventRepository for EmptyEventRepository {
    async fn load_events(&self, _aggregate_id: Uuid) -> Result<Vec<StoredEvent>, DomainError> {
        Ok(vec![])
    }

    async fn append_events(
        &self,
        _aggregate_id: Uuid,
        expected_version: i64,
        events: &[StoredEvent],
    ) -> Result<Vec<StoredEvent>, DomainError> {
        Ok(assign_versions(expected_version, events))
    }

    async fn list_aggregate_ids(&self) -> Result<Vec<Uuid>, DomainError> {
        Ok(vec![])
    }
}

/// An event repository that always returns an infrastructure error. Useful for
/// testing error-handling paths.
#[derive(Debug)]
pub struct FailingEventRepository;

#[async_trait]
impl EventRepository for FailingEventRepository {
    async fn load_events(&self, _aggregate_id: Uuid) -> Result<Vec<StoredEvent>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn append_events(
        &self,
        _aggregate_id: Uuid,
        _expected_version: i64,
        _events: &[StoredEvent],
    ) -> Result<Vec<StoredEvent>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn list_aggregate_ids(&self) -> Result<Vec<Uuid>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }
}

/// Wraps an [`InMemoryEventRepository`] and rejects the first `conflicts`
/// appends with a concurrency conflict, as if another writer got there first.
#[derive(Debug)]
pub struct ConflictingEventRepository {
    inner: InMemoryEventRepository,
    remaining: AtomicUsize,
    attempts: AtomicUsize,
}

impl ConflictingEventRepository {
    /// Creates a store that fails its next `conflicts` appends.
    #[must_use]
    pub fn new(inner: InMemoryEventRepository, conflicts: usize) -> Self {
        Self {
            inner,
            remaining: AtomicUsize::new(conflicts),
            attempts: AtomicUsize::new(0),
        }
    }

    /// Returns how many appends were attempted.
    pub fn append_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Returns the wrapped store.
    pub fn inner(&self) -> &InMemoryEventRepository {
        &self.inner
    }
}

#[async_trait]
impl EventRepository for ConflictingEventRepository {
    async fn load_events(&self, aggregate_id: Uuid) -> Result<Vec<StoredEvent>, DomainError> {
        self.inner.load_events(aggregate_id).await
    }

    async fn append_events(
        &self,
        aggregate_id: Uuid,
        expected_version: i64,
        events: &[StoredEvent],
    ) -> Result<Vec<StoredEvent>, DomainError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let conflict = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if conflict {
            return Err(DomainError::ConcurrencyConflict {
                aggregate_id,
                expected: expected_version,
                actual: expected_version + 1,
            });
        }
        self.inner
            .append_events(aggregate_id, expected_version, events)
            .await
    }

    async fn list_aggregate_ids(&self) -> Result<Vec<Uuid>, DomainError> {
        self.inner.list_aggregate_ids().await
    }
}
