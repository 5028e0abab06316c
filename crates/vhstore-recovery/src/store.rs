//! Durable configuration store boundary
//!
//! Provides the [`DurableConfigurationStore`] trait the recoverer reads from
//! and writes back to, and [`MemoryConfigurationStore`], an in-memory
//! implementation.

use crate::error::{StoreError, StoreResult};
use indexmap::IndexMap;
use parking_lot::RwLock;
use vhstore_record::{Record, RecordId};

/// Receives each stored record during open or reload
pub trait RecordHandler {
    /// Handle one record
    fn handle(&mut self, record: Record);
}

impl<F: FnMut(Record)> RecordHandler for F {
    fn handle(&mut self, record: Record) {
        self(record);
    }
}

/// Persistent store of configuration records
///
/// Implementations use interior locking; every method takes `&self`.
pub trait DurableConfigurationStore: Send + Sync {
    /// Open the store, enumerating every record through `handler`
    ///
    /// A store that has never held configuration is created holding
    /// `initial_records`.
    ///
    /// # Returns
    /// Whether the store was newly created
    ///
    /// # Errors
    /// Returns error if the backend cannot be opened
    fn open_configuration_store(
        &self,
        handler: &mut dyn RecordHandler,
        initial_records: &[Record],
    ) -> StoreResult<bool>;

    /// Enumerate every record of an open store through `handler`
    ///
    /// # Errors
    /// Returns [`StoreError::NotOpen`] if the store is not open
    fn reload(&self, handler: &mut dyn RecordHandler) -> StoreResult<()>;

    /// Replace records, creating unknown ones when `create_if_necessary`
    ///
    /// # Errors
    /// Returns [`StoreError::UnknownRecord`] for an unknown id when not
    /// creating; nothing is written in that case
    fn update(&self, create_if_necessary: bool, records: &[Record]) -> StoreResult<()>;

    /// Remove records
    ///
    /// # Returns
    /// Ids that were present and removed
    ///
    /// # Errors
    /// Returns [`StoreError::NotOpen`] if the store is not open
    fn remove(&self, records: &[Record]) -> StoreResult<Vec<RecordId>>;

    /// Add a record that must not exist yet
    ///
    /// # Errors
    /// Returns [`StoreError::DuplicateRecord`] if the id is already stored
    fn create(&self, record: &Record) -> StoreResult<()>;
}

#[derive(Debug, Default)]
struct MemoryState {
    open: bool,
    initialized: bool,
    records: IndexMap<RecordId, Record>,
}

impl MemoryState {
    fn require_open(&self) -> StoreResult<()> {
        if self.open {
            Ok(())
        } else {
            Err(StoreError::NotOpen)
        }
    }
}

/// In-memory configuration store
#[derive(Debug, Default)]
pub struct MemoryConfigurationStore {
    state: RwLock<MemoryState>,
}

impl MemoryConfigurationStore {
    /// Create a store that has never held configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds `records`
    #[must_use]
    pub fn with_records(records: impl IntoIterator<Item = Record>) -> Self {
        Self {
            state: RwLock::new(MemoryState {
                open: false,
                initialized: true,
                records: records.into_iter().map(|r| (r.id(), r)).collect(),
            }),
        }
    }

    /// Snapshot of the stored records in store order
    #[must_use]
    pub fn records(&self) -> Vec<Record> {
        self.state.read().records.values().cloned().collect()
    }

    /// Stored record by id
    #[must_use]
    pub fn get(&self, id: RecordId) -> Option<Record> {
        self.state.read().records.get(&id).cloned()
    }

    /// Number of stored records
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().records.len()
    }

    /// Whether the store holds no records
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.read().records.is_empty()
    }

    /// Close the store; records are kept
    pub fn close(&self) {
        self.state.write().open = false;
    }
}

impl DurableConfigurationStore for MemoryConfigurationStore {
    fn open_configuration_store(
        &self,
        handler: &mut dyn RecordHandler,
        initial_records: &[Record],
    ) -> StoreResult<bool> {
        let (is_new, snapshot) = {
            let mut state = self.state.write();
            let is_new = !state.initialized;
            if is_new {
                state.records = initial_records
                    .iter()
                    .map(|r| (r.id(), r.clone()))
                    .collect();
                state.initialized = true;
            }
            state.open = true;
            (is_new, state.records.values().cloned().collect::<Vec<_>>())
        };

        tracing::debug!(
            "Opened configuration store ({} records, new: {})",
            snapshot.len(),
            is_new
        );
        for record in snapshot {
            handler.handle(record);
        }
        Ok(is_new)
    }

    fn reload(&self, handler: &mut dyn RecordHandler) -> StoreResult<()> {
        let snapshot: Vec<Record> = {
            let state = self.state.read();
            state.require_open()?;
            state.records.values().cloned().collect()
        };
        for record in snapshot {
            handler.handle(record);
        }
        Ok(())
    }

    fn update(&self, create_if_necessary: bool, records: &[Record]) -> StoreResult<()> {
        let mut state = self.state.write();
        state.require_open()?;
        if !create_if_necessary {
            if let Some(unknown) = records.iter().find(|r| !state.records.contains_key(&r.id())) {
                return Err(StoreError::UnknownRecord(unknown.id()));
            }
        }
        for record in records {
            state.records.insert(record.id(), record.clone());
        }
        Ok(())
    }

    fn remove(&self, records: &[Record]) -> StoreResult<Vec<RecordId>> {
        let mut state = self.state.write();
        state.require_open()?;
        Ok(records
            .iter()
            .filter_map(|r| state.records.shift_remove(&r.id()).map(|_| r.id()))
            .collect())
    }

    fn create(&self, record: &Record) -> StoreResult<()> {
        let mut state = self.state.write();
        state.require_open()?;
        if state.records.contains_key(&record.id()) {
            return Err(StoreError::DuplicateRecord(record.id()));
        }
        state.records.insert(record.id(), record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vhstore_record::{category, RecordBuilder};

    fn queue(name: &str) -> Record {
        RecordBuilder::new(category::QUEUE).name(name).build()
    }

    fn open(store: &MemoryConfigurationStore, initial: &[Record]) -> (bool, Vec<Record>) {
        let mut seen = Vec::new();
        let is_new = store
            .open_configuration_store(&mut |record: Record| seen.push(record), initial)
            .unwrap();
        (is_new, seen)
    }

    #[test]
    fn first_open_seeds_initial_records() {
        let store = MemoryConfigurationStore::new();
        let (is_new, seen) = open(&store, &[queue("a")]);

        assert!(is_new);
        assert_eq!(seen.len(), 1);

        store.close();
        let (is_new, seen) = open(&store, &[queue("b"), queue("c")]);
        assert!(!is_new);
        assert_eq!(seen.len(), 1);
    }

    #[test]
    fn existing_store_ignores_initial_records() {
        let store = MemoryConfigurationStore::with_records([queue("a"), queue("b")]);
        let (is_new, seen) = open(&store, &[queue("c")]);
        assert!(!is_new);
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn operations_require_open_store() {
        let store = MemoryConfigurationStore::new();
        assert!(matches!(store.update(true, &[queue("a")]), Err(StoreError::NotOpen)));
        assert!(matches!(
            store.reload(&mut |_record: Record| {}),
            Err(StoreError::NotOpen)
        ));
    }

    #[test]
    fn update_without_create_rejects_unknown_ids_atomically() {
        let known = queue("known");
        let store = MemoryConfigurationStore::with_records([known.clone()]);
        open(&store, &[]);

        let renamed = known.with_attribute("name", "renamed");
        let err = store.update(false, &[renamed, queue("unknown")]).unwrap_err();

        assert!(matches!(err, StoreError::UnknownRecord(_)));
        assert_eq!(store.get(known.id()), Some(known));
    }

    #[test]
    fn remove_reports_only_present_ids() {
        let a = queue("a");
        let store = MemoryConfigurationStore::with_records([a.clone()]);
        open(&store, &[]);

        let removed = store.remove(&[a.clone(), queue("missing")]).unwrap();

        assert_eq!(removed, vec![a.id()]);
        assert!(store.is_empty());
    }

    #[test]
    fn create_rejects_duplicates() {
        let a = queue("a");
        let store = MemoryConfigurationStore::new();
        open(&store, &[a.clone()]);
        assert!(matches!(store.create(&a), Err(StoreError::DuplicateRecord(_))));
        assert!(store.create(&queue("b")).is_ok());
        assert_eq!(store.len(), 2);
    }
}
