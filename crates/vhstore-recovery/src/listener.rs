//! Write-back of live changes to the configuration store
//!
//! [`StoreChangeListener`] is attached to every durable object after
//! recovery. Child additions and removals may arrive concurrently; attaching
//! to or detaching from a subtree is serialized per parent id so a concurrent
//! add and the recursive walk cannot interleave.

use crate::object::{apply_recursively, ChangeListener, ConfiguredObject, ListenerRef, ObjectRef};
use crate::store::DurableConfigurationStore;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Weak};
use vhstore_record::RecordId;

/// Persists changes of durable objects
pub struct StoreChangeListener {
    store: Arc<dyn DurableConfigurationStore>,
    parent_locks: DashMap<RecordId, Arc<Mutex<()>>>,
    this: Weak<StoreChangeListener>,
}

impl StoreChangeListener {
    /// Create a listener writing to `store`
    #[must_use]
    pub fn new(store: Arc<dyn DurableConfigurationStore>) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            store,
            parent_locks: DashMap::new(),
            this: this.clone(),
        })
    }

    fn as_listener(&self) -> Option<ListenerRef> {
        self.this.upgrade().map(|this| this as ListenerRef)
    }

    fn parent_lock(&self, parent: RecordId) -> Arc<Mutex<()>> {
        Arc::clone(self.parent_locks.entry(parent).or_default().value())
    }

    /// Attach to `object` and every durable object below it
    ///
    /// Descends only through durable objects.
    ///
    /// # Returns
    /// Number of objects this listener was newly attached to
    pub fn attach(&self, object: &ObjectRef) -> usize {
        let Some(listener) = self.as_listener() else {
            return 0;
        };
        let mut attached = 0;
        apply_recursively(object, &is_durable, &mut |current| {
            if current.is_durable() && current.add_change_listener(Arc::clone(&listener)) {
                attached += 1;
            }
        });
        attached
    }

    /// Persist `object` and its durable descendants, attaching to each
    pub fn persist_and_attach(&self, object: &ObjectRef) {
        let Some(listener) = self.as_listener() else {
            return;
        };
        apply_recursively(object, &is_durable, &mut |current| {
            if !current.is_durable() {
                return;
            }
            if let Err(e) = self.store.update(true, &[current.as_record()]) {
                tracing::error!("Failed to persist {}[{}]: {}", current.category(), current.id(), e);
            }
            current.add_change_listener(Arc::clone(&listener));
        });
    }

    /// Detach from `object` and every durable object below it
    pub fn detach(&self, object: &ObjectRef) {
        let Some(listener) = self.as_listener() else {
            return;
        };
        apply_recursively(object, &is_durable, &mut |current| {
            current.remove_change_listener(&listener);
        });
    }
}

fn is_durable(object: &dyn ConfiguredObject) -> bool {
    object.is_durable()
}

impl fmt::Debug for StoreChangeListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreChangeListener")
            .field("parent_locks", &self.parent_locks.len())
            .finish_non_exhaustive()
    }
}

impl ChangeListener for StoreChangeListener {
    fn child_added(&self, object: &ObjectRef, child: &ObjectRef) {
        if !child.is_durable() {
            return;
        }
        let lock = self.parent_lock(object.id());
        let _guard = lock.lock();
        tracing::debug!("Persisting new child {}[{}]", child.category(), child.id());
        self.persist_and_attach(child);
    }

    fn child_removed(&self, object: &ObjectRef, child: &ObjectRef) {
        let lock = self.parent_lock(object.id());
        let _guard = lock.lock();
        self.detach(child);
    }

    fn attribute_set(
        &self,
        object: &ObjectRef,
        name: &str,
        _old_value: Option<&Value>,
        _new_value: Option<&Value>,
    ) {
        if !object.is_durable() {
            return;
        }
        if let Err(e) = self.store.update(false, &[object.as_record()]) {
            tracing::error!(
                "Failed to persist attribute '{}' of {}[{}]: {}",
                name,
                object.category(),
                object.id(),
                e
            );
        }
    }

    fn deleted(&self, object: &ObjectRef) {
        if object.is_durable() {
            if let Err(e) = self.store.remove(&[object.as_record()]) {
                tracing::error!("Failed to remove {}[{}]: {}", object.category(), object.id(), e);
            }
        }
        if let Some(listener) = self.as_listener() {
            object.remove_change_listener(&listener);
        }
        // a lock still held or awaited elsewhere must stay the only lock for its id
        self.parent_locks
            .remove_if(&object.id(), |_, lock| Arc::strong_count(lock) == 1);
    }
}
