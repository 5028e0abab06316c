//! Live object graph boundary
//!
//! The recoverer does not build the object graph itself; it hands records to
//! a [`RecoveryTarget`] and then subscribes to structural changes of the
//! resulting [`ConfiguredObject`]s so durable ones are written back.

use crate::error::RecoveryResult;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt::Debug;
use std::sync::Arc;
use vhstore_record::{Record, RecordId};

/// Shared handle to a live configured object
pub type ObjectRef = Arc<dyn ConfiguredObject>;

/// Shared handle to a change listener
pub type ListenerRef = Arc<dyn ChangeListener>;

/// A live entity built from a configuration record
pub trait ConfiguredObject: Send + Sync + Debug {
    /// Id of the backing record
    fn id(&self) -> RecordId;

    /// Category tag, e.g. `Queue`
    fn category(&self) -> &str;

    /// Whether changes to this object are persisted
    fn is_durable(&self) -> bool;

    /// Direct children
    fn children(&self) -> Vec<ObjectRef>;

    /// Current state as a configuration record
    fn as_record(&self) -> Record;

    /// Attach a listener
    ///
    /// # Returns
    /// `false` if the listener was already attached
    fn add_change_listener(&self, listener: ListenerRef) -> bool;

    /// Detach a listener
    ///
    /// # Returns
    /// Whether the listener was attached
    fn remove_change_listener(&self, listener: &ListenerRef) -> bool;
}

/// Receiver of structural and attribute changes
///
/// Every callback defaults to doing nothing.
pub trait ChangeListener: Send + Sync {
    /// `child` was added under `object`
    fn child_added(&self, _object: &ObjectRef, _child: &ObjectRef) {}

    /// `child` was removed from under `object`
    fn child_removed(&self, _object: &ObjectRef, _child: &ObjectRef) {}

    /// An attribute of `object` changed
    fn attribute_set(
        &self,
        _object: &ObjectRef,
        _name: &str,
        _old_value: Option<&Value>,
        _new_value: Option<&Value>,
    ) {
    }

    /// `object` was deleted
    fn deleted(&self, _object: &ObjectRef) {}
}

/// Whether two listener handles refer to the same listener
#[inline]
#[must_use]
pub fn same_listener(a: &ListenerRef, b: &ListenerRef) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a).cast::<()>(),
        Arc::as_ptr(b).cast::<()>(),
    )
}

/// Builds the live object graph from recovered records
///
/// Typically the virtual host node.
pub trait RecoveryTarget: Send + Sync {
    /// Name of the virtual host node
    fn name(&self) -> &str;

    /// Build the object graph from `records`
    ///
    /// # Errors
    /// Returns [`crate::RecoveryError::Graph`] if the records do not form a
    /// valid graph
    fn recover(&self, records: &[Record], is_new: bool) -> RecoveryResult<()>;

    /// The virtual host, once recovered
    fn virtual_host(&self) -> Option<ObjectRef>;

    /// Subscribe to changes of the target itself (virtual host added/removed)
    fn add_change_listener(&self, listener: ListenerRef);

    /// Rewrite every security-sensitive attribute through the store
    fn force_update_all_secure_attributes(&self);
}

/// Visit `object` and its descendants
///
/// `action` runs on every visited object; the children of an object are
/// visited only when `descend` holds for it. Each object is visited once.
pub fn apply_recursively(
    object: &ObjectRef,
    descend: &dyn Fn(&dyn ConfiguredObject) -> bool,
    action: &mut dyn FnMut(&ObjectRef),
) {
    let mut visited = HashSet::new();
    let mut pending = vec![Arc::clone(object)];
    while let Some(current) = pending.pop() {
        if !visited.insert(current.id()) {
            continue;
        }
        action(&current);
        if descend(current.as_ref()) {
            pending.extend(current.children());
        }
    }
}
