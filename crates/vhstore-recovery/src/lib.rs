//! Upgrade-then-recover handoff for virtual-host configuration stores
//!
//! # Core Concepts
//!
//! - [`DurableConfigurationStore`]: Where records are read from and written back to
//! - [`RecoveryTarget`]: Builds the live object graph from upgraded records
//! - [`VirtualHostStoreRecoverer`]: Opens, upgrades, recovers, then subscribes
//! - [`StoreChangeListener`]: Persists later changes of durable objects
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use vhstore_recovery::{DurableConfigurationStore, MemoryConfigurationStore};
//! use vhstore_record::Record;
//!
//! let store: Arc<dyn DurableConfigurationStore> = Arc::new(MemoryConfigurationStore::new());
//! let mut seen = Vec::new();
//! let is_new = store
//!     .open_configuration_store(&mut |record: Record| seen.push(record), &[])
//!     .unwrap();
//! assert!(is_new);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod error;
mod listener;
mod object;
mod recoverer;
mod store;

pub use error::{RecoveryError, RecoveryResult, StoreError, StoreResult};
pub use listener::StoreChangeListener;
pub use object::{
    apply_recursively, same_listener, ChangeListener, ConfiguredObject, ListenerRef, ObjectRef,
    RecoveryTarget,
};
pub use recoverer::VirtualHostStoreRecoverer;
pub use store::{DurableConfigurationStore, MemoryConfigurationStore, RecordHandler};
