//! Virtual-host configuration records
//!
//! Immutable, versioned configuration records and the staging area an upgrade
//! phase writes into.
//!
//! # Core Concepts
//!
//! - [`Record`]: Immutable snapshot of one configuration entity
//! - [`StagingSet`]: Pending updates and deletes of one upgrade phase
//! - [`RecordSet`]: Authoritative ordered collection a staging set commits into
//! - [`category`] / [`attr`]: Well-known category tags and attribute keys
//!
//! # Example
//!
//! ```rust
//! use vhstore_record::{category, RecordBuilder, StagingSet};
//!
//! let queue = RecordBuilder::new(category::QUEUE).name("orders").build();
//!
//! let mut staging = StagingSet::new();
//! staging.stage_update(queue.with_attribute("durable", true));
//! assert_eq!(staging.update_count(), 1);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod attr;
pub mod category;
mod record;
mod record_set;
mod staging;

pub use record::{Attributes, Parents, Record, RecordBuilder, RecordError, RecordId};
pub use record_set::RecordSet;
pub use staging::StagingSet;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
