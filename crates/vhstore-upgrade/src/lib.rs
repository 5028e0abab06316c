//! Versioned upgrade chain for virtual-host configuration stores
//!
//! Brings a persisted record set from whatever model version it was written
//! in up to [`MODEL_VERSION`], one contiguous step at a time.
//!
//! # Core Concepts
//!
//! - [`UpgradePhase`]: Two-pass contract (visit every record, then complete)
//! - [`Migration`]: Closed set of steps; [`STANDARD_CHAIN`] orders them
//! - [`StoreUpgrader`]: Selects, runs and commits steps until the target
//! - [`PhaseSink`]: Receives each committed phase for persistence
//!
//! # Example
//!
//! ```rust
//! use vhstore_record::{attr, category, RecordBuilder};
//! use vhstore_upgrade::{StoreUpgrader, UpgradeConfig, MODEL_VERSION};
//!
//! let root = RecordBuilder::new(category::VIRTUAL_HOST)
//!     .name("test")
//!     .attribute(attr::MODEL_VERSION, "6.1")
//!     .build();
//!
//! let upgrader = StoreUpgrader::new(UpgradeConfig::new("test"));
//! let outcome = upgrader.upgrade([root]).unwrap();
//! assert_eq!(outcome.final_version(), MODEL_VERSION);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod config;
mod error;
pub mod filter;
mod migration;
pub mod migrations;
mod phase;
mod upgrader;

pub use config::{exchange_id, DefaultExchange, PhaseContext, UpgradeConfig};
pub use error::{UpgradeError, UpgradeResult};
pub use migration::{Migration, INITIAL_MODEL_VERSION, MODEL_VERSION, STANDARD_CHAIN};
pub use phase::{is_root, stage_root_version, UpgradePhase};
pub use upgrader::{DiscardSink, PhaseCommit, PhaseSink, StoreUpgrader, UpgradeOutcome};
