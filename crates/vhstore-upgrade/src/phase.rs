//! Two-pass upgrade phase contract
//!
//! Provides the [`UpgradePhase`] trait every schema-version step implements.
//!
//! # Contract
//! 1. [`UpgradePhase::visit`] is called once per record of the pre-phase
//!    record set, in unspecified order. Decisions that need no cross-record
//!    information may be staged immediately.
//! 2. [`UpgradePhase::complete`] is called exactly once after every record has
//!    been visited. Anything that relates two records (a binding naming an
//!    exchange that may not have been visited yet) is resolved here.
//!
//! Nothing a phase stages is visible to the record set until the orchestrator
//! commits the phase, so `complete` may revise any decision `visit` made.

use crate::error::UpgradeResult;
use std::fmt::Debug;
use vhstore_record::{attr, category, Record, StagingSet};

/// One version-to-version schema transformation
///
/// Instances hold only phase-local working state and are dropped when the
/// phase commits.
pub trait UpgradePhase: Debug {
    /// Model version this phase upgrades from
    fn from_version(&self) -> &'static str;

    /// Model version this phase produces
    fn to_version(&self) -> &'static str;

    /// Visit one record of the pre-phase set
    ///
    /// # Errors
    /// Returns error if the record makes the configuration unrecoverable
    fn visit(&mut self, record: &Record, staging: &mut StagingSet) -> UpgradeResult<()>;

    /// Finish the phase once every record has been visited
    ///
    /// # Errors
    /// Returns error if cross-record resolution fails fatally
    fn complete(&mut self, staging: &mut StagingSet) -> UpgradeResult<()>;
}

/// Whether a record is the root (virtual host) record
#[inline]
#[must_use]
pub fn is_root(record: &Record) -> bool {
    record.is_category(category::VIRTUAL_HOST)
}

/// Stage the root record with its version tag advanced to `to_version`
///
/// Returns the staged replacement.
pub fn stage_root_version(record: &Record, to_version: &str, staging: &mut StagingSet) -> Record {
    let upgraded = record.with_attribute(attr::MODEL_VERSION, to_version);
    staging.stage_update(upgraded.clone());
    upgraded
}

#[cfg(test)]
mod tests {
    use super::*;
    use vhstore_record::RecordBuilder;

    #[test]
    fn stage_root_version_sets_tag() {
        let root = RecordBuilder::new(category::VIRTUAL_HOST)
            .attribute(attr::MODEL_VERSION, "0.3")
            .build();
        let mut staging = StagingSet::new();

        let upgraded = stage_root_version(&root, "0.4", &mut staging);

        assert_eq!(upgraded.string_attribute(attr::MODEL_VERSION), Some("0.4"));
        assert_eq!(staging.staged_update(root.id()), Some(&upgraded));
    }

    #[test]
    fn qualified_virtual_host_is_root() {
        let root = RecordBuilder::new("org.apache.qpid.server.model.VirtualHost").build();
        assert!(is_root(&root));
        assert!(!is_root(&RecordBuilder::new(category::QUEUE).build()));
    }
}
