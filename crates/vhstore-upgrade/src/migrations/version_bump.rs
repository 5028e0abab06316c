//! Steps that only advance the root record's version tag

use crate::error::UpgradeResult;
use crate::phase::{is_root, stage_root_version, UpgradePhase};
use vhstore_record::{Record, StagingSet};

/// Version-only phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionBump {
    from: &'static str,
    to: &'static str,
}

impl VersionBump {
    /// Create a version-only step
    #[inline]
    #[must_use]
    pub const fn new(from: &'static str, to: &'static str) -> Self {
        Self { from, to }
    }
}

impl UpgradePhase for VersionBump {
    fn from_version(&self) -> &'static str {
        self.from
    }

    fn to_version(&self) -> &'static str {
        self.to
    }

    fn visit(&mut self, record: &Record, staging: &mut StagingSet) -> UpgradeResult<()> {
        if is_root(record) {
            stage_root_version(record, self.to, staging);
        }
        Ok(())
    }

    fn complete(&mut self, _staging: &mut StagingSet) -> UpgradeResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vhstore_record::{attr, category, RecordBuilder};

    #[test]
    fn only_root_is_staged() {
        let root = RecordBuilder::new(category::VIRTUAL_HOST)
            .attribute(attr::MODEL_VERSION, "2.0")
            .build();
        let queue = RecordBuilder::new(category::QUEUE).name("q").build();
        let mut phase = VersionBump::new("2.0", "3.0");
        let mut staging = StagingSet::new();

        phase.visit(&root, &mut staging).unwrap();
        phase.visit(&queue, &mut staging).unwrap();
        phase.complete(&mut staging).unwrap();

        assert_eq!(staging.update_count(), 1);
        assert_eq!(
            staging.staged_update(root.id()).unwrap().string_attribute(attr::MODEL_VERSION),
            Some("3.0")
        );
    }
}
