//! 0.3 → 0.4: boolean queue exclusivity becomes an exclusivity policy
//!
//! `exclusive: true` becomes `"CONTAINER"` and `exclusive: false` becomes
//! `"NONE"`. An owner only means something for container-exclusive queues, so
//! it is dropped otherwise. Queues without a durability flag become durable.

use crate::error::UpgradeResult;
use crate::phase::{is_root, stage_root_version, UpgradePhase};
use serde_json::Value;
use vhstore_record::{attr, category, Record, StagingSet};

/// Policy for queues that were exclusive
pub const CONTAINER_POLICY: &str = "CONTAINER";

/// Policy for queues that were not exclusive
pub const NO_EXCLUSIVITY_POLICY: &str = "NONE";

/// Exclusivity-policy phase
#[derive(Debug, Default)]
pub struct ExclusivityPolicy;

impl ExclusivityPolicy {
    /// From-version
    pub const FROM: &'static str = "0.3";
    /// To-version
    pub const TO: &'static str = "0.4";

    fn upgrade_queue(queue: &Record) -> Record {
        let mut attributes = queue.attributes().clone();
        match queue.attribute(attr::EXCLUSIVE) {
            Some(Value::Bool(exclusive)) => {
                let policy = if *exclusive {
                    CONTAINER_POLICY
                } else {
                    NO_EXCLUSIVITY_POLICY
                };
                attributes.insert(attr::EXCLUSIVE.to_string(), Value::from(policy));
                if !exclusive {
                    attributes.shift_remove(attr::OWNER);
                }
            }
            _ => {
                attributes.shift_remove(attr::OWNER);
            }
        }
        if !queue.has_attribute(attr::DURABLE) {
            attributes.insert(attr::DURABLE.to_string(), Value::Bool(true));
        }
        queue.with_attributes(attributes)
    }
}

impl UpgradePhase for ExclusivityPolicy {
    fn from_version(&self) -> &'static str {
        Self::FROM
    }

    fn to_version(&self) -> &'static str {
        Self::TO
    }

    fn visit(&mut self, record: &Record, staging: &mut StagingSet) -> UpgradeResult<()> {
        if is_root(record) {
            stage_root_version(record, Self::TO, staging);
        } else if record.is_category(category::QUEUE) {
            staging.stage_update(Self::upgrade_queue(record));
        }
        Ok(())
    }

    fn complete(&mut self, _staging: &mut StagingSet) -> UpgradeResult<()> {
        Ok(())
    }
}
