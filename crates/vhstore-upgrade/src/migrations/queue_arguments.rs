//! 0.2 → 0.3: flatten queue wire arguments into model attributes
//!
//! Queues used to keep broker-specific settings in a nested `arguments`
//! mapping under their wire names. Known wire names are promoted to the
//! top-level attribute mapping under their model names; an attribute already
//! present at the top level wins.

use crate::error::UpgradeResult;
use crate::phase::{is_root, stage_root_version, UpgradePhase};
use serde_json::Value;
use vhstore_record::{attr, category, Attributes, Record, StagingSet};

/// Wire argument name → model attribute name
pub const WIRE_TO_MODEL: &[(&str, &str)] = &[
    ("x-qpid-minimum-alert-repeat-gap", "alertRepeatGap"),
    ("x-qpid-maximum-message-age", "alertThresholdMessageAge"),
    ("x-qpid-maximum-message-size", "alertThresholdMessageSize"),
    ("x-qpid-maximum-message-count", "alertThresholdQueueDepthMessages"),
    ("x-qpid-maximum-queue-depth", "alertThresholdQueueDepthBytes"),
    ("qpid.alert_count", "alertThresholdQueueDepthMessages"),
    ("qpid.alert_size", "alertThresholdQueueDepthBytes"),
    ("qpid.alert_repeat_gap", "alertRepeatGap"),
    ("x-qpid-capacity", "queueFlowControlSizeBytes"),
    ("qpid.max_size", "queueFlowControlSizeBytes"),
    ("x-qpid-flow-resume-capacity", "queueFlowResumeSizeBytes"),
    ("x-qpid-priorities", "priorities"),
    ("x-qpid-description", "description"),
    (attr::DLQ_ENABLED, attr::DLQ_ENABLED),
    ("x-qpid-maximum-delivery-count", "maximumDeliveryAttempts"),
    ("qpid.group_header_key", "messageGroupKey"),
    (SHARED_MESSAGE_GROUP, "messageGroupSharedGroups"),
    ("qpid.default-message-group", "messageGroupDefaultGroup"),
    (LAST_VALUE_QUEUE_KEY, LVQ_KEY),
    ("qpid.queue_sort_key", "sortKey"),
];

const SHARED_MESSAGE_GROUP: &str = "qpid.shared_msg_group";
const LAST_VALUE_QUEUE: &str = "qpid.last_value_queue";
const LAST_VALUE_QUEUE_KEY: &str = "qpid.last_value_queue_key";
const LVQ_KEY: &str = "lvqKey";
const DEFAULT_LVQ_KEY: &str = "qpid.LVQ_key";

/// Convert wire-named queue arguments to model attributes
///
/// Unknown wire names are not promoted.
#[must_use]
pub fn convert_wire_arguments(arguments: &Attributes) -> Attributes {
    let mut model = Attributes::new();
    for (wire, value) in arguments {
        let Some(&(_, model_name)) = WIRE_TO_MODEL.iter().find(|(w, _)| *w == wire.as_str()) else {
            continue;
        };
        let value = if wire == SHARED_MESSAGE_GROUP {
            Value::Bool(is_shared_group_flag(value))
        } else {
            value.clone()
        };
        model.insert(model_name.to_string(), value);
    }

    if arguments.contains_key(LAST_VALUE_QUEUE) && !arguments.contains_key(LAST_VALUE_QUEUE_KEY) {
        model.insert(LVQ_KEY.to_string(), Value::from(DEFAULT_LVQ_KEY));
    }
    model
}

fn is_shared_group_flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64() == Some(1),
        Value::String(s) => s == "1",
        _ => false,
    }
}

/// Queue-argument flattening phase
#[derive(Debug, Default)]
pub struct QueueArgumentFlattening;

impl QueueArgumentFlattening {
    /// From-version
    pub const FROM: &'static str = "0.2";
    /// To-version
    pub const TO: &'static str = "0.3";
}

impl UpgradePhase for QueueArgumentFlattening {
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
            let mut attributes = record
                .attribute(attr::ARGUMENTS)
                .and_then(Value::as_object)
                .map(convert_wire_arguments)
                .unwrap_or_default();
            for (key, value) in record.attributes() {
                attributes.insert(key.clone(), value.clone());
            }
            staging.stage_update(record.with_attributes(attributes));
        }
        Ok(())
    }

    fn complete(&mut self, _staging: &mut StagingSet) -> UpgradeResult<()> {
        Ok(())
    }
}
