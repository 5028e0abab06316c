//! Message-selector arguments carried on binding records

use serde_json::Value;
use vhstore_record::Attributes;

/// JMS selector filter argument
pub const JMS_SELECTOR: &str = "x-filter-jms-selector";

/// No-local filter argument
pub const NO_LOCAL: &str = "x-qpid-no-local";

/// Whether binding arguments carry a filter that would be enforced
///
/// A selector counts only when it is a non-blank string; no-local only when
/// it is true.
#[must_use]
pub fn arguments_contain_filter(arguments: &Attributes) -> bool {
    contains_selector(arguments) || contains_no_local(arguments)
}

/// Remove every filter argument
pub fn remove_filters(arguments: &mut Attributes) {
    arguments.shift_remove(JMS_SELECTOR);
    arguments.shift_remove(NO_LOCAL);
}

fn contains_selector(arguments: &Attributes) -> bool {
    arguments
        .get(JMS_SELECTOR)
        .and_then(Value::as_str)
        .is_some_and(|s| !s.trim().is_empty())
}

fn contains_no_local(arguments: &Attributes) -> bool {
    match arguments.get(NO_LOCAL) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}
