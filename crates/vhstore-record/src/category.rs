//! Well-known record categories and attribute keys

/// Root category of a virtual-host configuration store
pub const VIRTUAL_HOST: &str = "VirtualHost";

/// Exchange category
pub const EXCHANGE: &str = "Exchange";

/// Queue category
pub const QUEUE: &str = "Queue";

/// Standalone binding category (removed by the 7.0 model)
pub const BINDING: &str = "Binding";

/// Prefix carried by category tags written before model version 0.2
pub const QUALIFIED_PREFIX: &str = "org.apache.qpid.server.model.";

/// Short form of a category tag
///
/// `org.apache.qpid.server.model.Queue` and `Queue` both yield `Queue`.
#[inline]
#[must_use]
pub fn short_name(category: &str) -> &str {
    match category.rfind('.') {
        Some(idx) => &category[idx + 1..],
        None => category,
    }
}

/// Fully qualified form of a short category tag
#[inline]
#[must_use]
pub fn qualified_name(short: &str) -> String {
    format!("{QUALIFIED_PREFIX}{short}")
}
