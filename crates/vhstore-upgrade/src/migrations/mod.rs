//! Concrete upgrade phases, one module per behaviour

mod default_exchanges;
mod durable_bindings;
mod exclusivity;
mod queue_arguments;
mod selector_pruning;
mod type_names;
mod version_bump;

pub use default_exchanges::{DefaultExchanges, PERMANENT};
pub use durable_bindings::DurableBindings;
pub use exclusivity::{ExclusivityPolicy, CONTAINER_POLICY, NO_EXCLUSIVITY_POLICY};
pub use queue_arguments::{convert_wire_arguments, QueueArgumentFlattening, WIRE_TO_MODEL};
pub use selector_pruning::SelectorPruning;
pub use type_names::TypeNameNormalization;
pub use version_bump::VersionBump;
