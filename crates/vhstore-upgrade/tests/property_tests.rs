//! Property tests over generated legacy stores

use proptest::prelude::*;
use std::collections::HashSet;
use vhstore_record::{attr, category, Record, RecordBuilder, RecordId};
use vhstore_test_utils::{qualified, virtual_host, VIRTUAL_HOST_NAME};
use vhstore_upgrade::config::DEFAULT_EXCHANGES;
use vhstore_upgrade::{exchange_id, Migration, StoreUpgrader, UpgradeConfig, MODEL_VERSION};

const EXCHANGE_TYPES: [&str; 4] = ["direct", "topic", "fanout", "headers"];

#[derive(Debug, Clone)]
struct BindingSpec {
    exchange: usize,
    queue: usize,
    selector: bool,
}

fn binding_spec() -> impl Strategy<Value = BindingSpec> {
    (0..8usize, 0..8usize, any::<bool>()).prop_map(|(exchange, queue, selector)| BindingSpec {
        exchange,
        queue,
        selector,
    })
}

/// A 0.0 store; binding indices past the end point at the default topic
/// exchange (first index past the end) or at nothing
fn legacy_store(
    exchange_types: &[&'static str],
    queues: &[Option<bool>],
    bindings: &[BindingSpec],
) -> Vec<Record> {
    let root = RecordBuilder::new(qualified(category::VIRTUAL_HOST))
        .name(VIRTUAL_HOST_NAME)
        .build();
    let exchanges: Vec<Record> = exchange_types
        .iter()
        .enumerate()
        .map(|(i, exchange_type)| {
            RecordBuilder::new(qualified(category::EXCHANGE))
                .name(format!("ex{i}"))
                .attribute(attr::TYPE, *exchange_type)
                .parent(category::VIRTUAL_HOST, root.id())
                .build()
        })
        .collect();
    let queue_records: Vec<Record> = queues
        .iter()
        .enumerate()
        .map(|(i, exclusive)| {
            let builder = RecordBuilder::new(qualified(category::QUEUE))
                .name(format!("q{i}"))
                .attribute(attr::OWNER, "owner")
                .parent(category::VIRTUAL_HOST, root.id());
            match exclusive {
                Some(e) => builder.attribute(attr::EXCLUSIVE, *e),
                None => builder,
            }
            .build()
        })
        .collect();

    let topic_id = exchange_id(VIRTUAL_HOST_NAME, "amq.topic");
    let binding_records: Vec<Record> = bindings
        .iter()
        .enumerate()
        .map(|(i, spec)| {
            let exchange = match spec.exchange {
                n if n < exchanges.len() => exchanges[n].id(),
                n if n == exchanges.len() => topic_id,
                _ => RecordId::new_v4(),
            };
            let queue = queue_records
                .get(spec.queue)
                .map_or_else(RecordId::new_v4, Record::id);
            let builder = RecordBuilder::new(qualified(category::BINDING))
                .name(format!("key{i}"))
                .parent(category::EXCHANGE, exchange)
                .parent(category::QUEUE, queue);
            if spec.selector {
                builder.attribute(
                    attr::ARGUMENTS,
                    serde_json::json!({"x-filter-jms-selector": "a = 1"}),
                )
            } else {
                builder
            }
            .build()
        })
        .collect();

    let mut records = binding_records;
    records.extend(queue_records);
    records.extend(exchanges);
    records.push(root);
    records
}

fn upgrader() -> StoreUpgrader {
    StoreUpgrader::new(UpgradeConfig::new(VIRTUAL_HOST_NAME))
}

proptest! {
    #[test]
    fn prop_chain_is_idempotent(
        exchange_types in proptest::collection::vec(proptest::sample::select(EXCHANGE_TYPES.to_vec()), 0..4),
        queues in proptest::collection::vec(proptest::option::of(any::<bool>()), 0..4),
        bindings in proptest::collection::vec(binding_spec(), 0..8),
    ) {
        let records = legacy_store(&exchange_types, &queues, &bindings);

        let once = upgrader().upgrade(records).unwrap();
        prop_assert_eq!(once.final_version(), MODEL_VERSION);

        let first: Vec<Record> = once.records().iter().cloned().collect();
        let twice = upgrader().upgrade(first.clone()).unwrap();

        prop_assert!(twice.is_noop());
        prop_assert_eq!(twice.into_records(), first);
    }

    #[test]
    fn prop_no_binding_records_survive(
        exchange_types in proptest::collection::vec(proptest::sample::select(EXCHANGE_TYPES.to_vec()), 0..4),
        queues in proptest::collection::vec(proptest::option::of(any::<bool>()), 0..4),
        bindings in proptest::collection::vec(binding_spec(), 0..8),
    ) {
        let records = legacy_store(&exchange_types, &queues, &bindings);

        let outcome = upgrader().upgrade(records).unwrap();

        prop_assert!(outcome.records().iter().all(|r| !r.is_category(category::BINDING)));
    }

    #[test]
    fn prop_no_dangling_bindings_after_normalization(
        exchange_types in proptest::collection::vec(proptest::sample::select(EXCHANGE_TYPES.to_vec()), 0..4),
        queues in proptest::collection::vec(proptest::option::of(any::<bool>()), 0..4),
        bindings in proptest::collection::vec(binding_spec(), 0..8),
    ) {
        let records = legacy_store(&exchange_types, &queues, &bindings);
        let upgrader = StoreUpgrader::with_chain(
            [Migration::SelectorPruning, Migration::TypeNameNormalization],
            "0.2",
            UpgradeConfig::new(VIRTUAL_HOST_NAME),
        )
        .unwrap();

        let outcome = upgrader.upgrade(records).unwrap();
        let set = outcome.records();
        let defaults: HashSet<RecordId> = upgrader
            .context()
            .default_exchanges()
            .iter()
            .map(|e| e.id)
            .collect();

        for binding in set.iter().filter(|r| r.category() == category::BINDING) {
            let exchange = binding.parent(category::EXCHANGE).unwrap();
            let queue = binding.parent(category::QUEUE).unwrap();
            prop_assert!(
                defaults.contains(&exchange)
                    || set.get(exchange).is_some_and(|e| e.category() == category::EXCHANGE)
            );
            prop_assert!(set.get(queue).is_some_and(|q| q.category() == category::QUEUE));
        }
    }

    #[test]
    fn prop_default_exchanges_synthesized_exactly_once(
        present in proptest::collection::vec(any::<bool>(), 4),
    ) {
        let root = virtual_host(Some("0.4"));
        let mut records = vec![root.clone()];
        for ((name, exchange_type), keep) in DEFAULT_EXCHANGES.iter().zip(&present) {
            if *keep {
                records.push(
                    RecordBuilder::with_id(exchange_id(VIRTUAL_HOST_NAME, name), category::EXCHANGE)
                        .name(*name)
                        .attribute(attr::TYPE, *exchange_type)
                        .parent(category::VIRTUAL_HOST, root.id())
                        .build(),
                );
            }
        }
        let upgrader = StoreUpgrader::with_chain(
            [Migration::DefaultExchanges],
            "2.0",
            UpgradeConfig::new(VIRTUAL_HOST_NAME),
        )
        .unwrap();

        let before = records.len();
        let outcome = upgrader.upgrade(records).unwrap();

        let missing = present.iter().filter(|p| !**p).count();
        prop_assert_eq!(outcome.records().len(), before + missing);
        let exchanges = outcome
            .records()
            .iter()
            .filter(|r| r.category() == category::EXCHANGE)
            .count();
        prop_assert_eq!(exchanges, 4);
    }
}
