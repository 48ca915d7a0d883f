#![allow(dead_code)]

use engine_config::sync::SyncSettings;
use engine_core::state::memory::MemoryMetadataStore;
use engine_runtime::connector::KafkaConnector;
use std::sync::Arc;

pub mod broker;
pub mod utils;

use broker::ScriptedBroker;

pub const FLOW: &str = "orders_to_kafka";

/// A connector over `broker` and a fresh in-memory store.
pub fn connector(
    broker: Arc<ScriptedBroker>,
    workers: usize,
) -> (KafkaConnector, Arc<MemoryMetadataStore>) {
    let store = Arc::new(MemoryMetadataStore::new());
    let settings = SyncSettings::default().with_worker_pool_size(workers);
    (KafkaConnector::new(broker, store.clone(), settings), store)
}
