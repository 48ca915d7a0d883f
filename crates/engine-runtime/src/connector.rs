use engine_config::sync::SyncSettings;
use engine_core::{
    connectors::broker::BrokerClient,
    error::{BrokerError, StoreError},
    state::MetadataStore,
};
use engine_processing::{
    context::SyncContext,
    error::SyncError,
    pool::WorkerPool,
    protocol::Dispatcher,
    script::context::ScriptContext,
};
use model::records::result::TransformResult;
use std::sync::Arc;
use tracing::info;

pub(crate) type ScriptPool = WorkerPool<ScriptContext, TransformResult>;

/// Sink that transforms records with a Lua script and produces them to Kafka.
pub struct KafkaConnector {
    pub(crate) broker: Arc<dyn BrokerClient>,
    pub(crate) store: Arc<dyn MetadataStore>,
    pub(crate) settings: SyncSettings,
}

impl KafkaConnector {
    pub fn new(
        broker: Arc<dyn BrokerClient>,
        store: Arc<dyn MetadataStore>,
        settings: SyncSettings,
    ) -> Self {
        KafkaConnector {
            broker,
            store,
            settings,
        }
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub async fn connection_active(&self) -> Result<(), BrokerError> {
        self.broker.ping().await
    }

    pub async fn last_offset(&self, flow: &str) -> Result<i64, StoreError> {
        self.store.last_offset(flow).await
    }

    pub async fn last_sync_batch_id(&self, flow: &str) -> Result<i64, StoreError> {
        self.store.last_sync_batch_id(flow).await
    }

    pub fn close(&self) {
        info!("Closing kafka connector");
        self.broker.close();
    }

    /// Builds one script context per worker; fails if any of them cannot load.
    pub(crate) async fn create_pool(
        &self,
        script: &str,
        flow: &str,
        dispatcher: Dispatcher,
        ctx: &SyncContext,
    ) -> Result<ScriptPool, SyncError> {
        let source = script.to_string();
        let flow_name = flow.to_string();

        WorkerPool::new(
            self.settings.worker_pool_size,
            move |_| ScriptContext::load(&source, &flow_name).map_err(SyncError::from),
            move |result| dispatcher.dispatch(result),
            ctx.clone(),
        )
        .await
    }

    /// Drains the pool and flushes the broker one last time. Errors here end
    /// the session.
    pub(crate) async fn drain(
        &self,
        pool: &mut ScriptPool,
        ctx: &SyncContext,
    ) -> Result<(), SyncError> {
        pool.wait().await?;

        tokio::select! {
            biased;
            _ = ctx.cancelled() => return Err(ctx.cause().unwrap_or(SyncError::Cancelled)),
            flushed = self.broker.flush() => flushed
                .map_err(|e| SyncError::Finalize(format!("final flush error: {e}")))?,
        }

        // A delivery may have failed while the final flush was running.
        ctx.check()
    }
}
