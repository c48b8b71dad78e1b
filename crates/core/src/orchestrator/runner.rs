//! Dispatch orchestrator implementation.
//!
//! Accepting a dispatch is synchronous up to the point the record exists;
//! delivery happens on background tasks tracked for graceful shutdown.

use std::sync::Arc;

use prometheus::IntGauge;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::channel::{AdapterRegistry, HealthStatus};
use crate::dispatch::{
    DispatchFilter, DispatchStatus, DispatchStore, DispatchWithChannels, NewDispatch,
};
use crate::entities::EntityStore;
use crate::metrics;

use super::config::OrchestratorConfig;
use super::pipeline::DeliveryPipeline;
use super::selector::select_channels;
use super::types::{
    BatchItemResult, BatchResult, ChannelHealth, DispatchRequest, DispatchResult, EntityKind,
    OrchestratorError, OrchestratorHealth,
};

/// Holds one unit of an in-flight gauge until dropped, including when the
/// owning task unwinds.
struct InFlightGuard(IntGauge);

impl InFlightGuard {
    fn enter(gauge: &IntGauge) -> Self {
        gauge.inc();
        Self(gauge.clone())
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.dec();
    }
}

/// Accepts dispatch requests and delivers them over the registered channels.
pub struct DispatchOrchestrator {
    pipeline: Arc<DeliveryPipeline>,
    tracker: TaskTracker,
}

impl DispatchOrchestrator {
    pub fn new(
        config: OrchestratorConfig,
        store: Arc<dyn DispatchStore>,
        entities: Arc<dyn EntityStore>,
        registry: AdapterRegistry,
    ) -> Self {
        Self {
            pipeline: Arc::new(DeliveryPipeline {
                config,
                store,
                entities,
                registry,
            }),
            tracker: TaskTracker::new(),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.pipeline.config
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.pipeline.registry
    }

    /// Accept a dispatch and start delivering it in the background.
    ///
    /// Returns as soon as the dispatch record exists, with status `pending`.
    /// Only a missing route or driver, or a store failure, is an error.
    pub async fn dispatch(
        &self,
        request: DispatchRequest,
    ) -> Result<DispatchResult, OrchestratorError> {
        let route = self
            .pipeline
            .entities
            .get_route(&request.route_id)?
            .ok_or_else(|| OrchestratorError::EntityNotFound {
                entity: EntityKind::Route,
                id: request.route_id.clone(),
            })?;
        let driver = self
            .pipeline
            .entities
            .get_driver(&request.driver_id)?
            .ok_or_else(|| OrchestratorError::EntityNotFound {
                entity: EntityKind::Driver,
                id: request.driver_id.clone(),
            })?;

        let channels = select_channels(&request, &driver, &self.pipeline.registry);
        let dispatch = self.pipeline.store.create_dispatch(NewDispatch {
            route_id: route.id.clone(),
            driver_id: driver.id.clone(),
            requested_channels: channels,
            metadata: request.metadata.clone(),
        })?;

        let mode = if request.multi_channel { "multi" } else { "single" };
        metrics::DISPATCHES_CREATED.with_label_values(&[mode]).inc();
        info!(
            dispatch_id = %dispatch.id,
            route_id = %route.id,
            driver_id = %driver.id,
            channels = ?dispatch.requested_channels,
            "Dispatch accepted"
        );

        let result = DispatchResult {
            dispatch_id: dispatch.id.clone(),
            status: DispatchStatus::Pending,
            requested_channels: dispatch.requested_channels.clone(),
        };

        let pipeline = Arc::clone(&self.pipeline);
        let in_flight = InFlightGuard::enter(&metrics::DELIVERIES_IN_FLIGHT);
        self.tracker.spawn(async move {
            let _in_flight = in_flight;
            pipeline
                .run(dispatch, route, driver, request.multi_channel)
                .await;
        });

        Ok(result)
    }

    /// Accept every request concurrently. One result per item, in input order.
    pub async fn dispatch_batch(&self, requests: Vec<DispatchRequest>) -> BatchResult {
        let items = requests
            .into_iter()
            .enumerate()
            .map(|(index, request)| async move {
                match self.dispatch(request).await {
                    Ok(result) => {
                        metrics::BATCH_ITEMS.with_label_values(&["success"]).inc();
                        BatchItemResult::dispatched(index, result.dispatch_id)
                    }
                    Err(e) => {
                        warn!(index, "Batch item rejected: {}", e);
                        metrics::BATCH_ITEMS.with_label_values(&["failure"]).inc();
                        BatchItemResult::failed(index, e.to_string())
                    }
                }
            });

        let result = BatchResult::from_results(futures::future::join_all(items).await);
        info!(
            total = result.summary.total,
            successful = result.summary.successful,
            failed = result.summary.failed,
            "Batch dispatch accepted"
        );
        result
    }

    pub fn get_dispatch(
        &self,
        dispatch_id: &str,
    ) -> Result<Option<DispatchWithChannels>, OrchestratorError> {
        Ok(self.pipeline.store.get_dispatch_with_channels(dispatch_id)?)
    }

    pub fn list_dispatches(
        &self,
        filter: &DispatchFilter,
    ) -> Result<Vec<crate::dispatch::Dispatch>, OrchestratorError> {
        Ok(self.pipeline.store.list_dispatches(filter)?)
    }

    pub fn count_dispatches(&self, filter: &DispatchFilter) -> Result<i64, OrchestratorError> {
        Ok(self.pipeline.store.count_dispatches(filter)?)
    }

    /// Probe the store and every registered adapter.
    pub async fn health(&self) -> OrchestratorHealth {
        let store = match self.pipeline.store.ping() {
            Ok(()) => HealthStatus::healthy("Database connected"),
            Err(e) => HealthStatus::unhealthy(e.to_string()),
        };

        let checks = self.pipeline.registry.iter().map(|adapter| async move {
            ChannelHealth {
                channel: adapter.channel_type(),
                status: adapter.health_check().await,
            }
        });
        let channels = futures::future::join_all(checks).await;

        OrchestratorHealth { store, channels }
    }

    /// Number of deliveries still running.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Stop accepting tracked work and wait for running deliveries to finish.
    pub async fn shutdown(&self) {
        self.tracker.close();
        debug!(in_flight = self.tracker.len(), "Waiting for deliveries to finish");
        self.tracker.wait().await;
        info!("Dispatch orchestrator drained");
    }
}
