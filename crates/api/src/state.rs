use std::sync::Arc;

use aiyou_events::EventBus;
use aiyou_pipeline::{
    GenerationSupervisor, ModelHealthTracker, ModelPriorityResolver, OrchestratorContext,
    PipelineConfig, PipelineError,
};
use aiyou_providers::ProviderRegistry;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: everything but the pool sits behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: aiyou_db::DbPool,
    pub config: Arc<ServerConfig>,
    /// Owner of every running generation.
    pub supervisor: Arc<GenerationSupervisor>,
    pub health: Arc<ModelHealthTracker>,
    pub resolver: Arc<ModelPriorityResolver>,
    pub registry: Arc<ProviderRegistry>,
    /// Generation events, forwarded to WebSocket clients.
    pub event_bus: Arc<EventBus>,
}

impl AppState {
    /// Assemble state around a supervisor, sharing its pipeline context.
    pub fn new(config: ServerConfig, supervisor: Arc<GenerationSupervisor>) -> Self {
        let ctx = supervisor.context().clone();
        Self {
            pool: ctx.pool,
            config: Arc::new(config),
            supervisor,
            health: ctx.health,
            resolver: ctx.resolver,
            registry: ctx.registry,
            event_bus: ctx.events,
        }
    }
}

/// Wire the health tracker, resolver, and event bus around `registry` and
/// return the supervisor that owns them.
///
/// Health counters are loaded from the database before anything runs.
pub async fn build_supervisor(
    pool: aiyou_db::DbPool,
    registry: Arc<ProviderRegistry>,
    config: &PipelineConfig,
) -> Result<Arc<GenerationSupervisor>, PipelineError> {
    let health = Arc::new(ModelHealthTracker::load(pool.clone()).await?);
    let resolver = Arc::new(ModelPriorityResolver::new(
        pool.clone(),
        Arc::clone(&registry),
        Arc::clone(&health),
    ));
    let ctx = OrchestratorContext {
        pool,
        registry,
        health,
        resolver,
        events: Arc::new(EventBus::default()),
        policy: config.policy(),
    };
    Ok(Arc::new(GenerationSupervisor::new(ctx, config)))
}
