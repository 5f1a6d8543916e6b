//! Generation pipeline: model health, fallback resolution, and the task
//! state machine that drives one group through a provider.
//!
//! [`GenerationSupervisor`] is the entry point the HTTP layer talks to. It
//! owns one [`orchestrator::TaskOrchestrator`] per running group and resumes
//! in-flight groups after a restart.

pub mod config;
pub mod error;
pub mod health;
pub mod orchestrator;
pub mod resolver;
pub mod supervisor;

pub use config::PipelineConfig;
pub use error::PipelineError;
pub use health::ModelHealthTracker;
pub use orchestrator::{GroupOutcome, OrchestratorContext};
pub use resolver::{ModelPriorityResolver, ResolvedModel};
pub use supervisor::GenerationSupervisor;
