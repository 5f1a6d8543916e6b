//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&DbPool` as the first argument.

pub mod generation_task_repo;
pub mod model_health_repo;
pub mod model_priority_repo;
pub mod resume_ledger_repo;
pub mod task_group_repo;

pub use generation_task_repo::GenerationTaskRepo;
pub use model_health_repo::ModelHealthRepo;
pub use model_priority_repo::ModelPriorityRepo;
pub use resume_ledger_repo::ResumeLedgerRepo;
pub use task_group_repo::TaskGroupRepo;
