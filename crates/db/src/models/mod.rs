//! Row structs and DTOs.
//!
//! Each submodule contains a `FromRow` + `Serialize` entity struct matching
//! the database row, plus any insert DTOs its repository accepts.

pub mod generation_task;
pub mod model_health;
pub mod model_priority;
pub mod task_group;
