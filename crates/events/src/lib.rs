//! In-process generation event bus.
//!
//! - [`EventBus`]: publish/subscribe hub backed by `tokio::sync::broadcast`.
//! - [`GenerationEvent`]: per-group status, progress, and terminal results.

pub mod bus;

pub use bus::{EventBus, GenerationEvent, GenerationEventKind};
