//! Domain logic for multi-scene media generation.
//!
//! Everything in this crate is pure: no database, network, or clock access
//! beyond what callers pass in. The persistence, provider, and pipeline
//! crates build on these types.

pub mod catalog;
pub mod error;
pub mod generation_config;
pub mod health;
pub mod lifecycle;
pub mod planner;
pub mod policy;
pub mod priority;
pub mod shot;
pub mod task_status;
pub mod types;
