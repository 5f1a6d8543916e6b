//! HTTP sidecar for the generation pipeline.
//!
//! The binary in `main.rs` wires configuration, the database, providers,
//! and the [`aiyou_pipeline::GenerationSupervisor`] into [`state::AppState`]
//! and serves [`router::build_app_router`]. Integration tests build the same
//! router against an in-memory database.

pub mod config;
pub mod error;
pub mod handlers;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
pub mod ws;
