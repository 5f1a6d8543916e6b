//! WebSocket stream of generation events.

pub mod handler;

pub use handler::ws_handler;
