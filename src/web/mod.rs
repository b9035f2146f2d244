//! HTTP and WebSocket front end.
//! This file declares the other files in this directory as sub-modules.

pub mod api;
pub mod models;
pub mod ws;

pub use api::{AppState, create_router};
