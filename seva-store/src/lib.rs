//! `Seva` document store library.
//!
//! Holds the single shared assignment document, accepts WebSocket clients,
//! authorizes writes by admin token and broadcasts every accepted write to
//! all connected clients.

pub mod auth;
pub mod config;
pub mod server;
pub mod store;
