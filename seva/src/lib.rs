//! `Seva`: household seva assignments with a fair weekly rotation.

pub mod auth;
pub mod config;
pub mod render;
pub mod roster;
pub mod store;
