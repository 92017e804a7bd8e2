//! Shared definitions for `Seva`: the schedule, assignment state, the
//! persisted document and the store wire protocol.

pub mod assignment;
pub mod document;
pub mod schedule;
pub mod store;
