//! Caller identity and the permission predicate. Authentication itself happens upstream.

pub mod middleware;
pub mod permission;
