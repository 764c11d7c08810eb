//! Shared utilities

pub mod rate_limit;
pub mod time;
pub mod vec2;
