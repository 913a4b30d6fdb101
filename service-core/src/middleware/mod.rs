//! HTTP middleware shared by the workshop services.

pub mod metrics;
pub mod tracing;
