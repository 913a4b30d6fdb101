//! Workshop Service - invoice reconciliation for parts inventory and labor tasks.

pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;
