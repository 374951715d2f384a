//! HTTP API: identity pipeline stages, route groups and response mapping.

pub mod app;
pub mod config;
pub mod context;
pub mod middleware;
