pub mod config;
pub mod constants;
pub mod domain;
pub mod error;
pub mod pipeline;
pub mod rate_limiter;
pub mod server;
pub mod storage;

// Layered boundaries: use cases and ports, then provider/store adapters
pub mod app;
pub mod infra;

pub mod observability;
