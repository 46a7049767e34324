pub mod config;
pub mod http;
pub mod log_sink;
pub mod metrics;
