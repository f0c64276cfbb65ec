pub mod error;
pub mod log_store;
pub mod metadata_resolver;
pub mod monitor_service;
pub mod monitor_session;
pub mod normalizer;
pub mod persistence_gateway;
pub mod telemetry_stores;
pub mod window_store;
