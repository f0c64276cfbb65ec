// Infrastructure layer - External dependencies and adapters
pub mod chunked_json;
pub mod config;
pub mod file_persistence;
pub mod http_metadata;
pub mod http_response;
pub mod memory_persistence;
