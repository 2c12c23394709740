//! Infrastructure adapters and runtime bootstrap.

pub mod content_store;
pub mod error;
pub mod http;
pub mod image_host;
pub mod telemetry;
