//! Shared library for cross-cutting concerns in auth-platform Rust services.
//!
//! This crate provides centralized implementations for:
//! - Error types with retryability classification
//! - HTTP client configuration and building
//! - The shared key-value store used for state that outlives one instance
//! - Tracing subscriber setup

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod http;
pub mod kv_store;
pub mod tracing_config;

pub use error::PlatformError;
pub use http::{build_http_client, HttpConfig};
pub use kv_store::{CasOutcome, KvStore, MemoryKvStore, RedisKvStore};
pub use tracing_config::{init_tracing, TracingConfig};
