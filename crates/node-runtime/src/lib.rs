//! # Node Runtime
//!
//! Explicit construction and wiring of the SPV client: one `Engine`
//! value owns every subsystem, the DoH/DoT servers call `resolve`, and
//! the daemon binary drives startup and shutdown.

#![warn(clippy::all)]

pub mod adapters;
pub mod config;
pub mod engine;
pub mod pool;
pub mod telemetry;

pub use config::EngineConfig;
pub use engine::Engine;
pub use pool::QueryPool;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
