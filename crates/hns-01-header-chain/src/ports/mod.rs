//! Port traits for the header-chain engine.

pub mod outbound;

pub use outbound::{HeaderSource, MockHeaderSource};
