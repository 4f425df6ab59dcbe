//! Domain types for name resolution.

pub mod errors;
pub mod records;

pub use errors::ResolveError;
pub use records::{name_hash, rtype, Resource};
