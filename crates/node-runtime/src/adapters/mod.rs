//! Adapters binding subsystem ports to live components.

pub mod header_source;
pub mod proof_network;
pub mod tip_source;

pub use header_source::SessionHeaderSource;
pub use proof_network::DirectoryProofNetwork;
pub use tip_source::SharedTip;
