//! Proof envelopes and verification.

pub mod envelope;
pub mod verifier;

pub use envelope::ProofEnvelope;
pub use verifier::{compute_leaf, fold_nodes, verify_proof};
