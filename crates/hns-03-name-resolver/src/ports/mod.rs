//! Port traits for the resolver.

pub mod outbound;

pub use outbound::{
    MockProofNetwork, MockReply, PeerOutcome, ProofNetwork, TipSnapshot, TipSource,
};
