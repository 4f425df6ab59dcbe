//! Test support: fixtures and scripted network peers.

pub mod fixtures;
pub mod mock_node;

pub use fixtures::{chain_on, test_checkpoint};
pub use mock_node::{spawn_mock_node, MockNodeScript};
