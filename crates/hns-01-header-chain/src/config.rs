//! Header chain configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the header-chain engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Directory holding the header store envelope and its checksum file.
    pub data_dir: PathBuf,

    /// Trim threshold for the in-memory header window.
    pub max_in_memory_headers: usize,

    /// Force a store save every N appended headers.
    pub header_save_checkpoint_window: u32,

    /// Enforce the proof-of-work target derived from `bits` on append.
    /// Staged bring-up may disable this; a complete client keeps it on.
    pub enforce_pow_target: bool,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            max_in_memory_headers: 5000,
            header_save_checkpoint_window: 500,
            enforce_pow_target: true,
        }
    }
}

impl ChainConfig {
    /// Config for tests: tiny window, no target enforcement so fixtures
    /// need no mining.
    pub fn for_testing(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            max_in_memory_headers: 200,
            header_save_checkpoint_window: 10,
            enforce_pow_target: false,
        }
    }
}
