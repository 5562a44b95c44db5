//! Resource limits for parsing and allocation.
//!
//! Hosts usually keep the defaults. Embedders that accept untrusted text can
//! tighten them with [`Limits::strict`] or load a `Limits` value from their own
//! JSON configuration (the struct is `serde`-deserializable, missing fields
//! fall back to the defaults).

use serde::{Deserialize, Serialize};

/// Limits enforced by a [`Document`](crate::Document).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Maximum nesting depth of arrays/objects accepted by the parser.
    pub max_depth: usize,
    /// Maximum size of parser input in bytes.
    pub max_input_bytes: usize,
    /// Maximum number of live nodes in the store. Allocation beyond this
    /// fails with `JsonError::Resource`.
    pub max_nodes: usize,
}

impl Limits {
    /// Tight limits for text from untrusted sources.
    pub const fn strict() -> Self {
        Self {
            max_depth: 32,
            max_input_bytes: 1024 * 1024,
            max_nodes: 1 << 20,
        }
    }

    /// Generous limits, the default.
    pub const fn lenient() -> Self {
        Self {
            max_depth: 512,
            max_input_bytes: 256 * 1024 * 1024,
            max_nodes: u32::MAX as usize,
        }
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self::lenient()
    }
}
