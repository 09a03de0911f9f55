//! Core domain errors.

use thiserror::Error;

/// Core domain errors for ledgerca.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Unknown role tag.
    #[error("Unknown role: {0} (expected client, admin, peer or orderer)")]
    UnknownRole(String),

    /// Unknown key method.
    #[error("Unknown key method: {0} (expected ecc or dsa)")]
    UnknownKeyMethod(String),

    /// Topology description could not be decoded.
    #[error("Invalid topology: {0}")]
    InvalidTopology(#[from] serde_json::Error),
}
