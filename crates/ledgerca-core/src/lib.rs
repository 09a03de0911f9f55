//! ledgerca Core Types
//!
//! This crate contains the pure data side of the ledger test-network PKI:
//! - Roles and key methods
//! - Identities (one leaf certificate bundle each)
//! - The topology table describing every certificate the network needs
//!
//! Nothing here touches the filesystem or any key material.

pub mod error;
pub mod identity;
pub mod role;
pub mod topology;

// Re-export commonly used types
pub use error::CoreError;
pub use identity::{Identity, DEFAULT_CA_LINK};
pub use role::{KeyMethod, Role};
pub use topology::Topology;
