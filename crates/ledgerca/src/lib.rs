//! ledgerca Certificate Orchestrator
//!
//! This crate provisions the PKI of a ledger test network: it bootstraps a
//! self-signed root CA and issues one CA-signed leaf bundle per identity of a
//! [`Topology`](ledgerca_core::Topology).
//!
//! All key and certificate operations go through the [`SigningService`]
//! trait. Two backends are provided: [`NativeSigner`] (rcgen, in process) and
//! [`OpensslSigner`] (an `openssl` binary invoked per step).

pub mod batch;
pub mod ca;
pub mod config;
pub mod error;
pub mod extensions;
pub mod inspect;
pub mod issue;
pub mod paths;
pub mod signer;
pub mod subject;

pub use batch::{run_batch, BatchReport, FailedIdentity};
pub use ca::{bootstrap_ca, describe_ca, require_ca, CA_VALIDITY_DAYS};
pub use config::{BatchConfig, CaConfig, FailurePolicy, LeafConfig, LinkStyle};
pub use error::PkiError;
pub use issue::{issue_leaf, LEAF_VALIDITY_DAYS};
pub use paths::{CaFiles, LeafFiles};
pub use signer::{NativeSigner, OpensslSigner, SignerError, SigningService};
