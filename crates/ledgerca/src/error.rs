//! Orchestrator errors.

use std::path::PathBuf;

use ledgerca_core::CoreError;
use thiserror::Error;

use crate::extensions::ExtensionError;
use crate::signer::SignerError;
use crate::subject::SubjectError;

/// Errors raised while bootstrapping the CA or issuing leaves.
#[derive(Debug, Error)]
pub enum PkiError {
    /// The identity directory has not been provisioned.
    #[error("directory does not exist: {0} (leaf directories must be provisioned before issuance)")]
    MissingDirectory(PathBuf),

    /// A stale artifact could not be removed.
    #[error("failed to remove stale artifact {path}: {source}")]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Any other filesystem failure.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The signing toolkit reported a failure.
    #[error("signing failed: {0}")]
    Signer(#[from] SignerError),

    #[error(transparent)]
    Subject(#[from] SubjectError),

    #[error(transparent)]
    Extensions(#[from] ExtensionError),

    /// CA material is absent and regeneration was not requested.
    #[error("CA material not found at {0} (run the `ca` command or pass --regenerate-ca)")]
    CaMissing(PathBuf),

    /// A certificate on disk could not be parsed.
    #[error("failed to parse certificate: {0}")]
    Parse(String),

    #[error(transparent)]
    Topology(#[from] CoreError),
}

impl PkiError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns true if the batch must stop regardless of the failure policy.
    ///
    /// Only signing toolkit failures are recoverable.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Signer(_))
    }
}
