//! The signing toolkit seam.
//!
//! Every key and certificate operation the orchestrator needs goes through
//! [`SigningService`]. Requests name their inputs and outputs by path so that
//! an external tool and the in-process backend share one contract.

mod native;
mod openssl;

#[cfg(test)]
pub(crate) mod mock;

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use ledgerca_core::KeyMethod;
use thiserror::Error;

use crate::paths::CaFiles;
use crate::subject::Subject;

pub use native::NativeSigner;
pub use openssl::{CommandSpec, OpensslSigner, PASSPHRASE_ENV};

/// Errors reported by a signing backend.
#[derive(Debug, Error)]
pub enum SignerError {
    /// The toolkit executable could not be started.
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The toolkit ran and reported a failure.
    #[error("command failed: {command} ({status}): {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    /// The toolkit did not finish in time.
    #[error("command timed out after {timeout:?}: {command}")]
    Timeout { command: String, timeout: Duration },

    /// The backend cannot perform this operation.
    #[error("{backend} signer does not support {what}")]
    Unsupported { backend: &'static str, what: String },

    /// Key or certificate material was rejected.
    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Extensions(#[from] crate::extensions::ExtensionError),
}

impl SignerError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Generate a private key.
#[derive(Debug, Clone, Copy)]
pub struct KeyRequest<'a> {
    pub method: KeyMethod,
    pub out: &'a Path,
    /// Encrypt the key with this passphrase.
    pub passphrase: Option<&'a str>,
}

/// Self-sign a certificate for an existing key.
#[derive(Debug, Clone, Copy)]
pub struct SelfSignRequest<'a> {
    pub key: &'a Path,
    pub passphrase: Option<&'a str>,
    pub subject: &'a Subject,
    pub days: u32,
    /// openssl request config (`req -config`).
    pub config: Option<&'a Path>,
    pub out: &'a Path,
}

/// Create a certificate signing request for an existing key.
#[derive(Debug, Clone, Copy)]
pub struct CsrRequest<'a> {
    pub key: &'a Path,
    pub subject: &'a Subject,
    pub config: Option<&'a Path>,
    pub out: &'a Path,
}

/// The CA material a signature is made with.
#[derive(Debug, Clone, Copy)]
pub struct CaRef<'a> {
    pub files: &'a CaFiles,
    pub passphrase: Option<&'a str>,
}

/// Sign a certificate signing request with the CA.
#[derive(Debug, Clone, Copy)]
pub struct SignRequest<'a> {
    pub csr: &'a Path,
    pub ca: CaRef<'a>,
    pub days: u32,
    /// openssl extension file (`x509 -extfile`).
    pub extensions: Option<&'a Path>,
    pub out: &'a Path,
}

/// Asymmetric key and X.509 operations used by the orchestrator.
///
/// Implementations must not overwrite existing output files; callers clear
/// stale artifacts first.
#[async_trait]
pub trait SigningService: Send + Sync {
    /// Short backend name used in logs.
    fn backend(&self) -> &'static str;

    async fn generate_key(&self, req: KeyRequest<'_>) -> Result<(), SignerError>;

    async fn self_sign(&self, req: SelfSignRequest<'_>) -> Result<(), SignerError>;

    async fn create_request(&self, req: CsrRequest<'_>) -> Result<(), SignerError>;

    async fn sign_request(&self, req: SignRequest<'_>) -> Result<(), SignerError>;
}
