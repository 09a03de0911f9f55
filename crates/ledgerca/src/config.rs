//! Orchestrator configuration.

use std::path::PathBuf;

use ledgerca_core::KeyMethod;

use crate::paths::CaFiles;

/// Default subject of the root CA, in openssl `-subj` form.
pub const DEFAULT_CA_SUBJECT: &str = "/C=CN/ST=Beijing/L=./O=MadLedger";

/// Root CA configuration.
#[derive(Debug, Clone)]
pub struct CaConfig {
    /// Directory holding the CA files.
    pub dir: PathBuf,

    /// Base name of the `.key`, `.pem` and `.srl` files.
    pub filename: String,

    /// Key family used for the CA and every leaf.
    pub method: KeyMethod,

    /// Passphrase protecting the CA key (only used by [`KeyMethod::Dsa`]).
    pub passphrase: String,

    /// CA subject in openssl `-subj` form.
    pub subject: String,

    /// Optional openssl request config (`req -config`).
    pub request_config: Option<PathBuf>,
}

impl CaConfig {
    pub fn files(&self) -> CaFiles {
        CaFiles::new(&self.dir, &self.filename)
    }

    /// The passphrase, if the key method uses one.
    pub fn key_passphrase(&self) -> Option<&str> {
        self.method
            .uses_passphrase()
            .then_some(self.passphrase.as_str())
    }
}

impl Default for CaConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./CA"),
            filename: "localhostCA".to_string(),
            method: KeyMethod::Ecc,
            passphrase: "unsafe dsa_password".to_string(),
            subject: DEFAULT_CA_SUBJECT.to_string(),
            request_config: None,
        }
    }
}

/// How the CA link target is computed when one directory contains the other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LinkStyle {
    /// Walk up to the filesystem root and back down (historical output).
    #[default]
    Legacy,
    /// Shortest relative path, including for ancestor directories.
    Shortest,
}

/// What the batch does when the signing toolkit fails for one identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Record the failure and move on to the next identity.
    #[default]
    BestEffort,
    /// Stop at the first failure.
    Strict,
}

/// Leaf certificate configuration shared by every identity.
#[derive(Debug, Clone)]
pub struct LeafConfig {
    /// Subject template; `{name}` and `{role}` are substituted per identity.
    pub subject: String,

    /// Optional openssl-style extension file (`x509 -extfile`).
    pub extensions: Option<PathBuf>,

    pub link_style: LinkStyle,
}

impl Default for LeafConfig {
    fn default() -> Self {
        Self {
            subject: format!("{DEFAULT_CA_SUBJECT}/CN={{name}}"),
            extensions: None,
            link_style: LinkStyle::Legacy,
        }
    }
}

/// Configuration of a full batch run.
#[derive(Debug, Clone, Default)]
pub struct BatchConfig {
    pub ca: CaConfig,
    pub leaf: LeafConfig,

    /// Regenerate the root CA before issuing leaves.
    pub regenerate_ca: bool,

    pub failure_policy: FailurePolicy,
}
