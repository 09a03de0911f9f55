//! Identities: the unit that receives one leaf certificate bundle.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::role::Role;

/// Default file name of the CA link placed in every leaf directory.
pub const DEFAULT_CA_LINK: &str = "CA.pem";

/// A (role, directory) pair plus the file naming used for its bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "IdentityEntry")]
pub struct Identity {
    /// Role tag.
    pub role: Role,

    /// Directory the bundle is written into. Must exist before issuance.
    pub dir: PathBuf,

    /// Base name of the `.key`, `.csr` and `.crt` files.
    pub name: String,

    /// File name of the symbolic link to the CA certificate.
    pub ca_link: String,
}

impl Identity {
    /// Create an identity named after its role, linking the CA as `CA.pem`.
    pub fn new(role: Role, dir: impl Into<PathBuf>) -> Self {
        Self {
            role,
            dir: dir.into(),
            name: role.as_str().to_string(),
            ca_link: DEFAULT_CA_LINK.to_string(),
        }
    }

    /// Override the base name of the bundle files.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Override the CA link file name.
    pub fn with_ca_link(mut self, ca_link: impl Into<String>) -> Self {
        self.ca_link = ca_link.into();
        self
    }

    /// Same identity with its directory resolved against `root`.
    ///
    /// Absolute directories are left untouched.
    pub fn rooted(&self, root: &Path) -> Self {
        Self {
            dir: root.join(&self.dir),
            ..self.clone()
        }
    }
}

/// Wire form of an identity; `name` and `ca_link` are optional.
#[derive(Deserialize)]
struct IdentityEntry {
    role: Role,
    dir: PathBuf,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    ca_link: Option<String>,
}

impl From<IdentityEntry> for Identity {
    fn from(entry: IdentityEntry) -> Self {
        let mut identity = Identity::new(entry.role, entry.dir);
        if let Some(name) = entry.name {
            identity.name = name;
        }
        if let Some(ca_link) = entry.ca_link {
            identity.ca_link = ca_link;
        }
        identity
    }
}
