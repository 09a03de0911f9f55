//! The topology table: every certificate the test network needs.
//!
//! A topology is an ordered list of identities. Order only affects the order
//! of console output; entries never reference each other.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::identity::Identity;
use crate::role::Role;

/// Deployment environments laid out as `<prefix>clients`, `<prefix>peers`
/// and `<prefix>orderers`.
const ENVIRONMENTS: &[&str] = &["env/bft/.", "env/raft/.", "env_local/raft/.", "samples/"];

const CLIENTS_PER_ENV: usize = 5;
const PEERS_PER_ENV: usize = 4;
const ORDERERS_PER_ENV: usize = 4;

/// Ordered list of identities to issue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topology {
    identities: Vec<Identity>,
}

impl Topology {
    pub fn new(identities: Vec<Identity>) -> Self {
        Self { identities }
    }

    /// The built-in network layout, relative to the repository root.
    ///
    /// The explorer client comes first, then for every environment five
    /// clients, the admin client, four peers and four orderers.
    pub fn builtin() -> Self {
        let mut identities = vec![Identity::new(Role::Client, "explorer/config/cert")];

        for env in ENVIRONMENTS {
            for i in 0..CLIENTS_PER_ENV {
                identities.push(Identity::new(Role::Client, format!("{env}clients/{i}/cert")));
            }
            identities.push(Identity::new(Role::Admin, format!("{env}clients/admin/cert")));
            for i in 0..PEERS_PER_ENV {
                identities.push(Identity::new(Role::Peer, format!("{env}peers/{i}/cert")));
            }
            for i in 0..ORDERERS_PER_ENV {
                identities.push(Identity::new(Role::Orderer, format!("{env}orderers/{i}/cert")));
            }
        }

        Self { identities }
    }

    /// Decode a topology from a JSON array of `{"role", "dir"}` objects.
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Same topology with every directory resolved against `root`.
    pub fn rooted(&self, root: &Path) -> Self {
        Self {
            identities: self.identities.iter().map(|i| i.rooted(root)).collect(),
        }
    }

    /// Only the identities whose directory starts with `prefix`.
    pub fn environment(&self, prefix: &str) -> Self {
        Self {
            identities: self
                .identities
                .iter()
                .filter(|i| i.dir.to_string_lossy().starts_with(prefix))
                .cloned()
                .collect(),
        }
    }

    pub fn identities(&self) -> &[Identity] {
        &self.identities
    }

    pub fn iter(&self) -> impl Iterator<Item = &Identity> {
        self.identities.iter()
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }
}

impl<'a> IntoIterator for &'a Topology {
    type Item = &'a Identity;
    type IntoIter = std::slice::Iter<'a, Identity>;

    fn into_iter(self) -> Self::IntoIter {
        self.identities.iter()
    }
}
