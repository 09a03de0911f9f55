//! Role tags and key methods.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Network role an identity is issued for.
///
/// This is a label only: every role gets the same kind of leaf certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Client,
    Admin,
    Peer,
    Orderer,
}

impl Role {
    /// Lowercase tag, also used as the default base name of the leaf files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Admin => "admin",
            Self::Peer => "peer",
            Self::Orderer => "orderer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client" => Ok(Self::Client),
            "admin" => Ok(Self::Admin),
            "peer" => Ok(Self::Peer),
            "orderer" => Ok(Self::Orderer),
            other => Err(CoreError::UnknownRole(other.to_string())),
        }
    }
}

/// Asymmetric key family used for the CA and the leaves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyMethod {
    /// NIST P-256 (prime256v1) elliptic-curve keys.
    #[default]
    Ecc,
    /// 2048-bit RSA keys; the CA key is passphrase protected.
    ///
    /// The `dsa` tag is historical and kept for command-line compatibility.
    Dsa,
}

impl KeyMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ecc => "ecc",
            Self::Dsa => "dsa",
        }
    }

    /// Returns true if keys of this family carry a passphrase at the CA.
    pub fn uses_passphrase(&self) -> bool {
        matches!(self, Self::Dsa)
    }
}

impl fmt::Display for KeyMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for KeyMethod {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ecc" => Ok(Self::Ecc),
            "dsa" => Ok(Self::Dsa),
            other => Err(CoreError::UnknownKeyMethod(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trips_through_tag() {
        for role in [Role::Client, Role::Admin, Role::Peer, Role::Orderer] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
    }

    #[test]
    fn test_unknown_role() {
        let result = "validator".parse::<Role>();
        assert!(matches!(result, Err(CoreError::UnknownRole(tag)) if tag == "validator"));
    }

    #[test]
    fn test_role_serde_lowercase() {
        let json = serde_json::to_string(&Role::Orderer).unwrap();
        assert_eq!(json, "\"orderer\"");
    }

    #[test]
    fn test_key_method_default_is_ecc() {
        assert_eq!(KeyMethod::default(), KeyMethod::Ecc);
        assert!(!KeyMethod::Ecc.uses_passphrase());
        assert!(KeyMethod::Dsa.uses_passphrase());
    }
}
