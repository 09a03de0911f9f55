//! Leaf certificate extensions read from an openssl `-extfile` style file.
//!
//! Only the keys the native signer can express are interpreted:
//! `basicConstraints`, `keyUsage`, `extendedKeyUsage`, `subjectAltName` and
//! `authorityKeyIdentifier`. Anything else is skipped.

use std::net::IpAddr;
use std::path::{Path, PathBuf};

use rcgen::{ExtendedKeyUsagePurpose, KeyUsagePurpose, SanType};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ExtensionError {
    #[error("failed to read extension file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: expected `key = value` or `[section]`, got '{text}'")]
    Syntax { line: usize, text: String },

    #[error("unknown keyUsage '{0}'")]
    UnknownKeyUsage(String),

    #[error("unknown extendedKeyUsage '{0}'")]
    UnknownExtendedKeyUsage(String),

    #[error("invalid subjectAltName entry '{0}'")]
    InvalidSan(String),

    #[error("section [{0}] referenced by subjectAltName does not exist")]
    MissingSection(String),
}

/// Extensions applied to every leaf certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafExtensions {
    pub is_ca: bool,
    pub key_usages: Vec<KeyUsagePurpose>,
    pub extended_key_usages: Vec<ExtendedKeyUsagePurpose>,
    pub subject_alt_names: Vec<SanType>,
    pub authority_key_identifier: bool,
}

impl Default for LeafExtensions {
    fn default() -> Self {
        Self {
            is_ca: false,
            key_usages: vec![
                KeyUsagePurpose::DigitalSignature,
                KeyUsagePurpose::KeyEncipherment,
            ],
            extended_key_usages: vec![
                ExtendedKeyUsagePurpose::ServerAuth,
                ExtendedKeyUsagePurpose::ClientAuth,
            ],
            subject_alt_names: Vec::new(),
            authority_key_identifier: true,
        }
    }
}

struct Entry {
    section: String,
    key: String,
    value: String,
}

impl LeafExtensions {
    /// Load extensions from `path`, or the defaults when no file is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ExtensionError> {
        match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ExtensionError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::parse(&text)
            }
            None => Ok(Self::default()),
        }
    }

    /// Parse the default (unnamed) section of an extension file.
    ///
    /// Keys missing from the file keep their default values.
    pub fn parse(text: &str) -> Result<Self, ExtensionError> {
        let entries = parse_entries(text)?;
        let mut ext = Self::default();

        for entry in entries.iter().filter(|e| e.section.is_empty()) {
            match entry.key.as_str() {
                "basicConstraints" => {
                    ext.is_ca = tokens(&entry.value).any(|t| t.eq_ignore_ascii_case("CA:TRUE"));
                }
                "keyUsage" => {
                    ext.key_usages = tokens(&entry.value)
                        .map(key_usage)
                        .collect::<Result<_, _>>()?;
                }
                "extendedKeyUsage" => {
                    ext.extended_key_usages = tokens(&entry.value)
                        .map(extended_key_usage)
                        .collect::<Result<_, _>>()?;
                }
                "subjectAltName" => {
                    ext.subject_alt_names = subject_alt_names(&entry.value, &entries)?;
                }
                "authorityKeyIdentifier" => ext.authority_key_identifier = true,
                other => debug!(key = other, "ignoring unsupported extension"),
            }
        }

        Ok(ext)
    }
}

fn parse_entries(text: &str) -> Result<Vec<Entry>, ExtensionError> {
    let mut entries = Vec::new();
    let mut section = String::new();

    for (index, raw) in text.lines().enumerate() {
        let line = raw.split('#').next().unwrap_or_default().trim();
        if line.is_empty() {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            section = name.trim().to_string();
            continue;
        }
        let (key, value) = line.split_once('=').ok_or_else(|| ExtensionError::Syntax {
            line: index + 1,
            text: raw.to_string(),
        })?;
        entries.push(Entry {
            section: section.clone(),
            key: key.trim().to_string(),
            value: value.trim().to_string(),
        });
    }

    Ok(entries)
}

/// Comma separated values without the `critical` marker.
fn tokens(value: &str) -> impl Iterator<Item = &str> {
    value
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty() && *t != "critical")
}

fn key_usage(name: &str) -> Result<KeyUsagePurpose, ExtensionError> {
    Ok(match name {
        "digitalSignature" => KeyUsagePurpose::DigitalSignature,
        "nonRepudiation" => KeyUsagePurpose::ContentCommitment,
        "keyEncipherment" => KeyUsagePurpose::KeyEncipherment,
        "dataEncipherment" => KeyUsagePurpose::DataEncipherment,
        "keyAgreement" => KeyUsagePurpose::KeyAgreement,
        "keyCertSign" => KeyUsagePurpose::KeyCertSign,
        "cRLSign" => KeyUsagePurpose::CrlSign,
        "encipherOnly" => KeyUsagePurpose::EncipherOnly,
        "decipherOnly" => KeyUsagePurpose::DecipherOnly,
        other => return Err(ExtensionError::UnknownKeyUsage(other.to_string())),
    })
}

fn extended_key_usage(name: &str) -> Result<ExtendedKeyUsagePurpose, ExtensionError> {
    Ok(match name {
        "serverAuth" => ExtendedKeyUsagePurpose::ServerAuth,
        "clientAuth" => ExtendedKeyUsagePurpose::ClientAuth,
        "codeSigning" => ExtendedKeyUsagePurpose::CodeSigning,
        "emailProtection" => ExtendedKeyUsagePurpose::EmailProtection,
        "timeStamping" => ExtendedKeyUsagePurpose::TimeStamping,
        "OCSPSigning" => ExtendedKeyUsagePurpose::OcspSigning,
        other => return Err(ExtensionError::UnknownExtendedKeyUsage(other.to_string())),
    })
}

fn subject_alt_names(value: &str, entries: &[Entry]) -> Result<Vec<SanType>, ExtensionError> {
    let mut sans = Vec::new();
    for token in tokens(value) {
        if let Some(section) = token.strip_prefix('@') {
            let mut found = false;
            for entry in entries.iter().filter(|e| e.section == section) {
                found = true;
                let kind = entry.key.split('.').next().unwrap_or_default();
                sans.push(san(kind, &entry.value)?);
            }
            if !found {
                return Err(ExtensionError::MissingSection(section.to_string()));
            }
        } else {
            let (kind, name) = token
                .split_once(':')
                .ok_or_else(|| ExtensionError::InvalidSan(token.to_string()))?;
            sans.push(san(kind, name)?);
        }
    }
    Ok(sans)
}

fn san(kind: &str, value: &str) -> Result<SanType, ExtensionError> {
    let invalid = || ExtensionError::InvalidSan(format!("{kind}:{value}"));
    match kind.trim() {
        "DNS" => Ok(SanType::DnsName(
            value.trim().to_string().try_into().map_err(|_| invalid())?,
        )),
        "IP" => value
            .trim()
            .parse::<IpAddr>()
            .map(SanType::IpAddress)
            .map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}
