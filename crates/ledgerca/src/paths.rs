//! File layout, relative link paths and idempotent cleanup.
//!
//! Layout per CA: `<dir>/<filename>.key`, `.pem` and `.srl`.
//! Layout per identity: `<dir>/<name>.key`, `.csr`, `.crt` and the CA link.

use std::io;
use std::path::{Component, Path, PathBuf};

use ledgerca_core::Identity;
use tracing::{debug, info};

use crate::config::LinkStyle;
use crate::error::PkiError;

/// Leftovers of older bundle layouts, removed before every issuance.
const LEGACY_CA_COPY: &str = "ca.cer";

/// On-disk artifacts of the root CA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaFiles {
    pub dir: PathBuf,
    pub key: PathBuf,
    pub cert: PathBuf,
    /// Serial-number state, advanced on every signature.
    pub serial: PathBuf,
}

impl CaFiles {
    pub fn new(dir: &Path, filename: &str) -> Self {
        Self {
            dir: dir.to_path_buf(),
            key: dir.join(format!("{filename}.key")),
            cert: dir.join(format!("{filename}.pem")),
            serial: dir.join(format!("{filename}.srl")),
        }
    }

    /// File name of the CA certificate, used as the tail of link targets.
    pub fn cert_file_name(&self) -> String {
        self.cert
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Returns true if both the key and the certificate exist.
    pub fn is_present(&self) -> bool {
        self.key.is_file() && self.cert.is_file()
    }
}

/// On-disk artifacts of one leaf bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafFiles {
    pub key: PathBuf,
    pub csr: PathBuf,
    /// Leaf certificate followed by the CA certificate.
    pub crt: PathBuf,
    /// Symbolic link to the CA certificate.
    pub link: PathBuf,
    legacy: [PathBuf; 2],
}

impl LeafFiles {
    pub fn for_identity(identity: &Identity) -> Self {
        let dir = &identity.dir;
        let name = &identity.name;
        Self {
            key: dir.join(format!("{name}.key")),
            csr: dir.join(format!("{name}.csr")),
            crt: dir.join(format!("{name}.crt")),
            link: dir.join(&identity.ca_link),
            legacy: [dir.join(LEGACY_CA_COPY), dir.join(format!("{name}.pem"))],
        }
    }

    /// Every path that must be cleared before the bundle is regenerated.
    pub fn stale(&self) -> [&Path; 6] {
        [
            &self.key,
            &self.crt,
            &self.csr,
            &self.link,
            &self.legacy[0],
            &self.legacy[1],
        ]
    }
}

/// Remove a file or symbolic link at `path` if one is there.
///
/// Dangling links are removed too. Returns whether something was removed;
/// a missing path is not an error.
pub fn remove_stale(path: &Path) -> Result<bool, PkiError> {
    debug!(path = %path.display(), "check");
    match std::fs::symlink_metadata(path) {
        Ok(_) => {
            info!(path = %path.display(), "rm");
            std::fs::remove_file(path).map_err(|source| PkiError::Cleanup {
                path: path.to_path_buf(),
                source,
            })?;
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(PkiError::Cleanup {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Create `dir` if nothing exists at that path.
///
/// Only the last level is created; an existing path of any kind is left as is.
pub fn ensure_dir(dir: &Path) -> Result<(), PkiError> {
    if std::fs::symlink_metadata(dir).is_ok() {
        return Ok(());
    }
    info!(dir = %dir.display(), "mkdir");
    std::fs::create_dir(dir).map_err(|e| PkiError::io(dir, e))
}

/// Make `path` absolute against the working directory and collapse `.` and
/// `..` without touching the filesystem.
pub fn absolutize(path: &Path) -> io::Result<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    Ok(out)
}

/// Path that, resolved from directory `from`, reaches directory `to`.
///
/// Both paths are split on `/` with the root as an empty first segment. With
/// [`LinkStyle::Legacy`], when one path is a prefix of the other the result
/// climbs all the way to the root and descends through every segment of `to`
/// (e.g. `../../..//x/y/z`).
pub fn relative_path(from: &Path, to: &Path, style: LinkStyle) -> io::Result<String> {
    let from = absolutize(from)?.to_string_lossy().into_owned();
    let to = absolutize(to)?.to_string_lossy().into_owned();
    let a: Vec<&str> = from.split('/').collect();
    let b: Vec<&str> = to.split('/').collect();

    Ok(match style {
        LinkStyle::Legacy => legacy_relative(&a, &b),
        LinkStyle::Shortest => shortest_relative(&a, &b),
    })
}

fn legacy_relative(a: &[&str], b: &[&str]) -> String {
    // No divergence within the shorter length leaves the index at 0.
    let divergence = a.iter().zip(b).position(|(m, n)| m != n).unwrap_or(0);
    format!("{}{}", "../".repeat(a.len() - divergence), b[divergence..].join("/"))
}

fn shortest_relative(a: &[&str], b: &[&str]) -> String {
    let common = a.iter().zip(b).take_while(|(m, n)| m == n).count();
    let parts: Vec<&str> = std::iter::repeat("..")
        .take(a.len() - common)
        .chain(b[common..].iter().copied())
        .collect();
    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}

/// Symlink target placed in `leaf_dir` for the CA certificate `ca_cert_name`
/// living in `ca_dir`.
pub fn link_target(
    leaf_dir: &Path,
    ca_dir: &Path,
    ca_cert_name: &str,
    style: LinkStyle,
) -> io::Result<String> {
    let rel = relative_path(leaf_dir, ca_dir, style)?;
    Ok(if rel == "." {
        format!("./{ca_cert_name}")
    } else if rel.is_empty() || rel.ends_with('/') {
        format!("./{rel}{ca_cert_name}")
    } else {
        format!("./{rel}/{ca_cert_name}")
    })
}
