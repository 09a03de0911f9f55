//! Leaf issuance for a single identity.

use std::io::Write;
use std::path::Path;

use ledgerca_core::Identity;
use tracing::info;

use crate::config::{CaConfig, LeafConfig};
use crate::error::PkiError;
use crate::paths::{link_target, remove_stale, LeafFiles};
use crate::signer::{CaRef, CsrRequest, KeyRequest, SignRequest, SigningService};
use crate::subject::Subject;

/// Validity window of leaf certificates.
pub const LEAF_VALIDITY_DAYS: u32 = 400;

/// Issue one CA-signed bundle into the identity's directory.
///
/// The directory must already exist; its absence is a deployment error and
/// is reported as [`PkiError::MissingDirectory`]. On failure, artifacts of
/// this identity are left as they are at that point.
pub async fn issue_leaf(
    signer: &dyn SigningService,
    ca: &CaConfig,
    leaf: &LeafConfig,
    identity: &Identity,
) -> Result<LeafFiles, PkiError> {
    if !identity.dir.exists() {
        return Err(PkiError::MissingDirectory(identity.dir.clone()));
    }
    let subject = Subject::for_identity(&leaf.subject, identity)?;
    let ca_files = ca.files();
    let files = LeafFiles::for_identity(identity);

    for stale in files.stale() {
        remove_stale(stale)?;
    }

    let target = link_target(
        &identity.dir,
        &ca_files.dir,
        &ca_files.cert_file_name(),
        leaf.link_style,
    )
    .map_err(|e| PkiError::io(&identity.dir, e))?;
    info!(link = %files.link.display(), target = %target, "linking CA certificate");
    std::os::unix::fs::symlink(&target, &files.link).map_err(|e| PkiError::io(&files.link, e))?;

    signer
        .generate_key(KeyRequest {
            method: ca.method,
            out: &files.key,
            passphrase: None,
        })
        .await?;
    signer
        .create_request(CsrRequest {
            key: &files.key,
            subject: &subject,
            config: ca.request_config.as_deref(),
            out: &files.csr,
        })
        .await?;
    signer
        .sign_request(SignRequest {
            csr: &files.csr,
            ca: CaRef {
                files: &ca_files,
                passphrase: ca.key_passphrase(),
            },
            days: LEAF_VALIDITY_DAYS,
            extensions: leaf.extensions.as_deref(),
            out: &files.crt,
        })
        .await?;

    append_file(&ca_files.cert, &files.crt)?;
    info!(
        role = %identity.role,
        crt = %files.crt.display(),
        subject = %subject,
        "issued leaf certificate"
    );
    Ok(files)
}

/// Append the bytes of `src` to `dst`, building the trust chain bundle.
fn append_file(src: &Path, dst: &Path) -> Result<(), PkiError> {
    let bytes = std::fs::read(src).map_err(|e| PkiError::io(src, e))?;
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .open(dst)
        .map_err(|e| PkiError::io(dst, e))?;
    file.write_all(&bytes).map_err(|e| PkiError::io(dst, e))
}
