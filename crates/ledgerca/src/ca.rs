//! Root CA bootstrap and inspection.

use tracing::info;

use crate::config::CaConfig;
use crate::error::PkiError;
use crate::inspect::{describe_file, CertSummary};
use crate::paths::{ensure_dir, remove_stale, CaFiles};
use crate::signer::{KeyRequest, SelfSignRequest, SigningService};
use crate::subject::Subject;

/// Validity window of the root CA certificate.
pub const CA_VALIDITY_DAYS: u32 = 500;

/// Create a fresh root key and self-signed certificate.
///
/// This is a hard reset of the trust root: any key, certificate and serial
/// state already at the CA paths is deleted first, so leaves issued under the
/// previous root no longer verify.
pub async fn bootstrap_ca(
    signer: &dyn SigningService,
    config: &CaConfig,
) -> Result<CaFiles, PkiError> {
    let subject = Subject::parse(&config.subject)?;
    let files = config.files();

    ensure_dir(&files.dir)?;
    for stale in [&files.key, &files.cert, &files.serial] {
        remove_stale(stale)?;
    }

    let passphrase = config.key_passphrase();
    signer
        .generate_key(KeyRequest {
            method: config.method,
            out: &files.key,
            passphrase,
        })
        .await?;
    signer
        .self_sign(SelfSignRequest {
            key: &files.key,
            passphrase,
            subject: &subject,
            days: CA_VALIDITY_DAYS,
            config: config.request_config.as_deref(),
            out: &files.cert,
        })
        .await?;

    info!(
        cert = %files.cert.display(),
        method = %config.method,
        backend = signer.backend(),
        "root CA created"
    );
    Ok(files)
}

/// The CA files, provided both the key and the certificate exist.
pub fn require_ca(config: &CaConfig) -> Result<CaFiles, PkiError> {
    let files = config.files();
    if files.is_present() {
        Ok(files)
    } else {
        Err(PkiError::CaMissing(files.cert))
    }
}

/// Summary of the CA certificate.
pub fn describe_ca(config: &CaConfig) -> Result<CertSummary, PkiError> {
    let files = config.files();
    describe_file(&files.cert)?
        .into_iter()
        .next()
        .ok_or_else(|| PkiError::Parse(format!("no certificate in {}", files.cert.display())))
}
