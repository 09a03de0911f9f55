//! In-process signing backend built on rcgen.
//!
//! Keys are written as PKCS#8 PEM, certificates and requests as PEM. The CA
//! serial state file uses the openssl `.srl` format (uppercase hex).

use std::io::Write;
use std::path::Path;

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use ledgerca_core::KeyMethod;
use rand::RngCore;
use rcgen::{
    BasicConstraints, CertificateParams, CertificateSigningRequestParams, DistinguishedName,
    DnType, IsCa, KeyPair, KeyUsagePurpose, SerialNumber,
};
use tracing::{debug, info};

use super::{CsrRequest, KeyRequest, SelfSignRequest, SignRequest, SignerError, SigningService};
use crate::extensions::LeafExtensions;
use crate::subject::{Attribute, Subject};

const BACKEND: &str = "native";

/// Length of a freshly created serial number, matching openssl.
const SERIAL_LEN: usize = 20;

/// Signing backend that never leaves the process.
///
/// Supports [`KeyMethod::Ecc`] only: rcgen cannot generate RSA keys.
#[derive(Debug, Clone, Default)]
pub struct NativeSigner;

impl NativeSigner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SigningService for NativeSigner {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    async fn generate_key(&self, req: KeyRequest<'_>) -> Result<(), SignerError> {
        if req.method != KeyMethod::Ecc {
            return Err(unsupported(format!("{} keys", req.method)));
        }
        if req.passphrase.is_some() {
            return Err(unsupported("passphrase protected keys".to_string()));
        }

        let key_pair = KeyPair::generate_for(&rcgen::PKCS_ECDSA_P256_SHA256).map_err(crypto)?;
        write_new(req.out, key_pair.serialize_pem().as_bytes(), true)?;
        info!(key = %req.out.display(), "generated P-256 key");
        Ok(())
    }

    async fn self_sign(&self, req: SelfSignRequest<'_>) -> Result<(), SignerError> {
        if req.passphrase.is_some() {
            return Err(unsupported("passphrase protected keys".to_string()));
        }
        ignore_request_config(req.config);

        let key_pair = read_key(req.key)?;

        let mut params = CertificateParams::default();
        params.distinguished_name = distinguished_name(req.subject);
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
            KeyUsagePurpose::DigitalSignature,
        ];
        params.serial_number = Some(SerialNumber::from_slice(&random_serial()));
        set_validity(&mut params, req.days);

        let cert = params.self_signed(&key_pair).map_err(crypto)?;
        write_new(req.out, cert.pem().as_bytes(), false)?;
        info!(cert = %req.out.display(), subject = %req.subject, days = req.days, "self-signed CA certificate");
        Ok(())
    }

    async fn create_request(&self, req: CsrRequest<'_>) -> Result<(), SignerError> {
        ignore_request_config(req.config);

        let key_pair = read_key(req.key)?;

        // Requests only carry the subject; extensions are added at signing.
        let mut params = CertificateParams::default();
        params.distinguished_name = distinguished_name(req.subject);

        let csr = params.serialize_request(&key_pair).map_err(crypto)?;
        let pem = csr.pem().map_err(crypto)?;
        write_new(req.out, pem.as_bytes(), false)?;
        debug!(csr = %req.out.display(), subject = %req.subject, "created signing request");
        Ok(())
    }

    async fn sign_request(&self, req: SignRequest<'_>) -> Result<(), SignerError> {
        if req.ca.passphrase.is_some() {
            return Err(unsupported("passphrase protected CA keys".to_string()));
        }
        let extensions = LeafExtensions::load(req.extensions)?;

        let ca_files = req.ca.files;
        let ca_key = read_key(&ca_files.key)?;
        let ca_pem = read_text(&ca_files.cert)?;
        // Rebuild the issuer from the CA certificate on disk so the leaf
        // carries its exact subject.
        let ca_cert = CertificateParams::from_ca_cert_pem(&ca_pem)
            .map_err(crypto)?
            .self_signed(&ca_key)
            .map_err(crypto)?;

        let csr_pem = read_text(req.csr)?;
        let mut csr = CertificateSigningRequestParams::from_pem(&csr_pem).map_err(crypto)?;

        let serial = next_serial(&ca_files.serial)?;
        csr.params.serial_number = Some(SerialNumber::from_slice(&serial));
        csr.params.is_ca = if extensions.is_ca {
            IsCa::Ca(BasicConstraints::Unconstrained)
        } else {
            IsCa::ExplicitNoCa
        };
        csr.params.key_usages = extensions.key_usages;
        csr.params.extended_key_usages = extensions.extended_key_usages;
        csr.params
            .subject_alt_names
            .extend(extensions.subject_alt_names);
        csr.params.use_authority_key_identifier_extension = extensions.authority_key_identifier;
        set_validity(&mut csr.params, req.days);

        let cert = csr.signed_by(&ca_cert, &ca_key).map_err(crypto)?;
        write_new(req.out, cert.pem().as_bytes(), false)?;
        info!(
            cert = %req.out.display(),
            serial = %hex::encode_upper(&serial),
            days = req.days,
            "signed leaf certificate"
        );
        Ok(())
    }
}

fn unsupported(what: String) -> SignerError {
    SignerError::Unsupported {
        backend: BACKEND,
        what,
    }
}

fn crypto(e: rcgen::Error) -> SignerError {
    SignerError::Crypto(e.to_string())
}

fn ignore_request_config(config: Option<&Path>) {
    if let Some(config) = config {
        debug!(config = %config.display(), "request config is only used by the openssl backend");
    }
}

fn distinguished_name(subject: &Subject) -> DistinguishedName {
    let mut dn = DistinguishedName::new();
    for (attribute, value) in subject.attributes() {
        let ty = match attribute {
            Attribute::Country => DnType::CountryName,
            Attribute::State => DnType::StateOrProvinceName,
            Attribute::Locality => DnType::LocalityName,
            Attribute::Organization => DnType::OrganizationName,
            Attribute::OrganizationalUnit => DnType::OrganizationalUnitName,
            Attribute::CommonName => DnType::CommonName,
        };
        dn.push(ty, value.as_str());
    }
    dn
}

/// Valid from today for `days` days, at day granularity.
fn set_validity(params: &mut CertificateParams, days: u32) {
    let not_before = Utc::now();
    let not_after = not_before + chrono::Duration::days(i64::from(days));

    params.not_before = rcgen::date_time_ymd(
        not_before.year(),
        not_before.month() as u8,
        not_before.day() as u8,
    );
    params.not_after = rcgen::date_time_ymd(
        not_after.year(),
        not_after.month() as u8,
        not_after.day() as u8,
    );
}

fn random_serial() -> Vec<u8> {
    let mut serial = vec![0u8; SERIAL_LEN];
    rand::thread_rng().fill_bytes(&mut serial);
    // Positive and without a leading zero byte, so DER keeps all bytes.
    serial[0] = (serial[0] & 0x7f).max(1);
    serial
}

/// Advance the serial state file and return the serial to use.
///
/// A missing file starts a new random sequence.
fn next_serial(path: &Path) -> Result<Vec<u8>, SignerError> {
    let serial = match std::fs::read_to_string(path) {
        Ok(text) => {
            let mut serial = hex::decode(text.trim())
                .map_err(|e| SignerError::Crypto(format!("invalid serial file {}: {e}", path.display())))?;
            increment(&mut serial);
            serial
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => random_serial(),
        Err(e) => return Err(SignerError::io(path, e)),
    };

    std::fs::write(path, format!("{}\n", hex::encode_upper(&serial)))
        .map_err(|e| SignerError::io(path, e))?;
    Ok(serial)
}

/// Big-endian increment; grows the number when every byte overflows.
fn increment(serial: &mut Vec<u8>) {
    for byte in serial.iter_mut().rev() {
        let (value, overflow) = byte.overflowing_add(1);
        *byte = value;
        if !overflow {
            return;
        }
    }
    serial.insert(0, 1);
}

fn read_key(path: &Path) -> Result<KeyPair, SignerError> {
    let pem = read_text(path)?;
    KeyPair::from_pem(&pem)
        .map_err(|e| SignerError::Crypto(format!("failed to parse key {}: {e}", path.display())))
}

fn read_text(path: &Path) -> Result<String, SignerError> {
    std::fs::read_to_string(path).map_err(|e| SignerError::io(path, e))
}

/// Write a file that must not exist yet. Private keys are owner-only.
fn write_new(path: &Path, contents: &[u8], private: bool) -> Result<(), SignerError> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    if private {
        restrict_mode(&mut options);
    }

    let mut file = options.open(path).map_err(|e| SignerError::io(path, e))?;
    file.write_all(contents).map_err(|e| SignerError::io(path, e))
}

#[cfg(unix)]
fn restrict_mode(options: &mut std::fs::OpenOptions) {
    use std::os::unix::fs::OpenOptionsExt;
    options.mode(0o600);
}

#[cfg(not(unix))]
fn restrict_mode(_options: &mut std::fs::OpenOptions) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::CaFiles;
    use crate::signer::CaRef;
    use tempfile::TempDir;
    use x509_parser::prelude::*;

    fn subject(s: &str) -> Subject {
        Subject::parse(s).unwrap()
    }

    async fn make_ca(dir: &Path) -> CaFiles {
        let files = CaFiles::new(dir, "rootCA");
        let signer = NativeSigner::new();
        signer
            .generate_key(KeyRequest {
                method: KeyMethod::Ecc,
                out: &files.key,
                passphrase: None,
            })
            .await
            .unwrap();
        signer
            .self_sign(SelfSignRequest {
                key: &files.key,
                passphrase: None,
                subject: &subject("/C=CN/O=MadLedger/CN=Test CA"),
                days: 500,
                config: None,
                out: &files.cert,
            })
            .await
            .unwrap();
        files
    }

    #[tokio::test]
    async fn test_generate_key_refuses_overwrite() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("client.key");
        let req = KeyRequest {
            method: KeyMethod::Ecc,
            out: &out,
            passphrase: None,
        };
        NativeSigner::new().generate_key(req).await.unwrap();
        assert!(std::fs::read_to_string(&out).unwrap().contains("PRIVATE KEY"));

        let result = NativeSigner::new().generate_key(req).await;
        assert!(matches!(result, Err(SignerError::Io { .. })));
    }

    #[tokio::test]
    async fn test_dsa_is_unsupported() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("ca.key");
        let result = NativeSigner::new()
            .generate_key(KeyRequest {
                method: KeyMethod::Dsa,
                out: &out,
                passphrase: Some("secret"),
            })
            .await;
        assert!(matches!(result, Err(SignerError::Unsupported { backend: "native", .. })));
        assert!(!out.exists());
    }

    #[tokio::test]
    async fn test_self_signed_ca_is_ca() {
        let tmp = TempDir::new().unwrap();
        let files = make_ca(tmp.path()).await;

        let pem = ::pem::parse(std::fs::read(&files.cert).unwrap()).unwrap();
        let (_, cert) = X509Certificate::from_der(pem.contents()).unwrap();
        assert!(cert.is_ca());
        assert_eq!(cert.subject().to_string(), cert.issuer().to_string());
        assert!(cert.verify_signature(None).is_ok());
    }

    #[tokio::test]
    async fn test_sign_request_chains_to_ca_and_advances_serial() {
        let tmp = TempDir::new().unwrap();
        let files = make_ca(tmp.path()).await;
        let signer = NativeSigner::new();

        let mut serials = Vec::new();
        for name in ["peer0", "peer1"] {
            let key = tmp.path().join(format!("{name}.key"));
            let csr = tmp.path().join(format!("{name}.csr"));
            let crt = tmp.path().join(format!("{name}.crt"));
            let leaf_subject = subject(&format!("/O=MadLedger/CN={name}"));

            signer
                .generate_key(KeyRequest {
                    method: KeyMethod::Ecc,
                    out: &key,
                    passphrase: None,
                })
                .await
                .unwrap();
            signer
                .create_request(CsrRequest {
                    key: &key,
                    subject: &leaf_subject,
                    config: None,
                    out: &csr,
                })
                .await
                .unwrap();
            signer
                .sign_request(SignRequest {
                    csr: &csr,
                    ca: CaRef {
                        files: &files,
                        passphrase: None,
                    },
                    days: 400,
                    extensions: None,
                    out: &crt,
                })
                .await
                .unwrap();

            let ca_pem = ::pem::parse(std::fs::read(&files.cert).unwrap()).unwrap();
            let (_, ca) = X509Certificate::from_der(ca_pem.contents()).unwrap();
            let leaf_pem = ::pem::parse(std::fs::read(&crt).unwrap()).unwrap();
            let (_, leaf) = X509Certificate::from_der(leaf_pem.contents()).unwrap();

            assert!(!leaf.is_ca());
            assert_eq!(leaf.issuer().to_string(), ca.subject().to_string());
            assert!(leaf.subject().to_string().contains(name));
            assert!(leaf.verify_signature(Some(ca.public_key())).is_ok());
            serials.push(leaf.raw_serial().to_vec());
        }

        assert_ne!(serials[0], serials[1]);
        let state = std::fs::read_to_string(&files.serial).unwrap();
        assert_eq!(hex::decode(state.trim()).unwrap(), serials[1]);
    }

    #[test]
    fn test_increment_carries() {
        let mut serial = vec![0x01, 0xff];
        increment(&mut serial);
        assert_eq!(serial, vec![0x02, 0x00]);

        let mut serial = vec![0xff];
        increment(&mut serial);
        assert_eq!(serial, vec![0x01, 0x00]);
    }

    #[test]
    fn test_next_serial_reads_openssl_format() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("rootCA.srl");
        std::fs::write(&path, "0A1B\n").unwrap();
        assert_eq!(next_serial(&path).unwrap(), vec![0x0a, 0x1c]);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "0A1C\n");
    }
}
