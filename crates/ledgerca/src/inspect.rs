//! Reading certificates back from disk.
//!
//! Uses the pem crate to split bundles and x509-parser to decode them.

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use x509_parser::prelude::*;

use crate::error::PkiError;

/// Human readable facts about one certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertSummary {
    pub subject: String,
    pub issuer: String,
    /// Colon separated hex.
    pub serial: String,
    pub not_before: Option<DateTime<Utc>>,
    pub not_after: Option<DateTime<Utc>>,
    pub is_ca: bool,
    /// Dotted OID of the signature algorithm.
    pub signature_algorithm: String,
    /// Uppercase colon separated SHA-256 of the DER encoding.
    pub fingerprint: String,
}

impl CertSummary {
    pub fn from_der(der: &[u8]) -> Result<Self, PkiError> {
        let (_, cert) =
            X509Certificate::from_der(der).map_err(|e| PkiError::Parse(format!("{:?}", e)))?;
        let validity = cert.validity();

        Ok(Self {
            subject: cert.subject().to_string(),
            issuer: cert.issuer().to_string(),
            serial: cert.raw_serial_as_string(),
            not_before: DateTime::from_timestamp(validity.not_before.timestamp(), 0),
            not_after: DateTime::from_timestamp(validity.not_after.timestamp(), 0),
            is_ca: cert.is_ca(),
            signature_algorithm: cert.signature_algorithm.algorithm.to_id_string(),
            fingerprint: colon_hex(&Sha256::digest(der)),
        })
    }
}

impl fmt::Display for CertSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let time = |t: &Option<DateTime<Utc>>| {
            t.map(|t| t.to_rfc3339()).unwrap_or_else(|| "-".to_string())
        };
        writeln!(f, "Subject:             {}", self.subject)?;
        writeln!(f, "Issuer:              {}", self.issuer)?;
        writeln!(f, "Serial:              {}", self.serial)?;
        writeln!(f, "Not Before:          {}", time(&self.not_before))?;
        writeln!(f, "Not After:           {}", time(&self.not_after))?;
        writeln!(f, "CA:                  {}", self.is_ca)?;
        writeln!(f, "Signature Algorithm: {}", self.signature_algorithm)?;
        write!(f, "SHA256 Fingerprint:  {}", self.fingerprint)
    }
}

/// DER bodies of every CERTIFICATE block in a PEM file, in file order.
pub fn read_chain(path: &Path) -> Result<Vec<Vec<u8>>, PkiError> {
    let bytes = std::fs::read(path).map_err(|e| PkiError::io(path, e))?;
    let blocks = ::pem::parse_many(bytes).map_err(|e| PkiError::Parse(e.to_string()))?;
    Ok(blocks
        .into_iter()
        .filter(|block| block.tag() == "CERTIFICATE")
        .map(|block| block.into_contents())
        .collect())
}

/// Summaries of every certificate in a PEM file.
pub fn describe_file(path: &Path) -> Result<Vec<CertSummary>, PkiError> {
    read_chain(path)?
        .iter()
        .map(|der| CertSummary::from_der(der))
        .collect()
}

fn colon_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| hex::encode_upper([*b]))
        .collect::<Vec<_>>()
        .join(":")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcgen::{BasicConstraints, CertificateParams, DistinguishedName, DnType, IsCa, KeyPair};
    use tempfile::TempDir;

    fn self_signed(cn: &str, ca: bool) -> String {
        let mut params = CertificateParams::default();
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, cn);
        params.distinguished_name = dn;
        if ca {
            params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        }
        let key_pair = KeyPair::generate().unwrap();
        params.self_signed(&key_pair).unwrap().pem()
    }

    #[test]
    fn test_read_chain_keeps_order() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bundle.crt");
        std::fs::write(&path, format!("{}{}", self_signed("leaf", false), self_signed("root", true)))
            .unwrap();

        let summaries = describe_file(&path).unwrap();
        assert_eq!(summaries.len(), 2);
        assert!(summaries[0].subject.contains("leaf"));
        assert!(!summaries[0].is_ca);
        assert!(summaries[1].subject.contains("root"));
        assert!(summaries[1].is_ca);
    }

    #[test]
    fn test_summary_fields() {
        let pem = self_signed("Test CA", true);
        let der = ::pem::parse(&pem).unwrap().into_contents();
        let summary = CertSummary::from_der(&der).unwrap();

        assert_eq!(summary.subject, "CN=Test CA");
        assert_eq!(summary.subject, summary.issuer);
        assert_eq!(summary.fingerprint.split(':').count(), 32);
        assert!(summary.not_before.is_some());
        assert!(summary.to_string().contains("SHA256 Fingerprint:"));
    }

    #[test]
    fn test_garbage_is_parse_error() {
        assert!(matches!(CertSummary::from_der(b"nope"), Err(PkiError::Parse(_))));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = read_chain(Path::new("/nonexistent/bundle.crt"));
        assert!(matches!(result, Err(PkiError::Io { .. })));
    }
}
