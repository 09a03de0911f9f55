//! Recording signer for orchestration tests.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{CsrRequest, KeyRequest, SelfSignRequest, SignRequest, SignerError, SigningService};

pub(crate) const MOCK_CERT: &str = "-----BEGIN CERTIFICATE-----\nTU9DSw==\n-----END CERTIFICATE-----\n";

/// Writes placeholder artifacts and records every call as `op:<output path>`.
#[derive(Default)]
pub(crate) struct MockSigner {
    calls: Mutex<Vec<String>>,
    /// Fail any operation whose output path contains this fragment.
    fail_on: Option<String>,
}

impl MockSigner {
    pub(crate) fn failing_on(fragment: &str) -> Self {
        Self {
            fail_on: Some(fragment.to_string()),
            ..Self::default()
        }
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, op: &str, out: &Path, contents: &str) -> Result<(), SignerError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{op}:{}", out.display()));
        if let Some(fragment) = &self.fail_on {
            if out.to_string_lossy().contains(fragment.as_str()) {
                return Err(SignerError::CommandFailed {
                    command: format!("mock {op}"),
                    status: "exit status: 1".to_string(),
                    stderr: "injected failure".to_string(),
                });
            }
        }
        std::fs::write(out, contents).map_err(|e| SignerError::io(out, e))
    }
}

#[async_trait]
impl SigningService for MockSigner {
    fn backend(&self) -> &'static str {
        "mock"
    }

    async fn generate_key(&self, req: KeyRequest<'_>) -> Result<(), SignerError> {
        self.record("key", req.out, "KEY\n")
    }

    async fn self_sign(&self, req: SelfSignRequest<'_>) -> Result<(), SignerError> {
        self.record("self_sign", req.out, MOCK_CERT)
    }

    async fn create_request(&self, req: CsrRequest<'_>) -> Result<(), SignerError> {
        self.record("csr", req.out, "CSR\n")
    }

    async fn sign_request(&self, req: SignRequest<'_>) -> Result<(), SignerError> {
        self.record("sign", req.out, MOCK_CERT)
    }
}
