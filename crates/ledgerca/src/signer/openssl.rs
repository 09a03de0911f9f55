//! Signing backend that drives an `openssl` executable.
//!
//! Each operation is one subprocess with a structured argument list; nothing
//! goes through a shell. Passphrases reach openssl through the child's
//! environment (`pass:` arguments would be visible in the process table).

use std::ffi::OsString;
use std::fmt;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use ledgerca_core::KeyMethod;
use tokio::process::Command;
use tracing::info;

use super::{CsrRequest, KeyRequest, SelfSignRequest, SignRequest, SignerError, SigningService};

/// Environment variable carrying the key passphrase to openssl.
pub const PASSPHRASE_ENV: &str = "LEDGERCA_PASSPHRASE";

const RSA_BITS: &str = "2048";
const EC_CURVE: &str = "prime256v1";

/// A fully resolved openssl invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<OsString>,
    /// Exported as [`PASSPHRASE_ENV`] when set.
    pub passphrase: Option<String>,
}

impl CommandSpec {
    fn new(program: &str, subcommand: &str) -> Self {
        Self {
            program: program.to_string(),
            args: vec![subcommand.into()],
            passphrase: None,
        }
    }

    fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    fn opt(self, flag: &str, value: impl Into<OsString>) -> Self {
        self.arg(flag).arg(value)
    }

    fn path_opt(self, flag: &str, path: Option<&Path>) -> Self {
        match path {
            Some(path) => self.opt(flag, path),
            None => self,
        }
    }

    fn passphrase(mut self, flag: &str, passphrase: Option<&str>) -> Self {
        if let Some(passphrase) = passphrase {
            self = self.opt(flag, format!("env:{PASSPHRASE_ENV}"));
            self.passphrase = Some(passphrase.to_string());
        }
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Signing backend running `openssl` as a subprocess per operation.
#[derive(Debug, Clone)]
pub struct OpensslSigner {
    /// Path to the executable; `openssl` uses PATH lookup.
    program: String,

    /// Per-command timeout; `None` waits forever.
    timeout: Option<Duration>,
}

impl Default for OpensslSigner {
    fn default() -> Self {
        Self::new("openssl")
    }
}

impl OpensslSigner {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            timeout: None,
        }
    }

    /// Kill and report any command running longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn key_command(&self, req: &KeyRequest<'_>) -> CommandSpec {
        match req.method {
            KeyMethod::Ecc => CommandSpec::new(&self.program, "ecparam")
                .opt("-out", req.out)
                .opt("-name", EC_CURVE)
                .arg("-genkey"),
            KeyMethod::Dsa => {
                let mut spec = CommandSpec::new(&self.program, "genrsa");
                if req.passphrase.is_some() {
                    spec = spec.arg("-des3").passphrase("-passout", req.passphrase);
                }
                spec.opt("-out", req.out).arg(RSA_BITS)
            }
        }
    }

    pub fn self_sign_command(&self, req: &SelfSignRequest<'_>) -> CommandSpec {
        CommandSpec::new(&self.program, "req")
            .arg("-x509")
            .arg("-new")
            .arg("-nodes")
            .opt("-key", req.key)
            .passphrase("-passin", req.passphrase)
            .path_opt("-config", req.config)
            .arg("-sha256")
            .opt("-days", req.days.to_string())
            .opt("-subj", req.subject.to_string())
            .opt("-out", req.out)
    }

    pub fn request_command(&self, req: &CsrRequest<'_>) -> CommandSpec {
        CommandSpec::new(&self.program, "req")
            .arg("-new")
            .opt("-key", req.key)
            .opt("-out", req.out)
            .path_opt("-config", req.config)
            .opt("-subj", req.subject.to_string())
    }

    pub fn sign_command(&self, req: &SignRequest<'_>) -> CommandSpec {
        let ca = req.ca.files;
        CommandSpec::new(&self.program, "x509")
            .arg("-req")
            .opt("-in", req.csr)
            .opt("-CA", &ca.cert)
            .opt("-CAkey", &ca.key)
            .opt("-CAserial", &ca.serial)
            .arg("-CAcreateserial")
            .opt("-out", req.out)
            .opt("-days", req.days.to_string())
            .arg("-sha256")
            .path_opt("-extfile", req.extensions)
            .passphrase("-passin", req.ca.passphrase)
    }

    async fn run(&self, spec: CommandSpec) -> Result<(), SignerError> {
        info!(command = %spec, "running");

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(passphrase) = &spec.passphrase {
            command.env(PASSPHRASE_ENV, passphrase);
        }

        let output = command.output();
        let output = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, output)
                .await
                .map_err(|_| SignerError::Timeout {
                    command: spec.to_string(),
                    timeout,
                })?,
            None => output.await,
        }
        .map_err(|source| SignerError::Spawn {
            program: spec.program.clone(),
            source,
        })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(SignerError::CommandFailed {
                command: spec.to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

#[async_trait]
impl SigningService for OpensslSigner {
    fn backend(&self) -> &'static str {
        "openssl"
    }

    async fn generate_key(&self, req: KeyRequest<'_>) -> Result<(), SignerError> {
        self.run(self.key_command(&req)).await
    }

    async fn self_sign(&self, req: SelfSignRequest<'_>) -> Result<(), SignerError> {
        self.run(self.self_sign_command(&req)).await
    }

    async fn create_request(&self, req: CsrRequest<'_>) -> Result<(), SignerError> {
        self.run(self.request_command(&req)).await
    }

    async fn sign_request(&self, req: SignRequest<'_>) -> Result<(), SignerError> {
        self.run(self.sign_command(&req)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::CaFiles;
    use crate::signer::CaRef;
    use crate::subject::Subject;

    fn args(spec: &CommandSpec) -> Vec<String> {
        spec.args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn test_ecc_key_command() {
        let signer = OpensslSigner::default();
        let spec = signer.key_command(&KeyRequest {
            method: KeyMethod::Ecc,
            out: Path::new("CA/localhostCA.key"),
            passphrase: None,
        });
        assert_eq!(
            spec.to_string(),
            "openssl ecparam -out CA/localhostCA.key -name prime256v1 -genkey"
        );
        assert_eq!(spec.passphrase, None);
    }

    #[test]
    fn test_rsa_key_commands() {
        let signer = OpensslSigner::default();
        let ca = signer.key_command(&KeyRequest {
            method: KeyMethod::Dsa,
            out: Path::new("CA/localhostCA.key"),
            passphrase: Some("unsafe dsa_password"),
        });
        assert_eq!(
            args(&ca),
            [
                "genrsa",
                "-des3",
                "-passout",
                "env:LEDGERCA_PASSPHRASE",
                "-out",
                "CA/localhostCA.key",
                "2048"
            ]
        );
        assert_eq!(ca.passphrase.as_deref(), Some("unsafe dsa_password"));

        let leaf = signer.key_command(&KeyRequest {
            method: KeyMethod::Dsa,
            out: Path::new("cert/client.key"),
            passphrase: None,
        });
        assert_eq!(args(&leaf), ["genrsa", "-out", "cert/client.key", "2048"]);
    }

    #[test]
    fn test_self_sign_command_keeps_subject_as_one_argument() {
        let signer = OpensslSigner::new("/usr/bin/openssl");
        let subject = Subject::parse("/C=CN/ST=Beijing/L=./O=Mad Ledger").unwrap();
        let spec = signer.self_sign_command(&SelfSignRequest {
            key: Path::new("CA/localhostCA.key"),
            passphrase: Some("pw"),
            subject: &subject,
            days: 500,
            config: Some(Path::new("config/localhostCA.conf")),
            out: Path::new("CA/localhostCA.pem"),
        });
        assert_eq!(spec.program, "/usr/bin/openssl");
        assert_eq!(
            args(&spec),
            [
                "req",
                "-x509",
                "-new",
                "-nodes",
                "-key",
                "CA/localhostCA.key",
                "-passin",
                "env:LEDGERCA_PASSPHRASE",
                "-config",
                "config/localhostCA.conf",
                "-sha256",
                "-days",
                "500",
                "-subj",
                "/C=CN/ST=Beijing/L=./O=Mad Ledger",
                "-out",
                "CA/localhostCA.pem"
            ]
        );
        assert!(!spec.to_string().contains("pw "));
    }

    #[test]
    fn test_request_and_sign_commands() {
        let signer = OpensslSigner::default();
        let subject = Subject::parse("/O=MadLedger/CN=peer").unwrap();
        let csr = signer.request_command(&CsrRequest {
            key: Path::new("p/peer.key"),
            subject: &subject,
            config: None,
            out: Path::new("p/peer.csr"),
        });
        assert_eq!(
            args(&csr),
            ["req", "-new", "-key", "p/peer.key", "-out", "p/peer.csr", "-subj", "/O=MadLedger/CN=peer"]
        );

        let files = CaFiles::new(Path::new("CA"), "localhostCA");
        let sign = signer.sign_command(&SignRequest {
            csr: Path::new("p/peer.csr"),
            ca: CaRef {
                files: &files,
                passphrase: None,
            },
            days: 400,
            extensions: Some(Path::new("config/localhost.conf")),
            out: Path::new("p/peer.crt"),
        });
        assert_eq!(
            args(&sign),
            [
                "x509",
                "-req",
                "-in",
                "p/peer.csr",
                "-CA",
                "CA/localhostCA.pem",
                "-CAkey",
                "CA/localhostCA.key",
                "-CAserial",
                "CA/localhostCA.srl",
                "-CAcreateserial",
                "-out",
                "p/peer.crt",
                "-days",
                "400",
                "-sha256",
                "-extfile",
                "config/localhost.conf"
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let signer = OpensslSigner::new("/nonexistent/openssl-binary");
        let result = signer
            .generate_key(KeyRequest {
                method: KeyMethod::Ecc,
                out: Path::new("unused.key"),
                passphrase: None,
            })
            .await;
        assert!(matches!(result, Err(SignerError::Spawn { .. })));
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_command_failed() {
        let spec = CommandSpec::new("false", "ignored");
        let result = OpensslSigner::new("false").run(spec).await;
        assert!(matches!(result, Err(SignerError::CommandFailed { .. })));
    }

    #[tokio::test]
    async fn test_timeout() {
        let signer = OpensslSigner::new("sleep").with_timeout(Duration::from_millis(50));
        let spec = CommandSpec::new("sleep", "5");
        let result = signer.run(spec).await;
        assert!(matches!(result, Err(SignerError::Timeout { .. })));
    }
}
