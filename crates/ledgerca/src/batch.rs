//! Batch driver: the root CA, then every identity of a topology in order.

use std::fmt;

use ledgerca_core::{Identity, Topology};
use tracing::{info, warn};

use crate::ca::{bootstrap_ca, require_ca};
use crate::config::{BatchConfig, FailurePolicy};
use crate::error::PkiError;
use crate::issue::issue_leaf;
use crate::signer::SigningService;

/// An identity whose issuance failed under [`FailurePolicy::BestEffort`].
#[derive(Debug, Clone)]
pub struct FailedIdentity {
    pub identity: Identity,
    pub error: String,
}

/// Outcome of a batch run.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub ca_regenerated: bool,
    pub issued: Vec<Identity>,
    pub failed: Vec<FailedIdentity>,
}

impl BatchReport {
    /// Returns true if every identity was issued.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} issued, {} failed",
            self.issued.len(),
            self.failed.len()
        )?;
        if self.ca_regenerated {
            write!(f, " (root CA regenerated)")?;
        }
        for failed in &self.failed {
            write!(
                f,
                "\n  FAILED {:<8} {}: {}",
                failed.identity.role,
                failed.identity.dir.display(),
                failed.error
            )?;
        }
        Ok(())
    }
}

/// Issue a bundle for every identity in `topology`, in table order.
///
/// The root CA is regenerated first when `config.regenerate_ca` is set;
/// otherwise it must already exist. A missing identity directory or a failed
/// cleanup stops the batch. Signing failures stop it only under
/// [`FailurePolicy::Strict`]; otherwise they are collected in the report.
pub async fn run_batch(
    signer: &dyn SigningService,
    config: &BatchConfig,
    topology: &Topology,
) -> Result<BatchReport, PkiError> {
    let mut report = BatchReport::default();

    if config.regenerate_ca {
        bootstrap_ca(signer, &config.ca).await?;
        report.ca_regenerated = true;
    } else {
        require_ca(&config.ca)?;
    }

    info!(
        identities = topology.len(),
        backend = signer.backend(),
        "issuing leaf certificates"
    );

    for identity in topology {
        match issue_leaf(signer, &config.ca, &config.leaf, identity).await {
            Ok(files) => {
                info!(role = %identity.role, dir = %identity.dir.display(), crt = %files.crt.display(), "done");
                report.issued.push(identity.clone());
            }
            Err(e) if !e.is_fatal() && config.failure_policy == FailurePolicy::BestEffort => {
                warn!(role = %identity.role, dir = %identity.dir.display(), error = %e, "command failed.");
                report.failed.push(FailedIdentity {
                    identity: identity.clone(),
                    error: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        }
    }

    Ok(report)
}
