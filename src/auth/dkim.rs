use crate::domain_utils::DomainUtils;
use crate::error::CollaboratorError;
use async_trait::async_trait;
use mail_auth::{AuthenticatedMessage, MessageAuthenticator};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Outcome of the DKIM check.
///
/// `DomainMatch` is recorded when cryptographic verification did not pass
/// but the declared signer is the From domain or one of its subdomains.
/// It keeps relayed or forwarded mail out of the spoofed bucket and is
/// never reported as `Pass`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DkimResult {
    #[serde(rename = "pass")]
    Pass,
    #[serde(rename = "fail")]
    Fail,
    #[serde(rename = "domain-match")]
    DomainMatch,
}

impl DkimResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            DkimResult::Pass => "pass",
            DkimResult::Fail => "fail",
            DkimResult::DomainMatch => "domain-match",
        }
    }

    /// Settle a verifier answer, falling back to a signer/From domain
    /// comparison when the signature could not be verified.
    pub fn settle(
        answer: Result<bool, CollaboratorError>,
        signer_domain: Option<&str>,
        from_domain: &str,
    ) -> Self {
        match answer {
            Ok(true) => return DkimResult::Pass,
            Ok(false) => log::debug!("DKIM signature did not verify"),
            Err(e) => log::warn!("DKIM verification failed: {e}"),
        }

        match signer_domain {
            Some(signer) if DomainUtils::is_same_or_subdomain(signer, from_domain) => {
                log::debug!("DKIM signer {signer} matches From domain {from_domain}");
                DkimResult::DomainMatch
            }
            _ => DkimResult::Fail,
        }
    }
}

impl fmt::Display for DkimResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verifies the DKIM signatures of a complete raw message.
#[async_trait]
pub trait DkimVerifier: Send + Sync {
    async fn verify(&self, raw: &[u8]) -> Result<bool, CollaboratorError>;
}

/// DKIM verification backed by `mail-auth`. A message passes when any of
/// its signatures verifies.
pub struct MailAuthDkimVerifier {
    authenticator: Arc<MessageAuthenticator>,
}

impl MailAuthDkimVerifier {
    pub fn new(authenticator: Arc<MessageAuthenticator>) -> Self {
        Self { authenticator }
    }
}

#[async_trait]
impl DkimVerifier for MailAuthDkimVerifier {
    async fn verify(&self, raw: &[u8]) -> Result<bool, CollaboratorError> {
        let message = AuthenticatedMessage::parse(raw).ok_or_else(|| {
            CollaboratorError::Verification("message could not be parsed".to_string())
        })?;

        let outputs = self.authenticator.verify_dkim(&message).await;
        for output in &outputs {
            log::debug!("DKIM signature result: {:?}", output.result());
        }

        Ok(outputs
            .iter()
            .any(|output| matches!(output.result(), mail_auth::DkimResult::Pass)))
    }
}
