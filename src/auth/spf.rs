use crate::error::CollaboratorError;
use async_trait::async_trait;
use mail_auth::spf::verify::SpfParameters;
use mail_auth::MessageAuthenticator;
use serde::Serialize;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

/// Outcome of the SPF check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SpfResult {
    Pass,
    Fail,
    SoftFail,
    Neutral,
    None,
    TempError,
    PermError,
}

impl SpfResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpfResult::Pass => "pass",
            SpfResult::Fail => "fail",
            SpfResult::SoftFail => "softfail",
            SpfResult::Neutral => "neutral",
            SpfResult::None => "none",
            SpfResult::TempError => "temperror",
            SpfResult::PermError => "permerror",
        }
    }

    /// Map an evaluator outcome name; anything unrecognised is `Fail`.
    pub fn from_outcome(outcome: &str) -> Self {
        match outcome.trim().to_ascii_lowercase().as_str() {
            "pass" => SpfResult::Pass,
            "softfail" => SpfResult::SoftFail,
            "neutral" => SpfResult::Neutral,
            "none" => SpfResult::None,
            "temperror" => SpfResult::TempError,
            "permerror" => SpfResult::PermError,
            _ => SpfResult::Fail,
        }
    }

    /// Settle an evaluator answer, failing closed on any error.
    pub fn settle(answer: Result<String, CollaboratorError>) -> Self {
        match answer {
            Ok(outcome) => {
                let result = Self::from_outcome(&outcome);
                if result == SpfResult::Fail && !outcome.trim().eq_ignore_ascii_case("fail") {
                    log::warn!("Unrecognised SPF outcome {outcome:?}, treating as fail");
                }
                result
            }
            Err(e) => {
                log::warn!("SPF evaluation failed: {e}");
                SpfResult::Fail
            }
        }
    }
}

impl fmt::Display for SpfResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Evaluates the SPF policy of `sender` for a connection from `ip` that
/// announced `helo`, answering with an outcome name such as `pass`.
#[async_trait]
pub trait SpfEvaluator: Send + Sync {
    async fn check_host(&self, ip: &str, sender: &str, helo: &str)
        -> Result<String, CollaboratorError>;
}

/// SPF evaluation backed by `mail-auth`.
pub struct MailAuthSpfEvaluator {
    authenticator: Arc<MessageAuthenticator>,
}

impl MailAuthSpfEvaluator {
    pub fn new(authenticator: Arc<MessageAuthenticator>) -> Self {
        Self { authenticator }
    }
}

#[async_trait]
impl SpfEvaluator for MailAuthSpfEvaluator {
    async fn check_host(
        &self,
        ip: &str,
        sender: &str,
        helo: &str,
    ) -> Result<String, CollaboratorError> {
        let ip: IpAddr = ip
            .parse()
            .map_err(|e| CollaboratorError::Verification(format!("invalid ip {ip}: {e}")))?;

        let output = self
            .authenticator
            .verify_spf(SpfParameters::verify_mail_from(ip, helo, helo, sender))
            .await;

        Ok(format_spf_result(output.result()).to_string())
    }
}

fn format_spf_result(result: mail_auth::SpfResult) -> &'static str {
    match result {
        mail_auth::SpfResult::Pass => "pass",
        mail_auth::SpfResult::Fail => "fail",
        mail_auth::SpfResult::SoftFail => "softfail",
        mail_auth::SpfResult::Neutral => "neutral",
        mail_auth::SpfResult::None => "none",
        mail_auth::SpfResult::TempError => "temperror",
        mail_auth::SpfResult::PermError => "permerror",
    }
}
