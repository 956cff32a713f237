use thiserror::Error;

/// Failure reported by one of the external verifiers (SPF evaluator,
/// DKIM verifier, DNS resolver).
///
/// These never leave the analyzer: every variant is settled into the
/// `fail` state of the check that produced it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CollaboratorError {
    #[error("verifier did not answer within the configured timeout")]
    Timeout,
    #[error("no records found")]
    NoRecords,
    #[error("lookup failed: {0}")]
    Lookup(String),
    #[error("verification error: {0}")]
    Verification(String),
    #[error("verifier unavailable: {0}")]
    Unavailable(String),
}
