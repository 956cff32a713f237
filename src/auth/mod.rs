//! SPF, DKIM and DMARC checks.
//!
//! Each check asks an external verifier for an answer and settles it into
//! a closed result set. Errors, timeouts and unknown answers always settle
//! to `fail`.

pub mod dkim;
pub mod dmarc;
pub mod dns;
pub mod spf;

pub use dkim::{DkimResult, DkimVerifier, MailAuthDkimVerifier};
pub use dmarc::{DmarcOutcome, DmarcPolicy, DmarcResult};
pub use dns::{HickoryTxtResolver, TxtResolver};
pub use spf::{MailAuthSpfEvaluator, SpfEvaluator, SpfResult};

use crate::config::DnsConfig;
use crate::error::CollaboratorError;
use anyhow::anyhow;
use mail_auth::hickory_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use mail_auth::hickory_resolver::system_conf::read_system_conf;
use mail_auth::MessageAuthenticator;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Authenticator shared by the SPF and DKIM verifiers.
///
/// Uses the configured nameservers when any are set, otherwise the system
/// resolver configuration, falling back to Cloudflare DNS-over-TLS when
/// none is available. The DNS timeout applies either way.
pub fn system_authenticator(config: &DnsConfig) -> anyhow::Result<Arc<MessageAuthenticator>> {
    let ips = config.nameserver_ips()?;

    let (resolver_config, mut opts) = if ips.is_empty() {
        match read_system_conf() {
            Ok(system) => system,
            Err(e) => {
                log::warn!(
                    "Failed to load system DNS config ({e}), falling back to Cloudflare TLS"
                );
                return MessageAuthenticator::new_cloudflare_tls()
                    .map(Arc::new)
                    .map_err(|e| anyhow!("Failed to create DNS resolver for SPF/DKIM: {e}"));
            }
        }
    } else {
        let group = NameServerConfigGroup::from_ips_clear(&ips, 53, true);
        (
            ResolverConfig::from_parts(None, vec![], group),
            ResolverOpts::default(),
        )
    };
    opts.timeout = config.timeout();
    opts.attempts = 1;

    MessageAuthenticator::new(resolver_config, opts)
        .map(Arc::new)
        .map_err(|e| anyhow!("Failed to create DNS resolver for SPF/DKIM: {e}"))
}

/// Await a verifier call, converting an expired deadline into
/// [`CollaboratorError::Timeout`].
pub async fn bounded<T, F>(limit: Duration, call: F) -> Result<T, CollaboratorError>
where
    F: Future<Output = Result<T, CollaboratorError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(CollaboratorError::Timeout),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bounded_passes_through_answer() {
        let result = bounded(Duration::from_secs(1), async { Ok::<_, CollaboratorError>(7) }).await;
        assert_eq!(result, Ok(7));
    }

    #[tokio::test]
    async fn test_bounded_times_out() {
        let result: Result<(), _> = bounded(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert_eq!(result, Err(CollaboratorError::Timeout));
    }

    #[tokio::test]
    async fn test_authenticator_from_explicit_nameservers() {
        let config = DnsConfig {
            nameservers: vec!["192.0.2.53".to_string(), "2001:db8::53".to_string()],
            timeout_seconds: 2,
        };
        assert!(system_authenticator(&config).is_ok());
    }

    #[tokio::test]
    async fn test_authenticator_rejects_invalid_nameserver() {
        let config = DnsConfig {
            nameservers: vec!["not-an-ip".to_string()],
            timeout_seconds: 2,
        };
        assert!(system_authenticator(&config).is_err());
    }
}
