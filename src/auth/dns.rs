use crate::config::DnsConfig;
use crate::error::CollaboratorError;
use anyhow::Context;
use async_trait::async_trait;
use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use hickory_resolver::error::ResolveErrorKind;
use hickory_resolver::TokioAsyncResolver;

/// Resolves the TXT records published at a DNS label.
#[async_trait]
pub trait TxtResolver: Send + Sync {
    async fn resolve_txt(&self, label: &str) -> Result<Vec<String>, CollaboratorError>;
}

/// TXT lookups through hickory, using either the configured nameservers or
/// the system resolver configuration.
pub struct HickoryTxtResolver {
    resolver: TokioAsyncResolver,
}

impl HickoryTxtResolver {
    pub fn from_config(config: &DnsConfig) -> anyhow::Result<Self> {
        let ips = config.nameserver_ips()?;
        let (resolver_config, mut opts) = if ips.is_empty() {
            hickory_resolver::system_conf::read_system_conf()
                .context("Failed to read system DNS configuration")?
        } else {
            let group = NameServerConfigGroup::from_ips_clear(&ips, 53, true);
            (
                ResolverConfig::from_parts(None, vec![], group),
                ResolverOpts::default(),
            )
        };

        opts.timeout = config.timeout();
        opts.attempts = 1;

        log::debug!(
            "DNS resolver configured (nameservers: {:?}, timeout: {}s)",
            config.nameservers,
            config.timeout_seconds
        );

        Ok(Self {
            resolver: TokioAsyncResolver::tokio(resolver_config, opts),
        })
    }
}

#[async_trait]
impl TxtResolver for HickoryTxtResolver {
    async fn resolve_txt(&self, label: &str) -> Result<Vec<String>, CollaboratorError> {
        let lookup = self.resolver.txt_lookup(label).await.map_err(|e| match e.kind() {
            ResolveErrorKind::NoRecordsFound { .. } => CollaboratorError::NoRecords,
            _ => CollaboratorError::Lookup(e.to_string()),
        })?;

        // A record may be split into several character-strings
        Ok(lookup
            .iter()
            .map(|txt| {
                txt.txt_data()
                    .iter()
                    .map(|part| String::from_utf8_lossy(part))
                    .collect::<String>()
            })
            .collect())
    }
}
