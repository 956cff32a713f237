use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::IpAddr;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub dns: DnsConfig,
    pub checks: CheckConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsConfig {
    /// Nameserver addresses for DMARC lookups; empty means the system
    /// resolver configuration.
    pub nameservers: Vec<String>,
    pub timeout_seconds: u64,
}

impl DnsConfig {
    pub fn nameserver_ips(&self) -> Result<Vec<IpAddr>> {
        self.nameservers
            .iter()
            .map(|ns| {
                ns.parse::<IpAddr>()
                    .with_context(|| format!("Invalid nameserver address: {ns}"))
            })
            .collect()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            nameservers: Vec::new(),
            timeout_seconds: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckConfig {
    pub spf_timeout_seconds: u64,
    pub dkim_timeout_seconds: u64,
    /// Run the SPF, DKIM and DMARC lookups concurrently
    pub concurrent_checks: bool,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            spf_timeout_seconds: 10,
            dkim_timeout_seconds: 10,
            concurrent_checks: true,
        }
    }
}

impl CheckConfig {
    pub fn spf_timeout(&self) -> Duration {
        Duration::from_secs(self.spf_timeout_seconds)
    }

    pub fn dkim_timeout(&self) -> Duration {
        Duration::from_secs(self.dkim_timeout_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Reject settings no analysis can run with.
    pub fn validate(&self) -> Result<()> {
        if self.dns.timeout_seconds == 0 {
            bail!("dns.timeout_seconds must be greater than zero");
        }
        if self.checks.spf_timeout_seconds == 0 {
            bail!("checks.spf_timeout_seconds must be greater than zero");
        }
        if self.checks.dkim_timeout_seconds == 0 {
            bail!("checks.dkim_timeout_seconds must be greater than zero");
        }
        self.dns.nameserver_ips()?;
        self.level_filter()?;
        Ok(())
    }

    pub fn level_filter(&self) -> Result<log::LevelFilter> {
        log::LevelFilter::from_str(&self.logging.level)
            .map_err(|_| anyhow!("Invalid logging.level: {}", self.logging.level))
    }

    /// Timeout for the DMARC TXT lookup as a whole
    pub fn dns_timeout(&self) -> Duration {
        self.dns.timeout()
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize configuration")
    }
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

    let config: Config = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse YAML config: {}", path.as_ref().display()))?;

    config
        .validate()
        .with_context(|| format!("Invalid configuration: {}", path.as_ref().display()))?;

    Ok(config)
}
