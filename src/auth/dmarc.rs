use crate::alignment::AlignmentFlags;
use crate::error::CollaboratorError;
use serde::Serialize;
use std::fmt;

/// Outcome of the DMARC check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DmarcResult {
    Pass,
    Fail,
}

impl DmarcResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            DmarcResult::Pass => "pass",
            DmarcResult::Fail => "fail",
        }
    }

    /// Settle the `_dmarc` TXT lookup against the alignment flags.
    ///
    /// Passes only when a `v=DMARC1` record exists and SPF or DKIM is
    /// aligned with the From domain.
    pub fn settle(
        answer: Result<Vec<String>, CollaboratorError>,
        alignment: &AlignmentFlags,
    ) -> DmarcOutcome {
        let records = match answer {
            Ok(records) => records,
            Err(e) => {
                log::warn!("DMARC record lookup failed: {e}");
                return DmarcOutcome::failed();
            }
        };

        let Some(record) = find_record(&records) else {
            log::debug!("No DMARC record among {} TXT records", records.len());
            return DmarcOutcome::failed();
        };

        let policy = DmarcPolicy::from_record(record);
        let result = if alignment.spf_aligned || alignment.dkim_aligned {
            DmarcResult::Pass
        } else {
            DmarcResult::Fail
        };

        log::debug!("DMARC record {record:?} (policy {policy:?}) evaluated to {result}");
        DmarcOutcome { result, policy }
    }
}

impl fmt::Display for DmarcResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Requested handling published in the record's `p=` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DmarcPolicy {
    None,
    Quarantine,
    Reject,
}

impl DmarcPolicy {
    pub fn from_record(record: &str) -> Option<Self> {
        record.split(';').find_map(|tag| {
            let (name, value) = tag.split_once('=')?;
            if name.trim() != "p" {
                return None;
            }
            match value.trim().to_ascii_lowercase().as_str() {
                "none" => Some(DmarcPolicy::None),
                "quarantine" => Some(DmarcPolicy::Quarantine),
                "reject" => Some(DmarcPolicy::Reject),
                _ => None,
            }
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DmarcPolicy::None => "none",
            DmarcPolicy::Quarantine => "quarantine",
            DmarcPolicy::Reject => "reject",
        }
    }
}

/// DMARC result together with the policy the domain publishes, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DmarcOutcome {
    pub result: DmarcResult,
    pub policy: Option<DmarcPolicy>,
}

impl DmarcOutcome {
    fn failed() -> Self {
        Self {
            result: DmarcResult::Fail,
            policy: None,
        }
    }
}

/// DNS label holding the DMARC record of `domain`.
pub fn record_label(domain: &str) -> String {
    format!("_dmarc.{domain}")
}

/// First TXT string that is a DMARC record.
pub fn find_record(records: &[String]) -> Option<&str> {
    records
        .iter()
        .map(|record| record.trim_start())
        .find(|record| record.starts_with("v=DMARC1"))
}
