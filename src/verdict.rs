//! Final classification of an analysed message.

use crate::auth::{DkimResult, DmarcResult, SpfResult};
use serde::{Serialize, Serializer};
use std::fmt;

pub const REPLY_TO_MISMATCH_SUFFIX: &str = "+ Reply-To Mismatch (High Risk)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Genuine,
    LikelySpoofed,
    PossiblyGenuineButSuspicious,
}

impl Classification {
    /// Decision table, first match wins:
    /// 1. DMARC pass => Genuine
    /// 2. SPF fail and DKIM fail => Likely Spoofed
    /// 3. otherwise => Possibly Genuine but Suspicious
    pub fn decide(spf: SpfResult, dkim: DkimResult, dmarc: DmarcResult) -> Self {
        if dmarc == DmarcResult::Pass {
            Classification::Genuine
        } else if spf == SpfResult::Fail && dkim == DkimResult::Fail {
            Classification::LikelySpoofed
        } else {
            Classification::PossiblyGenuineButSuspicious
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Genuine => "Genuine",
            Classification::LikelySpoofed => "Likely Spoofed",
            Classification::PossiblyGenuineButSuspicious => "Possibly Genuine but Suspicious",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification plus the Reply-To mismatch annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub classification: Classification,
    pub reply_to_mismatch: bool,
}

impl Verdict {
    pub fn new(
        spf: SpfResult,
        dkim: DkimResult,
        dmarc: DmarcResult,
        from: Option<&str>,
        reply_to: Option<&str>,
    ) -> Self {
        Self {
            classification: Classification::decide(spf, dkim, dmarc),
            reply_to_mismatch: reply_to_mismatch(from, reply_to),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.reply_to_mismatch {
            write!(f, "{} {}", self.classification, REPLY_TO_MISMATCH_SUFFIX)
        } else {
            write!(f, "{}", self.classification)
        }
    }
}

impl Serialize for Verdict {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

fn normalize(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A present Reply-To that differs from From. An absent Reply-To is never
/// a mismatch.
pub fn reply_to_mismatch(from: Option<&str>, reply_to: Option<&str>) -> bool {
    match (from, reply_to) {
        (_, None) => false,
        (None, Some(_)) => true,
        (Some(from), Some(reply_to)) => normalize(from) != normalize(reply_to),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPF_ALL: [SpfResult; 7] = [
        SpfResult::Pass,
        SpfResult::Fail,
        SpfResult::SoftFail,
        SpfResult::Neutral,
        SpfResult::None,
        SpfResult::TempError,
        SpfResult::PermError,
    ];
    const DKIM_ALL: [DkimResult; 3] = [DkimResult::Pass, DkimResult::Fail, DkimResult::DomainMatch];

    #[test]
    fn test_dmarc_pass_is_always_genuine() {
        for spf in SPF_ALL {
            for dkim in DKIM_ALL {
                assert_eq!(
                    Classification::decide(spf, dkim, DmarcResult::Pass),
                    Classification::Genuine
                );
            }
        }
    }

    #[test]
    fn test_double_failure_is_likely_spoofed() {
        assert_eq!(
            Classification::decide(SpfResult::Fail, DkimResult::Fail, DmarcResult::Fail),
            Classification::LikelySpoofed
        );
    }

    #[test]
    fn test_everything_else_is_suspicious() {
        for spf in SPF_ALL {
            for dkim in DKIM_ALL {
                if spf == SpfResult::Fail && dkim == DkimResult::Fail {
                    continue;
                }
                assert_eq!(
                    Classification::decide(spf, dkim, DmarcResult::Fail),
                    Classification::PossiblyGenuineButSuspicious
                );
            }
        }
    }

    #[test]
    fn test_domain_match_avoids_spoofed() {
        assert_eq!(
            Classification::decide(SpfResult::Fail, DkimResult::DomainMatch, DmarcResult::Fail),
            Classification::PossiblyGenuineButSuspicious
        );
    }

    #[test]
    fn test_reply_to_mismatch() {
        assert!(reply_to_mismatch(Some("a@x.com"), Some("b@y.com")));
        assert!(!reply_to_mismatch(Some("a@x.com"), Some("a@x.com")));
        assert!(!reply_to_mismatch(Some("Alice  <a@x.com>"), Some(" Alice <a@x.com>")));
        assert!(!reply_to_mismatch(Some("a@x.com"), None));
        assert!(!reply_to_mismatch(None, None));
        assert!(reply_to_mismatch(None, Some("b@y.com")));
    }

    #[test]
    fn test_verdict_display() {
        let plain = Verdict::new(
            SpfResult::Pass,
            DkimResult::Pass,
            DmarcResult::Pass,
            Some("a@x.com"),
            None,
        );
        assert_eq!(plain.to_string(), "Genuine");

        let flagged = Verdict::new(
            SpfResult::Fail,
            DkimResult::Fail,
            DmarcResult::Fail,
            Some("a@x.com"),
            Some("b@y.com"),
        );
        assert_eq!(
            flagged.to_string(),
            "Likely Spoofed + Reply-To Mismatch (High Risk)"
        );
        assert_eq!(flagged.classification, Classification::LikelySpoofed);
    }
}
