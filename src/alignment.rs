//! SPF/DKIM alignment with the visible From domain.
//!
//! DMARC consumes these flags rather than the raw check results: a check
//! only counts when the domain it authenticated is the From domain or a
//! subdomain of it. DKIM only authenticates a domain through a verified
//! signature; `DomainMatch` never aligns.

use crate::auth::{DkimResult, SpfResult};
use crate::domain_utils::DomainUtils;
use crate::identity::Identities;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AlignmentFlags {
    pub spf_aligned: bool,
    pub dkim_aligned: bool,
}

impl AlignmentFlags {
    pub fn evaluate(identities: &Identities, spf: SpfResult, dkim: DkimResult) -> Self {
        let from_domain = &identities.from_domain;

        let spf_aligned = spf == SpfResult::Pass
            && DomainUtils::is_same_or_subdomain(&identities.mail_from_domain, from_domain);

        let dkim_aligned = dkim == DkimResult::Pass
            && identities
                .dkim_signer_domain
                .as_deref()
                .is_some_and(|signer| DomainUtils::is_same_or_subdomain(signer, from_domain));

        log::debug!("Alignment for {from_domain}: spf={spf_aligned} dkim={dkim_aligned}");

        Self {
            spf_aligned,
            dkim_aligned,
        }
    }
}
