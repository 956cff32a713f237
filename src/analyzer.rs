//! Message analysis pipeline.
//!
//! bytes -> header text -> fields -> identities -> check results ->
//! alignment -> verdict. Every stage consumes the previous stage's output
//! unchanged, so the result is a pure function of the message and the
//! verifier answers.

use crate::alignment::AlignmentFlags;
use crate::auth::{
    self, bounded, dmarc, DkimResult, DkimVerifier, DmarcOutcome, DmarcResult,
    HickoryTxtResolver, MailAuthDkimVerifier, MailAuthSpfEvaluator, SpfEvaluator, SpfResult,
    TxtResolver,
};
use crate::config::{CheckConfig, Config};
use crate::header::{extract_header, ParsedFields};
use crate::identity::{Identities, IdentityResolver};
use crate::verdict::Verdict;
use serde::Serialize;
use std::time::Duration;

/// Shown for any header the message does not carry.
pub const PLACEHOLDER: &str = "\u{2014}";

/// The flat result handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub verdict: String,
    pub spf: String,
    pub dkim: String,
    pub dmarc: String,
    pub from: String,
    pub reply_to: String,
    pub return_path: String,
}

/// Everything the pipeline derived for one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Analysis {
    pub identities: Identities,
    pub spf: SpfResult,
    pub dkim: DkimResult,
    pub dmarc: DmarcOutcome,
    pub alignment: AlignmentFlags,
    pub verdict: Verdict,
    pub from: Option<String>,
    pub reply_to: Option<String>,
    pub return_path: Option<String>,
}

impl Analysis {
    pub fn report(&self) -> AnalysisReport {
        let shown = |value: &Option<String>| value.clone().unwrap_or_else(|| PLACEHOLDER.to_string());

        AnalysisReport {
            verdict: self.verdict.to_string(),
            spf: self.spf.to_string(),
            dkim: self.dkim.to_string(),
            dmarc: self.dmarc.result.to_string(),
            from: shown(&self.from),
            reply_to: shown(&self.reply_to),
            return_path: shown(&self.return_path),
        }
    }
}

/// Analyses raw messages against the three verifiers it owns.
///
/// Holds no per-message state; one analyzer may serve any number of
/// concurrent `analyze` calls.
pub struct MessageAnalyzer<
    S = MailAuthSpfEvaluator,
    D = MailAuthDkimVerifier,
    R = HickoryTxtResolver,
> {
    spf: S,
    dkim: D,
    dns: R,
    checks: CheckConfig,
    dns_timeout: Duration,
    identity: IdentityResolver,
}

impl MessageAnalyzer {
    /// Build an analyzer with the production verifiers.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        config.validate()?;

        let authenticator = auth::system_authenticator(&config.dns)?;
        let dns = HickoryTxtResolver::from_config(&config.dns)?;

        Ok(Self::new(
            MailAuthSpfEvaluator::new(authenticator.clone()),
            MailAuthDkimVerifier::new(authenticator),
            dns,
            config,
        ))
    }
}

impl<S, D, R> MessageAnalyzer<S, D, R>
where
    S: SpfEvaluator,
    D: DkimVerifier,
    R: TxtResolver,
{
    pub fn new(spf: S, dkim: D, dns: R, config: &Config) -> Self {
        Self {
            spf,
            dkim,
            dns,
            checks: config.checks.clone(),
            dns_timeout: config.dns_timeout(),
            identity: IdentityResolver::new(),
        }
    }

    pub async fn analyze(&self, raw: &[u8]) -> AnalysisReport {
        self.analyze_detailed(raw).await.report()
    }

    pub async fn analyze_detailed(&self, raw: &[u8]) -> Analysis {
        let header = extract_header(raw);
        let fields = ParsedFields::parse(&header);
        let identities = self.identity.resolve(&fields);

        let label = dmarc::record_label(&identities.from_domain);
        let spf_call = bounded(
            self.checks.spf_timeout(),
            self.spf.check_host(
                &identities.sending_ip,
                &identities.envelope_sender,
                &identities.helo_domain,
            ),
        );
        let dkim_call = bounded(self.checks.dkim_timeout(), self.dkim.verify(raw));
        let dmarc_call = bounded(self.dns_timeout, self.dns.resolve_txt(&label));

        // All three answers are collected before anything is combined
        let (spf_answer, dkim_answer, txt_answer) = if self.checks.concurrent_checks {
            tokio::join!(spf_call, dkim_call, dmarc_call)
        } else {
            (spf_call.await, dkim_call.await, dmarc_call.await)
        };

        let spf = SpfResult::settle(spf_answer);
        let dkim = DkimResult::settle(
            dkim_answer,
            identities.dkim_signer_domain.as_deref(),
            &identities.from_domain,
        );
        let alignment = AlignmentFlags::evaluate(&identities, spf, dkim);
        let dmarc = DmarcResult::settle(txt_answer, &alignment);

        let from = fields.from().map(str::to_string);
        let reply_to = fields.reply_to().map(str::to_string);
        let return_path = fields.return_path().map(str::to_string);

        let verdict = Verdict::new(spf, dkim, dmarc.result, from.as_deref(), reply_to.as_deref());

        log::info!(
            "Verdict for {}: {verdict} (spf={spf}, dkim={dkim}, dmarc={})",
            identities.from_domain,
            dmarc.result
        );

        Analysis {
            identities,
            spf,
            dkim,
            dmarc,
            alignment,
            verdict,
            from,
            reply_to,
            return_path,
        }
    }
}
