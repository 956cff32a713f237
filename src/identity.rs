//! Sender identity resolution.
//!
//! SPF authenticates the envelope (Return-Path and HELO), DKIM the signer
//! named in `d=`, and DMARC ties both to the visible From domain, so the
//! three are resolved separately and never merged into one "domain".

use crate::domain_utils::DomainUtils;
use crate::header::ParsedFields;
use regex::Regex;
use serde::Serialize;
use std::net::Ipv4Addr;

pub const FALLBACK_SENDING_IP: &str = "0.0.0.0";
pub const FALLBACK_HELO_DOMAIN: &str = "localhost";
pub const FALLBACK_FROM_DOMAIN: &str = "example.com";

/// Identities derived from one message's header fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identities {
    pub sending_ip: String,
    pub helo_domain: String,
    pub from_domain: String,
    pub mail_from_domain: String,
    /// Sender handed to the SPF evaluator.
    pub envelope_sender: String,
    pub dkim_signer_domain: Option<String>,
    /// Identities that were not present in the message and took their
    /// documented default.
    pub fallbacks: Vec<&'static str>,
}

pub struct IdentityResolver {
    ip_literal: Regex,
    helo: Regex,
    by_clause: Regex,
}

impl Default for IdentityResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityResolver {
    pub fn new() -> Self {
        Self {
            ip_literal: Regex::new(r"\[(\d{1,3}(?:\.\d{1,3}){3})\]").expect("static regex"),
            helo: Regex::new(r"(?i)^from\s+(\S+)").expect("static regex"),
            by_clause: Regex::new(r"(?i)\sby\s").expect("static regex"),
        }
    }

    pub fn resolve(&self, fields: &ParsedFields) -> Identities {
        let mut fallbacks = Vec::new();

        let sending_ip = self.sending_ip(fields).unwrap_or_else(|| {
            fallbacks.push("sending_ip");
            FALLBACK_SENDING_IP.to_string()
        });

        let helo_domain = self.helo_domain(fields).unwrap_or_else(|| {
            fallbacks.push("helo_domain");
            FALLBACK_HELO_DOMAIN.to_string()
        });

        let from_domain = fields
            .from()
            .and_then(DomainUtils::extract_domain)
            .unwrap_or_else(|| {
                fallbacks.push("from_domain");
                FALLBACK_FROM_DOMAIN.to_string()
            });

        let return_path = fields
            .return_path()
            .map(DomainUtils::strip_angle_brackets)
            .filter(|addr| addr.contains('@'));

        let mail_from_domain = return_path
            .and_then(DomainUtils::extract_domain)
            .unwrap_or_else(|| {
                fallbacks.push("mail_from_domain");
                from_domain.clone()
            });

        let envelope_sender = match return_path {
            Some(addr) if DomainUtils::extract_domain(addr).is_some() => addr.to_string(),
            _ => format!("postmaster@{mail_from_domain}"),
        };

        let dkim_signer_domain = fields.dkim_signature().and_then(signer_domain);

        let identities = Identities {
            sending_ip,
            helo_domain,
            from_domain,
            mail_from_domain,
            envelope_sender,
            dkim_signer_domain,
            fallbacks,
        };

        log::debug!(
            "Resolved identities: ip={} helo={} from={} mail_from={} dkim_d={:?} fallbacks={:?}",
            identities.sending_ip,
            identities.helo_domain,
            identities.from_domain,
            identities.mail_from_domain,
            identities.dkim_signer_domain,
            identities.fallbacks
        );

        identities
    }

    /// IP literal of the from-clause in the last `Received: from` trace.
    fn sending_ip(&self, fields: &ParsedFields) -> Option<String> {
        fields
            .received()
            .iter()
            .filter(|value| self.helo.is_match(value))
            .filter_map(|value| {
                let clause = self.by_clause.split(value).next().unwrap_or(value);
                self.ip_literal
                    .captures_iter(clause)
                    .filter_map(|caps| caps[1].parse::<Ipv4Addr>().ok())
                    .last()
            })
            .last()
            .map(|ip| ip.to_string())
    }

    /// Host token announced in the first `Received: from` trace.
    fn helo_domain(&self, fields: &ParsedFields) -> Option<String> {
        fields
            .received()
            .iter()
            .find_map(|value| self.helo.captures(value))
            .map(|caps| caps[1].to_string())
    }
}

/// Value of the `d=` tag of a DKIM-Signature, lower-cased.
///
/// A value that is not a well-formed domain yields `None`.
pub fn signer_domain(signature: &str) -> Option<String> {
    for tag in signature.split(';') {
        if let Some((name, value)) = tag.split_once('=') {
            if name.trim() == "d" {
                let domain = value.trim().trim_end_matches('.').to_lowercase();
                return DomainUtils::is_valid_domain(&domain).then_some(domain);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{extract_header, ParsedFields};

    fn resolve(raw: &str) -> Identities {
        let fields = ParsedFields::parse(&extract_header(raw.as_bytes()));
        IdentityResolver::new().resolve(&fields)
    }

    #[test]
    fn test_full_message_identities() {
        let ids = resolve(
            "Received: from mail.x.com [203.0.113.5]\r\n\
             From: <a@x.com>\r\n\
             Return-Path: <bounce@mail.x.com>\r\n\
             DKIM-Signature: v=1; a=rsa-sha256;\r\n\td=X.com; s=sel\r\n\r\nbody",
        );
        assert_eq!(ids.sending_ip, "203.0.113.5");
        assert_eq!(ids.helo_domain, "mail.x.com");
        assert_eq!(ids.from_domain, "x.com");
        assert_eq!(ids.mail_from_domain, "mail.x.com");
        assert_eq!(ids.envelope_sender, "bounce@mail.x.com");
        assert_eq!(ids.dkim_signer_domain, Some("x.com".to_string()));
        assert!(ids.fallbacks.is_empty());
    }

    #[test]
    fn test_fallbacks_for_empty_header() {
        let ids = resolve("Subject: nothing here\r\n\r\n");
        assert_eq!(ids.sending_ip, FALLBACK_SENDING_IP);
        assert_eq!(ids.helo_domain, FALLBACK_HELO_DOMAIN);
        assert_eq!(ids.from_domain, FALLBACK_FROM_DOMAIN);
        assert_eq!(ids.mail_from_domain, FALLBACK_FROM_DOMAIN);
        assert_eq!(ids.envelope_sender, "postmaster@example.com");
        assert_eq!(ids.dkim_signer_domain, None);
        assert_eq!(
            ids.fallbacks,
            vec!["sending_ip", "helo_domain", "from_domain", "mail_from_domain"]
        );
    }

    #[test]
    fn test_missing_return_path_uses_from_domain() {
        let ids = resolve("From: alice@example.com\r\n\r\n");
        assert_eq!(ids.from_domain, "example.com");
        assert_eq!(ids.mail_from_domain, "example.com");
        assert!(ids.fallbacks.contains(&"mail_from_domain"));
        assert!(!ids.fallbacks.contains(&"from_domain"));
    }

    #[test]
    fn test_null_return_path_uses_from_domain() {
        let ids = resolve("Return-Path: <>\r\nFrom: Bob <bob@y.org>\r\n\r\n");
        assert_eq!(ids.mail_from_domain, "y.org");
        assert_eq!(ids.envelope_sender, "postmaster@y.org");
    }

    #[test]
    fn test_sending_ip_takes_last_from_clause_literal() {
        let ids = resolve(
            "Received: from mx.relay.net (mx.relay.net [198.51.100.7]) by mx.local ([10.0.0.1])\r\n\
             Received: from origin.x.com (origin.x.com [203.0.113.9])\r\n\
             \tby mx.relay.net with ESMTP\r\n\r\n",
        );
        assert_eq!(ids.sending_ip, "203.0.113.9");
        assert_eq!(ids.helo_domain, "mx.relay.net");
    }

    #[test]
    fn test_sending_ip_ignores_invalid_literals() {
        let ids = resolve("Received: from host.example [999.1.1.1]\r\n\r\n");
        assert_eq!(ids.sending_ip, FALLBACK_SENDING_IP);
        assert_eq!(ids.helo_domain, "host.example");
    }

    #[test]
    fn test_received_without_from_clause_is_ignored() {
        let ids = resolve("Received: by mx.local [192.0.2.1]\r\n\r\n");
        assert_eq!(ids.sending_ip, FALLBACK_SENDING_IP);
        assert_eq!(ids.helo_domain, FALLBACK_HELO_DOMAIN);
    }

    #[test]
    fn test_signer_domain() {
        assert_eq!(
            signer_domain("v=1; a=rsa-sha256; d=Example.com; s=selector"),
            Some("example.com".to_string())
        );
        assert_eq!(signer_domain("v=1; a=rsa-sha256; s=selector"), None);
        assert_eq!(signer_domain("v=1; d=; s=selector"), None);
        assert_eq!(signer_domain("garbage"), None);
    }

    #[test]
    fn test_malformed_signer_domain_is_dropped() {
        assert_eq!(signer_domain("v=1; d=x.com junk; s=sel"), None);
        assert_eq!(signer_domain("v=1; d=x..com; s=sel"), None);
        assert_eq!(signer_domain("v=1; d=x.com\r\n\tfoo; s=sel"), None);

        let ids = resolve("From: a@x.com\r\nDKIM-Signature: v=1; d=x.com junk; s=sel\r\n\r\n");
        assert_eq!(ids.dkim_signer_domain, None);
    }
}
