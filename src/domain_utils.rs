/// Minimal domain helpers shared by identity resolution and alignment
pub struct DomainUtils;

impl DomainUtils {
    /// Extract the domain from an address or header value.
    ///
    /// Takes the text after the last `@` and stops at `>`, whitespace,
    /// `,`, `;` or `)`. Returns `None` when there is no `@` or nothing
    /// follows it.
    pub fn extract_domain(value: &str) -> Option<String> {
        let (_, rest) = value.rsplit_once('@')?;
        let domain: String = rest
            .chars()
            .take_while(|c| !matches!(c, '>' | ',' | ';' | ')') && !c.is_whitespace())
            .collect();
        let domain = domain.trim_end_matches('.').to_lowercase();

        if domain.is_empty() {
            None
        } else {
            Some(domain)
        }
    }

    /// True for a dot-separated name of non-empty labels made of ASCII
    /// letters, digits and hyphens. A single trailing dot is allowed.
    pub fn is_valid_domain(domain: &str) -> bool {
        let domain = domain.strip_suffix('.').unwrap_or(domain);
        !domain.is_empty()
            && domain.split('.').all(|label| {
                !label.is_empty()
                    && label.len() <= 63
                    && !label.starts_with('-')
                    && !label.ends_with('-')
                    && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
            })
    }

    /// Strip surrounding angle brackets and whitespace from an address
    pub fn strip_angle_brackets(value: &str) -> &str {
        value.trim().trim_matches(|c| c == '<' || c == '>').trim()
    }

    /// True when `domain` equals `parent` or is one of its subdomains.
    ///
    /// Matching happens on label boundaries, so `evilx.com` is not a
    /// subdomain of `x.com`.
    pub fn is_same_or_subdomain(domain: &str, parent: &str) -> bool {
        let domain_lower = domain.trim_end_matches('.').to_lowercase();
        let parent_lower = parent.trim_end_matches('.').to_lowercase();

        if domain_lower.is_empty() || parent_lower.is_empty() {
            return false;
        }

        // Exact match
        if domain_lower == parent_lower {
            return true;
        }

        // Subdomain match (domain ends with .parent)
        domain_lower.ends_with(&format!(".{}", parent_lower))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_domain() {
        assert_eq!(
            DomainUtils::extract_domain("user@example.com"),
            Some("example.com".to_string())
        );
        assert_eq!(
            DomainUtils::extract_domain("Alice <Alice@Example.COM>"),
            Some("example.com".to_string())
        );
        assert_eq!(
            DomainUtils::extract_domain("a@x.com (Alice)"),
            Some("x.com".to_string())
        );
        assert_eq!(DomainUtils::extract_domain("invalid"), None);
        assert_eq!(DomainUtils::extract_domain("<user@>"), None);
    }

    #[test]
    fn test_extract_domain_uses_last_at() {
        assert_eq!(
            DomainUtils::extract_domain("\"a@b\" <real@sender.org>"),
            Some("sender.org".to_string())
        );
    }

    #[test]
    fn test_strip_angle_brackets() {
        assert_eq!(
            DomainUtils::strip_angle_brackets(" <bounce@x.com> "),
            "bounce@x.com"
        );
        assert_eq!(DomainUtils::strip_angle_brackets("<>"), "");
    }

    #[test]
    fn test_is_valid_domain() {
        assert!(DomainUtils::is_valid_domain("x.com"));
        assert!(DomainUtils::is_valid_domain("mail-1.x.com."));
        assert!(!DomainUtils::is_valid_domain(""));
        assert!(!DomainUtils::is_valid_domain("x..com"));
        assert!(!DomainUtils::is_valid_domain("x.com junk"));
        assert!(!DomainUtils::is_valid_domain("-x.com"));
        assert!(!DomainUtils::is_valid_domain("x_y.com"));
    }

    #[test]
    fn test_is_same_or_subdomain() {
        assert!(DomainUtils::is_same_or_subdomain("x.com", "x.com"));
        assert!(DomainUtils::is_same_or_subdomain("mail.x.com", "x.com"));
        assert!(DomainUtils::is_same_or_subdomain("MAIL.X.COM", "x.com"));
        assert!(!DomainUtils::is_same_or_subdomain("evilx.com", "x.com"));
        assert!(!DomainUtils::is_same_or_subdomain("x.com", "mail.x.com"));
        assert!(!DomainUtils::is_same_or_subdomain("", "x.com"));
    }
}
