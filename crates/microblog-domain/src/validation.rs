//! Custom domain input validation

use std::net::IpAddr;
use thiserror::Error;

use crate::DomainConfig;

/// Reasons a candidate custom domain is rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainValidationError {
    #[error("Domain cannot be empty")]
    Empty,

    #[error("Must be a fully qualified domain name")]
    NotFullyQualified,

    #[error("Wildcard domains not allowed")]
    Wildcard,

    #[error("IP addresses not allowed")]
    IpAddress,

    #[error("This domain is not allowed")]
    Blocked,

    #[error("Invalid domain format: labels must be 1-63 characters")]
    InvalidLabelLength,

    #[error("Invalid characters in domain")]
    InvalidCharacters,

    #[error("Domain parts cannot start or end with hyphen")]
    HyphenBoundary,
}

/// Trim and lowercase a user supplied hostname
pub fn normalize_domain(input: &str) -> String {
    input.trim().to_ascii_lowercase()
}

/// Validate a candidate custom domain, returning its normalized form
///
/// Checks, in order:
/// - Not empty, and contains at least one dot
/// - No wildcards, not an IP literal
/// - Does not contain any blocked name (managed or reserved domains)
/// - Every label is 1-63 of `[a-z0-9-]` and does not start or end with `-`
pub fn validate_domain(input: &str, config: &DomainConfig) -> Result<String, DomainValidationError> {
    let domain = normalize_domain(input);

    if domain.is_empty() {
        return Err(DomainValidationError::Empty);
    }

    if !domain.contains('.') {
        return Err(DomainValidationError::NotFullyQualified);
    }

    if domain.contains('*') {
        return Err(DomainValidationError::Wildcard);
    }

    if domain.parse::<IpAddr>().is_ok() {
        return Err(DomainValidationError::IpAddress);
    }

    if config.blocked_names().any(|blocked| domain.contains(blocked)) {
        return Err(DomainValidationError::Blocked);
    }

    for label in domain.split('.') {
        if label.is_empty() || label.len() > 63 {
            return Err(DomainValidationError::InvalidLabelLength);
        }
        if !label
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
        {
            return Err(DomainValidationError::InvalidCharacters);
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(DomainValidationError::HyphenBoundary);
        }
    }

    Ok(domain)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(input: &str) -> Result<String, DomainValidationError> {
        validate_domain(input, &DomainConfig::default())
    }

    #[test]
    fn test_valid_domains() {
        assert_eq!(check("blog.example-user.com").unwrap(), "blog.example-user.com");
        assert_eq!(check("  Blog.Example-User.COM ").unwrap(), "blog.example-user.com");
        assert!(check("a.b").is_ok());
        assert!(check("x1.y-2.z3").is_ok());
        assert!(check(&format!("{}.net", "a".repeat(63))).is_ok());
    }

    #[test]
    fn test_empty_and_bare_labels() {
        assert_eq!(check(""), Err(DomainValidationError::Empty));
        assert_eq!(check("   "), Err(DomainValidationError::Empty));
        assert_eq!(check("com"), Err(DomainValidationError::NotFullyQualified));
        assert_eq!(check("intranet"), Err(DomainValidationError::NotFullyQualified));
    }

    #[test]
    fn test_wildcards_rejected() {
        assert_eq!(check("*.mysite.net"), Err(DomainValidationError::Wildcard));
        assert_eq!(check("blog.*.net"), Err(DomainValidationError::Wildcard));
        assert_eq!(check("*"), Err(DomainValidationError::NotFullyQualified));
    }

    #[test]
    fn test_ip_literals_rejected() {
        assert_eq!(check("10.0.0.1"), Err(DomainValidationError::IpAddress));
        assert_eq!(check("192.168.1.254"), Err(DomainValidationError::IpAddress));
        assert!(check("::1").is_err());
        assert!(check("2001:db8::1").is_err());
    }

    #[test]
    fn test_blocked_domains() {
        assert_eq!(check("evil.microblog.host"), Err(DomainValidationError::Blocked));
        assert_eq!(check("localhost.net"), Err(DomainValidationError::Blocked));
        assert_eq!(check("blog.example.com"), Err(DomainValidationError::Blocked));
        assert_eq!(check("example.org"), Err(DomainValidationError::Blocked));
        assert_eq!(check("127.0.0.1.nip.io"), Err(DomainValidationError::Blocked));
    }

    #[test]
    fn test_label_rules() {
        assert_eq!(check("blog..net"), Err(DomainValidationError::InvalidLabelLength));
        assert_eq!(check(".blog.net"), Err(DomainValidationError::InvalidLabelLength));
        assert_eq!(
            check(&format!("{}.net", "a".repeat(64))),
            Err(DomainValidationError::InvalidLabelLength)
        );
        assert_eq!(check("my_blog.net"), Err(DomainValidationError::InvalidCharacters));
        assert_eq!(check("blög.net"), Err(DomainValidationError::InvalidCharacters));
        assert_eq!(check("-blog.net"), Err(DomainValidationError::HyphenBoundary));
        assert_eq!(check("blog-.net"), Err(DomainValidationError::HyphenBoundary));
    }
}
