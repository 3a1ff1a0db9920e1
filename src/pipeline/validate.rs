//! Input validation: the only gate before a browser is launched.
//!
//! The check is a literal prefix match. The input is not trimmed, parsed or
//! lower-cased, so `" https://x"` and `"HTTPS://x"` are both rejected.

use crate::error::ScrapeError;

/// Schemes a URL must start with.
pub const ACCEPTED_PREFIXES: [&str; 2] = ["http://", "https://"];

/// Check if the input string starts with an accepted scheme prefix.
pub fn is_http_url(input: &str) -> bool {
    ACCEPTED_PREFIXES.iter().any(|p| input.starts_with(p))
}

/// Validate a candidate URL, returning it unchanged on success.
pub fn validate_url(input: &str) -> Result<&str, ScrapeError> {
    if is_http_url(input) {
        Ok(input)
    } else {
        Err(ScrapeError::InvalidUrl {
            input: input.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_http_and_https() {
        assert_eq!(validate_url("https://example.com").unwrap(), "https://example.com");
        assert!(validate_url("http://example.com/a?b=c").is_ok());
    }

    #[test]
    fn rejects_other_schemes_and_bare_hosts() {
        for bad in [
            "ftp://example.com",
            "example.com",
            "file:///etc/hosts",
            "javascript:alert(1)",
            "",
            "https:/example.com",
        ] {
            assert!(
                matches!(validate_url(bad), Err(ScrapeError::InvalidUrl { .. })),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn does_not_normalise() {
        assert!(validate_url(" https://example.com").is_err());
        assert!(validate_url("HTTPS://example.com").is_err());
        assert!(validate_url("Http://example.com").is_err());
    }

    #[test]
    fn prefix_alone_is_accepted() {
        // The gate is a prefix check only; reachability is the renderer's job.
        assert!(is_http_url("http://"));
    }
}
