//! Syntactic recipient-address validation.

use std::sync::LazyLock;

use regex::Regex;

/// `local-part @ domain-labels . tld` with a TLD of at least two letters.
static ADDRESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("valid address regex")
});

/// Whether `s` is a syntactically valid address. No DNS or MX lookup is made.
pub fn is_valid_address(s: &str) -> bool {
    ADDRESS_RE.is_match(s)
}
