//! Syntactic email-address validation.

use regex::Regex;
use std::sync::OnceLock;

static ADDRESS_RE: OnceLock<Regex> = OnceLock::new();

fn address_re() -> &'static Regex {
    ADDRESS_RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").unwrap()
    })
}

/// Permissive pattern check: local part, `@`, dotted domain with a final
/// label of at least two letters. No DNS or mailbox-existence lookup.
pub fn is_valid_address(address: &str) -> bool {
    !address.is_empty() && address_re().is_match(address)
}

/// Returns the entries of `addresses` that fail [`is_valid_address`].
pub fn validate_addresses(addresses: &[String]) -> Vec<String> {
    addresses
        .iter()
        .filter(|a| !is_valid_address(a))
        .cloned()
        .collect()
}
