//! Release tag comparison.
//!
//! The dashboard has always compared tags as plain strings, which misorders
//! `1.9.0` vs `1.10.0`.  That ordering stays the default so the banner
//! behaves exactly as before; `Semantic` is available through the config.

use semver::Version;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How a remote release tag is ordered against the running version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionOrdering {
    /// Byte-wise string comparison.
    #[default]
    Lexicographic,
    /// Lenient semver comparison; falls back to `Lexicographic` when either
    /// side does not parse.
    Semantic,
}

impl VersionOrdering {
    /// `true` iff `remote` should be offered as an update over `current`.
    pub fn is_newer(self, current: &str, remote: &str) -> bool {
        match self {
            Self::Lexicographic => remote > current,
            Self::Semantic => match (parse_lenient(current), parse_lenient(remote)) {
                (Some(cur), Some(rem)) => rem > cur,
                _ => {
                    debug!(current, remote, "unparsable version, comparing as strings");
                    remote > current
                }
            },
        }
    }
}

/// Parse tags like "v1.2", "1.2.3" or "1.2.3-rc1" into a `Version`.
///
/// A leading `v` is stripped and missing minor/patch components are padded
/// with zero.
fn parse_lenient(tag: &str) -> Option<Version> {
    let tag = tag.trim();
    let tag = tag
        .strip_prefix('v')
        .or_else(|| tag.strip_prefix('V'))
        .unwrap_or(tag);
    if tag.is_empty() {
        return None;
    }

    if let Ok(v) = Version::parse(tag) {
        return Some(v);
    }

    // Split off any pre-release / build suffix before padding the core.
    let split_at = tag.find(['-', '+']).unwrap_or(tag.len());
    let (core, suffix) = tag.split_at(split_at);
    let mut parts: Vec<&str> = core.split('.').collect();
    if parts.len() > 3 || parts.iter().any(|p| p.is_empty()) {
        return None;
    }
    while parts.len() < 3 {
        parts.push("0");
    }
    Version::parse(&format!("{}{}", parts.join("."), suffix)).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexicographic_matches_string_order() {
        let ord = VersionOrdering::Lexicographic;
        assert!(!ord.is_newer("1.2.0", "1.1.9"));
        assert!(!ord.is_newer("1.2.0", "1.2.0"));
        assert!(ord.is_newer("1.2.0", "1.3.0"));
        // The known defect, kept for parity.
        assert!(!ord.is_newer("1.9.0", "1.10.0"));
    }

    #[test]
    fn semantic_orders_numerically() {
        let ord = VersionOrdering::Semantic;
        assert!(ord.is_newer("1.9.0", "1.10.0"));
        assert!(!ord.is_newer("1.10.0", "1.9.0"));
        assert!(ord.is_newer("1.2.0", "v1.2.1"));
        assert!(!ord.is_newer("1.2", "1.2.0"));
        assert!(ord.is_newer("1.2.0-rc1", "1.2.0"));
    }

    #[test]
    fn semantic_falls_back_to_strings() {
        let ord = VersionOrdering::Semantic;
        assert!(ord.is_newer("nightly-a", "nightly-b"));
        assert!(!ord.is_newer("nightly-b", "nightly-a"));
    }

    #[test]
    fn lenient_parsing() {
        assert_eq!(parse_lenient("27.0"), Some(Version::new(27, 0, 0)));
        assert_eq!(parse_lenient("v0.10.5"), Some(Version::new(0, 10, 5)));
        assert_eq!(parse_lenient("1"), Some(Version::new(1, 0, 0)));
        assert_eq!(parse_lenient(""), None);
        assert_eq!(parse_lenient("1..2"), None);
        assert!(parse_lenient("2.1-beta").is_some_and(|v| !v.pre.is_empty()));
    }
}
