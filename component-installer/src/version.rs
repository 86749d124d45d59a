// Version spec matching for the bundled package sources

use semver::{Version, VersionReq};
use std::cmp::Ordering;

/// Parse a candidate name as a version, leading `v` allowed
pub fn parse_version(candidate: &str) -> Option<Version> {
    Version::parse(candidate.strip_prefix('v').unwrap_or(candidate)).ok()
}

/// Select the candidate (tag, version directory, branch) matching `spec`.
///
/// - a candidate named exactly `spec` always wins (branches, odd tags)
/// - `""`, `*`, `latest`: highest version candidate
/// - `1.2.3` / `v1.2.3`: that version exactly
/// - `1`, `1.2`, `1.2.x`: highest with that prefix
/// - anything else is a semver requirement (`^0.1.2`, `~1.2`, `>=1, <2`)
pub fn select<S: AsRef<str>>(spec: &str, candidates: &[S]) -> Option<String> {
    let spec = spec.trim();

    if let Some(found) = candidates.iter().find(|c| c.as_ref() == spec) {
        return Some(found.as_ref().to_string());
    }

    let req = requirement(spec)?;
    candidates
        .iter()
        .filter_map(|c| parse_version(c.as_ref()).map(|v| (v, c.as_ref())))
        .filter(|(v, _)| req.matches(v))
        .max_by(|a, b| a.0.cmp(&b.0).then_with(|| prefer_plain(a.1, b.1)))
        .map(|(_, c)| c.to_string())
}

/// Turn a spec into a requirement. Bare versions are exact or prefix
/// matches rather than semver's implicit caret.
fn requirement(spec: &str) -> Option<VersionReq> {
    if spec.is_empty() || spec == "latest" {
        return Some(VersionReq::STAR);
    }

    let plain = spec.strip_prefix('v').unwrap_or(spec);
    let bare = plain.starts_with(|c: char| c.is_ascii_digit())
        && !plain.contains(|c: char| c.is_whitespace() || c == ',');

    if !bare {
        return VersionReq::parse(spec).ok();
    }

    let mut parts: Vec<&str> = plain.split('.').collect();
    while matches!(parts.last(), Some(&"x") | Some(&"X") | Some(&"*")) {
        parts.pop();
    }

    if parts.is_empty() {
        return Some(VersionReq::STAR);
    }

    VersionReq::parse(&format!("={}", parts.join("."))).ok()
}

/// Between `v1.0.0` and `1.0.0` keep the plain one
fn prefer_plain(a: &str, b: &str) -> Ordering {
    b.starts_with('v').cmp(&a.starts_with('v'))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TAGS: &[&str] = &["v0.9.0", "1.0.0", "1.0.3", "1.2.0", "2.0.0", "master"];

    #[test]
    fn test_parse_version() {
        assert_eq!(parse_version("v1.2.3"), Some(Version::new(1, 2, 3)));
        assert_eq!(parse_version("1.2.3"), Some(Version::new(1, 2, 3)));
        assert_eq!(parse_version("1.2"), None);
        assert_eq!(parse_version("master"), None);
    }

    #[test]
    fn test_latest() {
        assert_eq!(select("*", TAGS).as_deref(), Some("2.0.0"));
        assert_eq!(select("latest", TAGS).as_deref(), Some("2.0.0"));
        assert_eq!(select("", TAGS).as_deref(), Some("2.0.0"));
    }

    #[test]
    fn test_exact_and_prefixed() {
        assert_eq!(select("1.0.3", TAGS).as_deref(), Some("1.0.3"));
        assert_eq!(select("0.9.0", TAGS).as_deref(), Some("v0.9.0"));
        assert_eq!(select("v1.2.0", TAGS).as_deref(), Some("1.2.0"));
        assert_eq!(select("1.0.0", TAGS).as_deref(), Some("1.0.0"));
        assert_eq!(select("3.0.0", TAGS), None);
    }

    #[test]
    fn test_ranges() {
        assert_eq!(select("^1.0.1", TAGS).as_deref(), Some("1.2.0"));
        assert_eq!(select("~1.0.1", TAGS).as_deref(), Some("1.0.3"));
        assert_eq!(select("1", TAGS).as_deref(), Some("1.2.0"));
        assert_eq!(select("1.0", TAGS).as_deref(), Some("1.0.3"));
        assert_eq!(select("1.0.x", TAGS).as_deref(), Some("1.0.3"));
        assert_eq!(select(">=1.0.1, <1.2.0", TAGS).as_deref(), Some("1.0.3"));
        assert_eq!(select("^2.1.0", TAGS), None);
    }

    #[test]
    fn test_zero_major_caret_stays_in_minor() {
        let tags = ["0.1.2", "0.1.5", "0.9.0"];
        assert_eq!(select("^0.1.2", &tags).as_deref(), Some("0.1.5"));
        assert_eq!(select("^0.9", &tags).as_deref(), Some("0.9.0"));
    }

    #[test]
    fn test_partial_caret_and_tilde() {
        let tags = ["1.2.0", "1.2.4", "1.3.1", "2.0.0"];
        assert_eq!(select("~1.2", &tags).as_deref(), Some("1.2.4"));
        assert_eq!(select("^1", &tags).as_deref(), Some("1.3.1"));
        assert_eq!(select("^1.2", &tags).as_deref(), Some("1.3.1"));
        assert_eq!(select("~2", &tags).as_deref(), Some("2.0.0"));
    }

    #[test]
    fn test_prerelease_only_when_asked() {
        let tags = ["1.0.0", "1.1.0-beta.1"];
        assert_eq!(select("^1.0.0", &tags).as_deref(), Some("1.0.0"));
        assert_eq!(select("1.1.0-beta.1", &tags).as_deref(), Some("1.1.0-beta.1"));
    }

    #[test]
    fn test_branch() {
        assert_eq!(select("master", TAGS).as_deref(), Some("master"));
        assert_eq!(select("develop", TAGS), None);
    }
}
