//! Version parsing and precedence.
//!
//! Parsing is delegated to the `semver` crate. Ordering follows SemVer 2.0
//! precedence: `major.minor.patch`, then pre-release identifiers, with build
//! metadata ignored. `semver::Version`'s own `Ord` breaks ties on build
//! metadata, so comparisons here go through [`precedence`] instead.

use std::cmp::Ordering;

use crate::error::{Error, Result};

/// A parsed semantic version.
pub type Version = semver::Version;

/// Parse a version string like `"1.2.3"`, `"1.0.0-beta.2"` or `"v2.1.0"`.
///
/// Surrounding whitespace and a single leading `v` are tolerated.
pub fn parse_version(s: &str) -> Result<Version> {
    let trimmed = s.trim();
    let stripped = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);

    Version::parse(stripped).map_err(|e| Error::InvalidVersionFormat {
        version: s.to_string(),
        reason: e.to_string(),
    })
}

/// Whether `s` parses as a semantic version.
pub fn is_valid(s: &str) -> bool {
    parse_version(s).is_ok()
}

/// Compare two parsed versions by SemVer precedence.
pub fn precedence(a: &Version, b: &Version) -> Ordering {
    (a.major, a.minor, a.patch)
        .cmp(&(b.major, b.minor, b.patch))
        .then_with(|| a.pre.cmp(&b.pre))
}

/// Compare two version strings.
///
/// # Errors
///
/// Returns [`Error::InvalidVersionFormat`] if either string does not parse.
pub fn compare(v1: &str, v2: &str) -> Result<Ordering> {
    let a = parse_version(v1)?;
    let b = parse_version(v2)?;
    Ok(precedence(&a, &b))
}

/// `compare` as the integer triple `-1 / 0 / 1`.
pub fn compare_i8(v1: &str, v2: &str) -> Result<i8> {
    Ok(match compare(v1, v2)? {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    })
}

/// Whether `candidate` is strictly newer than `current`.
pub fn is_newer(candidate: &str, current: &str) -> Result<bool> {
    Ok(compare(candidate, current)? == Ordering::Greater)
}

/// Sort versions newest first by precedence.
pub fn sort_descending(versions: &mut [Version]) {
    versions.sort_by(|a, b| precedence(b, a));
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("1.0.0", "1.0.1", Ordering::Less)]
    #[case("1.2.0", "1.10.0", Ordering::Less)]
    #[case("2.0.0", "1.99.99", Ordering::Greater)]
    #[case("1.0.0-alpha", "1.0.0", Ordering::Less)]
    #[case("1.0.0-alpha", "1.0.0-alpha.1", Ordering::Less)]
    #[case("1.0.0-alpha.beta", "1.0.0-beta", Ordering::Less)]
    #[case("1.0.0-beta.2", "1.0.0-beta.11", Ordering::Less)]
    #[case("1.0.0-rc.1", "1.0.0", Ordering::Less)]
    #[case("1.0.0+build.1", "1.0.0+build.2", Ordering::Equal)]
    #[case("v1.4.0", "1.4.0", Ordering::Equal)]
    fn test_compare(#[case] a: &str, #[case] b: &str, #[case] expected: Ordering) {
        assert_eq!(compare(a, b).unwrap(), expected);
        assert_eq!(compare(b, a).unwrap(), expected.reverse());
    }

    #[test]
    fn test_compare_i8() {
        assert_eq!(compare_i8("1.0.0", "2.0.0").unwrap(), -1);
        assert_eq!(compare_i8("2.0.0", "2.0.0").unwrap(), 0);
        assert_eq!(compare_i8("2.0.1", "2.0.0").unwrap(), 1);
    }

    #[rstest]
    #[case("")]
    #[case("1")]
    #[case("1.2")]
    #[case("1.2.3.4")]
    #[case("one.two.three")]
    #[case("1.2.x")]
    fn test_invalid_versions_rejected(#[case] input: &str) {
        let err = parse_version(input).unwrap_err();
        assert!(matches!(err, Error::InvalidVersionFormat { .. }));
        assert!(compare(input, "1.0.0").is_err());
        assert!(compare("1.0.0", input).is_err());
    }

    #[test]
    fn test_is_newer() {
        assert!(is_newer("1.1.0", "1.0.9").unwrap());
        assert!(!is_newer("1.0.0", "1.0.0").unwrap());
        assert!(!is_newer("0.9.0", "1.0.0").unwrap());
    }

    #[test]
    fn test_sort_descending() {
        let mut versions: Vec<Version> = ["1.0.0", "2.0.0-rc.1", "2.0.0", "0.5.1"]
            .iter()
            .map(|s| parse_version(s).unwrap())
            .collect();
        sort_descending(&mut versions);
        let ordered: Vec<String> = versions.iter().map(|v| v.to_string()).collect();
        assert_eq!(ordered, vec!["2.0.0", "2.0.0-rc.1", "1.0.0", "0.5.1"]);
    }
}
