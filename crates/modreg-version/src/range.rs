//! Version range grammar.
//!
//! Module metadata declares dependency and capability versions as either an
//! exact pin or a range. The accepted grammar is:
//!
//! ```text
//! range      := set ( "||" set )*
//! set        := comparator ( ("," | " ") comparator )*  |  partial " - " partial
//! comparator := op? partial
//! op         := "=" | "==" | ">" | ">=" | "<" | "<=" | "^" | "~"
//! partial    := "*" | "x" | MAJOR [ "." MINOR [ "." PATCH [ "-" PRE ] ] ]
//! ```
//!
//! Missing or wildcard components widen the range: `1.2` and `1.2.x` both
//! mean `>=1.2.0, <1.3.0`. Caret and tilde follow the usual package-manager
//! conventions (`^0.2.3` stays inside `0.2.x`).
//!
//! A pre-release version only satisfies a set when one of the set's
//! comparators names a pre-release of the same `major.minor.patch`.
//!
//! # Examples
//!
//! ```
//! use modreg_version::VersionRange;
//!
//! let range = VersionRange::parse("^1.2.0").unwrap();
//! assert!(range.satisfied_by("1.9.4").unwrap());
//! assert!(!range.satisfied_by("2.0.0").unwrap());
//!
//! let range = VersionRange::parse(">=1.0.0 <1.5.0 || >=3.0.0").unwrap();
//! assert!(range.satisfied_by("3.1.0").unwrap());
//! assert!(!range.satisfied_by("2.0.0").unwrap());
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use semver::Prerelease;

use crate::error::{Error, Result};
use crate::version::{Version, parse_version, precedence};

/// Operator as written in the range string, before desugaring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RawOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
    Caret,
    Tilde,
}

/// Primitive comparison left after desugaring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Exact,
    Greater,
    GreaterEq,
    Less,
    LessEq,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Comparator {
    op: Op,
    version: Version,
}

impl Comparator {
    fn new(op: Op, version: Version) -> Self {
        Self { op, version }
    }

    /// A comparator no release version can satisfy.
    fn nothing() -> Self {
        Self::new(Op::Less, Version::new(0, 0, 0))
    }

    fn matches(&self, candidate: &Version) -> bool {
        let ord = precedence(candidate, &self.version);
        match self.op {
            Op::Exact => ord == Ordering::Equal,
            Op::Greater => ord == Ordering::Greater,
            Op::GreaterEq => ord != Ordering::Less,
            Op::Less => ord == Ordering::Less,
            Op::LessEq => ord != Ordering::Greater,
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self.op {
            Op::Exact => "=",
            Op::Greater => ">",
            Op::GreaterEq => ">=",
            Op::Less => "<",
            Op::LessEq => "<=",
        };
        write!(f, "{op}{}", self.version)
    }
}

/// A version that may have wildcard components.
#[derive(Debug, Clone)]
struct Partial {
    major: Option<u64>,
    minor: Option<u64>,
    patch: Option<u64>,
    pre: Prerelease,
}

impl Partial {
    /// The smallest version the partial can denote.
    fn floor(&self) -> Version {
        let mut version = Version::new(
            self.major.unwrap_or(0),
            self.minor.unwrap_or(0),
            self.patch.unwrap_or(0),
        );
        version.pre = self.pre.clone();
        version
    }

    fn is_complete(&self) -> bool {
        self.major.is_some() && self.minor.is_some() && self.patch.is_some()
    }
}

/// One interval bound used for intersection checks.
#[derive(Debug, Clone)]
struct Bound {
    version: Version,
    inclusive: bool,
}

/// Closed/open interval of versions; `None` means unbounded.
#[derive(Debug, Clone, Default)]
struct Interval {
    lower: Option<Bound>,
    upper: Option<Bound>,
}

impl Interval {
    fn raise_lower(&mut self, bound: Bound) {
        self.lower = Some(match self.lower.take() {
            None => bound,
            Some(current) => match precedence(&bound.version, &current.version) {
                Ordering::Greater => bound,
                Ordering::Less => current,
                Ordering::Equal => Bound {
                    version: current.version,
                    inclusive: current.inclusive && bound.inclusive,
                },
            },
        });
    }

    fn lower_upper(&mut self, bound: Bound) {
        self.upper = Some(match self.upper.take() {
            None => bound,
            Some(current) => match precedence(&bound.version, &current.version) {
                Ordering::Less => bound,
                Ordering::Greater => current,
                Ordering::Equal => Bound {
                    version: current.version,
                    inclusive: current.inclusive && bound.inclusive,
                },
            },
        });
    }

    fn intersect(&self, other: &Interval) -> Interval {
        let mut out = self.clone();
        if let Some(lower) = &other.lower {
            out.raise_lower(lower.clone());
        }
        if let Some(upper) = &other.upper {
            out.lower_upper(upper.clone());
        }
        out
    }

    fn is_empty(&self) -> bool {
        match (&self.lower, &self.upper) {
            (Some(lower), Some(upper)) => match precedence(&lower.version, &upper.version) {
                Ordering::Greater => true,
                Ordering::Equal => !(lower.inclusive && upper.inclusive),
                Ordering::Less => false,
            },
            _ => false,
        }
    }
}

/// A conjunction of comparators. An empty set matches every release version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct ComparatorSet {
    comparators: Vec<Comparator>,
}

impl ComparatorSet {
    fn matches(&self, candidate: &Version) -> bool {
        if !self.comparators.iter().all(|c| c.matches(candidate)) {
            return false;
        }
        if candidate.pre.is_empty() {
            return true;
        }
        // Pre-releases only match when the range opts into that exact release line
        self.comparators.iter().any(|c| {
            !c.version.pre.is_empty()
                && c.version.major == candidate.major
                && c.version.minor == candidate.minor
                && c.version.patch == candidate.patch
        })
    }

    fn interval(&self) -> Interval {
        let mut interval = Interval::default();
        for c in &self.comparators {
            let bound = |inclusive| Bound {
                version: c.version.clone(),
                inclusive,
            };
            match c.op {
                Op::Exact => {
                    interval.raise_lower(bound(true));
                    interval.lower_upper(bound(true));
                }
                Op::Greater => interval.raise_lower(bound(false)),
                Op::GreaterEq => interval.raise_lower(bound(true)),
                Op::Less => interval.lower_upper(bound(false)),
                Op::LessEq => interval.lower_upper(bound(true)),
            }
        }
        interval
    }
}

impl fmt::Display for ComparatorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.comparators.is_empty() {
            return f.write_str("*");
        }
        let parts: Vec<String> = self.comparators.iter().map(|c| c.to_string()).collect();
        f.write_str(&parts.join(", "))
    }
}

/// A parsed version range that can be checked against concrete versions.
///
/// Alternatives separated by `||` are OR-ed; comparators inside one
/// alternative are AND-ed.
#[derive(Debug, Clone)]
pub struct VersionRange {
    sets: Vec<ComparatorSet>,
    /// The range string as written, for display.
    raw: String,
}

impl VersionRange {
    /// Parse a range string. The empty string and `*` match any release.
    pub fn parse(range: &str) -> Result<Self> {
        let raw = range.to_string();
        let mut sets = Vec::new();

        for alternative in range.split("||") {
            sets.push(parse_set(alternative.trim(), &raw)?);
        }

        Ok(Self { sets, raw })
    }

    /// A range matching exactly `version`.
    pub fn exact(version: &Version) -> Self {
        Self {
            sets: vec![ComparatorSet {
                comparators: vec![Comparator::new(Op::Exact, version.clone())],
            }],
            raw: format!("={version}"),
        }
    }

    /// Check a parsed version against the range.
    pub fn matches(&self, version: &Version) -> bool {
        self.sets.iter().any(|set| set.matches(version))
    }

    /// Parse `version` and check it against the range.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidVersionFormat`] if `version` does not parse.
    pub fn satisfied_by(&self, version: &str) -> Result<bool> {
        Ok(self.matches(&parse_version(version)?))
    }

    /// Whether some version could satisfy both ranges.
    ///
    /// Bounds are compared as intervals; the pre-release opt-in rule is not
    /// applied here.
    pub fn intersects(&self, other: &VersionRange) -> bool {
        self.sets.iter().any(|a| {
            let left = a.interval();
            other
                .sets
                .iter()
                .any(|b| !left.intersect(&b.interval()).is_empty())
        })
    }

    /// Return the range string as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Render the desugared comparators, e.g. `>=1.2.0, <2.0.0`.
    pub fn normalized(&self) -> String {
        let parts: Vec<String> = self.sets.iter().map(|s| s.to_string()).collect();
        parts.join(" || ")
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for VersionRange {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn invalid(raw: &str, reason: impl Into<String>) -> Error {
    Error::InvalidRange {
        range: raw.to_string(),
        reason: reason.into(),
    }
}

fn parse_set(set: &str, raw: &str) -> Result<ComparatorSet> {
    let tokens: Vec<&str> = set
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .collect();

    // Hyphen range: `1.2.3 - 2.0.0` is inclusive on both ends
    if tokens.len() == 3 && tokens[1] == "-" {
        let lower = parse_partial(tokens[0], raw)?;
        let upper = parse_partial(tokens[2], raw)?;
        let mut comparators = desugar(RawOp::Gte, &lower);
        comparators.extend(desugar(RawOp::Lte, &upper));
        return Ok(ComparatorSet { comparators });
    }

    let mut comparators = Vec::new();
    let mut iter = tokens.into_iter();
    while let Some(token) = iter.next() {
        let (op, rest) = split_op(token);
        // Allow a space between operator and version (`>= 1.0.0`)
        let rest = if rest.is_empty() && op.is_some() {
            iter.next()
                .ok_or_else(|| invalid(raw, format!("operator '{token}' has no version")))?
        } else {
            rest
        };
        let partial = parse_partial(rest, raw)?;
        comparators.extend(desugar(op.unwrap_or(RawOp::Eq), &partial));
    }

    Ok(ComparatorSet { comparators })
}

fn split_op(token: &str) -> (Option<RawOp>, &str) {
    const OPS: [(&str, RawOp); 8] = [
        (">=", RawOp::Gte),
        ("<=", RawOp::Lte),
        ("==", RawOp::Eq),
        (">", RawOp::Gt),
        ("<", RawOp::Lt),
        ("=", RawOp::Eq),
        ("^", RawOp::Caret),
        ("~", RawOp::Tilde),
    ];
    for (prefix, op) in OPS {
        if let Some(rest) = token.strip_prefix(prefix) {
            return (Some(op), rest.trim());
        }
    }
    (None, token)
}

fn parse_partial(s: &str, raw: &str) -> Result<Partial> {
    let s = s.strip_prefix('v').unwrap_or(s);
    // Build metadata never affects matching
    let s = s.split('+').next().unwrap_or(s);
    let (core, pre) = match s.split_once('-') {
        Some((core, pre)) => (core, Some(pre)),
        None => (s, None),
    };

    if core.is_empty() {
        return Err(invalid(raw, "missing version"));
    }

    let parts: Vec<&str> = core.split('.').collect();
    if parts.len() > 3 {
        return Err(invalid(raw, format!("too many components in '{s}'")));
    }

    let mut numbers: [Option<u64>; 3] = [None; 3];
    let mut seen_wildcard = false;
    for (idx, part) in parts.iter().enumerate() {
        if matches!(*part, "*" | "x" | "X") {
            seen_wildcard = true;
            continue;
        }
        if seen_wildcard {
            return Err(invalid(raw, format!("number after wildcard in '{s}'")));
        }
        let n = part
            .parse::<u64>()
            .map_err(|_| invalid(raw, format!("'{part}' is not a number")))?;
        numbers[idx] = Some(n);
    }

    let partial = Partial {
        major: numbers[0],
        minor: numbers[1],
        patch: numbers[2],
        pre: match pre {
            Some(pre) => Prerelease::new(pre).map_err(|e| invalid(raw, e.to_string()))?,
            None => Prerelease::EMPTY,
        },
    };

    if !partial.pre.is_empty() && !partial.is_complete() {
        return Err(invalid(raw, "pre-release requires a full version"));
    }

    Ok(partial)
}

fn desugar(op: RawOp, p: &Partial) -> Vec<Comparator> {
    let v = |major: u64, minor: u64, patch: u64| Version::new(major, minor, patch);
    let next = |n: u64| n.saturating_add(1);

    let Some(major) = p.major else {
        return match op {
            RawOp::Gt | RawOp::Lt => vec![Comparator::nothing()],
            _ => Vec::new(),
        };
    };

    match op {
        RawOp::Eq => match (p.minor, p.patch) {
            (Some(_), Some(_)) => vec![Comparator::new(Op::Exact, p.floor())],
            (Some(minor), None) => vec![
                Comparator::new(Op::GreaterEq, v(major, minor, 0)),
                Comparator::new(Op::Less, v(major, next(minor), 0)),
            ],
            (None, _) => vec![
                Comparator::new(Op::GreaterEq, v(major, 0, 0)),
                Comparator::new(Op::Less, v(next(major), 0, 0)),
            ],
        },
        RawOp::Gt => match (p.minor, p.patch) {
            (Some(_), Some(_)) => vec![Comparator::new(Op::Greater, p.floor())],
            (Some(minor), None) => vec![Comparator::new(Op::GreaterEq, v(major, next(minor), 0))],
            (None, _) => vec![Comparator::new(Op::GreaterEq, v(next(major), 0, 0))],
        },
        RawOp::Gte => vec![Comparator::new(Op::GreaterEq, p.floor())],
        RawOp::Lt => vec![Comparator::new(Op::Less, p.floor())],
        RawOp::Lte => match (p.minor, p.patch) {
            (Some(_), Some(_)) => vec![Comparator::new(Op::LessEq, p.floor())],
            (Some(minor), None) => vec![Comparator::new(Op::Less, v(major, next(minor), 0))],
            (None, _) => vec![Comparator::new(Op::Less, v(next(major), 0, 0))],
        },
        RawOp::Tilde => {
            let upper = match p.minor {
                Some(minor) => v(major, next(minor), 0),
                None => v(next(major), 0, 0),
            };
            vec![
                Comparator::new(Op::GreaterEq, p.floor()),
                Comparator::new(Op::Less, upper),
            ]
        }
        RawOp::Caret => {
            let upper = match (major, p.minor, p.patch) {
                (0, Some(0), Some(patch)) => v(0, 0, next(patch)),
                (0, Some(minor), _) => v(0, next(minor), 0),
                (0, None, _) => v(1, 0, 0),
                _ => v(next(major), 0, 0),
            };
            vec![
                Comparator::new(Op::GreaterEq, p.floor()),
                Comparator::new(Op::Less, upper),
            ]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn check(range: &str, version: &str) -> bool {
        VersionRange::parse(range)
            .unwrap()
            .satisfied_by(version)
            .unwrap()
    }

    #[rstest]
    // exact pins
    #[case("1.2.3", "1.2.3", true)]
    #[case("1.2.3", "1.2.4", false)]
    #[case("=1.2.3", "1.2.3", true)]
    #[case("==1.2.3", "1.2.3", true)]
    #[case("1.2.3+build.5", "1.2.3", true)]
    // comparators
    #[case(">1.0.0", "1.0.1", true)]
    #[case(">1.0.0", "1.0.0", false)]
    #[case(">=1.0.0", "1.0.0", true)]
    #[case("<2.0.0", "1.99.0", true)]
    #[case("<2.0.0", "2.0.0", false)]
    #[case("<=2.0.0", "2.0.0", true)]
    #[case(">= 1.2.0", "1.3.0", true)]
    #[case(">=1.0.0, <2.0.0", "1.5.0", true)]
    #[case(">=1.0.0 <2.0.0", "2.0.0", false)]
    // partial versions
    #[case(">1.2", "1.2.9", false)]
    #[case(">1.2", "1.3.0", true)]
    #[case("<=1.2", "1.2.9", true)]
    #[case("<=1.2", "1.3.0", false)]
    #[case("1.2", "1.2.7", true)]
    #[case("1.x", "1.9.0", true)]
    #[case("1.x", "2.0.0", false)]
    #[case("1.2.*", "1.2.3", true)]
    // caret
    #[case("^1.2.3", "1.2.3", true)]
    #[case("^1.2.3", "1.9.9", true)]
    #[case("^1.2.3", "2.0.0", false)]
    #[case("^1.2.3", "1.2.2", false)]
    #[case("^0.2.3", "0.2.9", true)]
    #[case("^0.2.3", "0.3.0", false)]
    #[case("^0.0.3", "0.0.3", true)]
    #[case("^0.0.3", "0.0.4", false)]
    #[case("^0.0", "0.0.9", true)]
    #[case("^0.0", "0.1.0", false)]
    #[case("^0", "0.9.0", true)]
    #[case("^1", "1.4.0", true)]
    // tilde
    #[case("~1.2.3", "1.2.9", true)]
    #[case("~1.2.3", "1.3.0", false)]
    #[case("~1", "1.9.0", true)]
    #[case("~1", "2.0.0", false)]
    // wildcards and alternatives
    #[case("*", "42.0.0", true)]
    #[case("", "0.0.1", true)]
    #[case("^1.0.0 || ^3.0.0", "3.4.0", true)]
    #[case("^1.0.0 || ^3.0.0", "2.0.0", false)]
    // hyphen ranges
    #[case("1.2.3 - 2.3.4", "2.3.4", true)]
    #[case("1.2.3 - 2.3", "2.3.9", true)]
    #[case("1.2.3 - 2.3.4", "2.3.5", false)]
    fn test_range_matching(#[case] range: &str, #[case] version: &str, #[case] expected: bool) {
        assert_eq!(
            check(range, version),
            expected,
            "range '{range}' vs version '{version}'"
        );
    }

    #[rstest]
    #[case("^1.0.0", "1.1.0-beta.1", false)]
    #[case("*", "1.0.0-alpha", false)]
    #[case(">=1.1.0-beta.1", "1.1.0-beta.2", true)]
    #[case(">=1.1.0-beta.1", "1.2.0-beta.2", false)]
    #[case(">=1.1.0-beta.1", "1.1.0", true)]
    #[case("1.1.0-rc.1", "1.1.0-rc.1", true)]
    fn test_prerelease_opt_in(#[case] range: &str, #[case] version: &str, #[case] expected: bool) {
        assert_eq!(check(range, version), expected);
    }

    #[rstest]
    #[case(">=")]
    #[case("^abc")]
    #[case("1.2.3.4")]
    #[case("1.x.3")]
    #[case("1.2-beta")]
    #[case(">=1.0.0 <")]
    #[case("1.0.0 - ")]
    fn test_invalid_ranges_rejected(#[case] range: &str) {
        let err = VersionRange::parse(range).unwrap_err();
        assert!(
            matches!(err, Error::InvalidRange { .. }),
            "expected InvalidRange for '{range}', got {err:?}"
        );
    }

    #[test]
    fn test_satisfied_by_rejects_bad_version() {
        let range = VersionRange::parse("^1.0.0").unwrap();
        let err = range.satisfied_by("latest").unwrap_err();
        assert!(matches!(err, Error::InvalidVersionFormat { .. }));
    }

    #[rstest]
    #[case("^1.0.0", "^1.4.0", true)]
    #[case("^1.0.0", "^2.0.0", false)]
    #[case(">=1.0.0 <1.5.0", ">=1.5.0", false)]
    #[case(">=1.0.0 <=1.5.0", ">=1.5.0", true)]
    #[case("1.2.3", "~1.2.0", true)]
    #[case("1.2.3", "1.2.4", false)]
    #[case("*", "^9.0.0", true)]
    #[case("<1.0.0 || >=3.0.0", "^2.0.0", false)]
    #[case("<1.0.0 || >=3.0.0", "^3.2.0", true)]
    fn test_intersects(#[case] a: &str, #[case] b: &str, #[case] expected: bool) {
        let a = VersionRange::parse(a).unwrap();
        let b = VersionRange::parse(b).unwrap();
        assert_eq!(a.intersects(&b), expected);
        assert_eq!(b.intersects(&a), expected);
    }

    #[test]
    fn test_normalized_output() {
        let range = VersionRange::parse("^1.2.3 || ~0.4").unwrap();
        assert_eq!(range.normalized(), ">=1.2.3, <2.0.0 || >=0.4.0, <0.5.0");
        assert_eq!(range.to_string(), "^1.2.3 || ~0.4");
    }

    #[test]
    fn test_exact_constructor() {
        let version = Version::new(3, 1, 0);
        let range = VersionRange::exact(&version);
        assert!(range.matches(&version));
        assert!(!range.matches(&Version::new(3, 1, 1)));
        assert_eq!(range.as_str(), "=3.1.0");
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn caret_matches_same_major_at_or_above(
                major in 1u64..20, minor in 0u64..20, patch in 0u64..20,
                c_minor in 0u64..20, c_patch in 0u64..20, c_major in 0u64..21,
            ) {
                let range = VersionRange::parse(&format!("^{major}.{minor}.{patch}")).unwrap();
                let candidate = Version::new(c_major, c_minor, c_patch);
                let expected = c_major == major
                    && (c_minor, c_patch) >= (minor, patch);
                prop_assert_eq!(range.matches(&candidate), expected);
            }

            #[test]
            fn exact_range_intersects_iff_matches(
                a in (0u64..5, 0u64..5, 0u64..5),
                b in (0u64..5, 0u64..5, 0u64..5),
            ) {
                let va = Version::new(a.0, a.1, a.2);
                let range = VersionRange::parse(&format!("~{}.{}.{}", b.0, b.1, b.2)).unwrap();
                prop_assert_eq!(VersionRange::exact(&va).intersects(&range), range.matches(&va));
            }
        }
    }
}
